use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::pubsub::{PubSubChannel, Subscriber, Publisher};
use heapless::String;

use qn8027::rds::STATION_NAME_LEN;
use qn8027::{FsmState, RfPower};
use rds_scheduler::{MessageText, RdsStatus};

pub type StationName = String<STATION_NAME_LEN>;

/// Edits to the local message set.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageEdit {
    Add { name: MessageText, text: MessageText },
    Remove(MessageText),
    Rename { from: MessageText, to: MessageText },
    Enable(MessageText, bool),
    Duration(MessageText, u16),
    List,
}

/// Console requests handled by the control loop.
#[derive(Debug, Clone, PartialEq)]
pub enum SystemEvent {
    Message(MessageEdit),
    Carrier(bool),
    Frequency(f32),
    PiCode(u16),
    PtyCode(u8),
    StationName(MessageText),
    Mute(bool),
    Mono(bool),
    RfPower(RfPower),
    TestMode(bool),
    Save,
    Status,
}

/// Validated changes for the radio task, the only user of the I2C bus.
#[derive(Debug, Clone, PartialEq)]
pub enum RadioCommand {
    Carrier(bool),
    Frequency(f32),
    PiCode(u16),
    PtyCode(u8),
    StationName(StationName),
    Mute(bool),
    Mono(bool),
    RfPower(RfPower),
    TestMode(bool),
    Report,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RadioReport {
    pub frequency_mhz: f32,
    pub carrier: bool,
    pub pi_code: u16,
    pub pty_code: u8,
    pub audio_peak_mv: u16,
    pub fsm: FsmState,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SystemNotify {
    RadioReady,
    CarrierOn,
    CarrierOff,
    Rds(RdsStatus),
    Report(RadioReport),
}

static NOTIFICATION_CHANNEL: PubSubChannel<ThreadModeRawMutex, SystemNotify, 4, 4, 2> = PubSubChannel::new();
static EVENT_CHANNEL: Channel<ThreadModeRawMutex, SystemEvent, 4> = Channel::new();
static RADIO_CHANNEL: Channel<ThreadModeRawMutex, RadioCommand, 4> = Channel::new();

/// Returns `false` when the control loop is behind and the event was dropped.
pub fn event_try_send(event: SystemEvent) -> bool {
    EVENT_CHANNEL.try_send(event).is_ok()
}

pub async fn event_receive() -> SystemEvent {
    EVENT_CHANNEL.receive().await
}

/// Returns `false` when the radio task is behind and the command was dropped.
pub fn radio_try_send(command: RadioCommand) -> bool {
    RADIO_CHANNEL.try_send(command).is_ok()
}

pub async fn radio_receive() -> RadioCommand {
    RADIO_CHANNEL.receive().await
}

pub fn notify_subscriber<'a>() -> Result<Subscriber<'a, ThreadModeRawMutex, SystemNotify, 4, 4, 2>, embassy_sync::pubsub::Error> {
    NOTIFICATION_CHANNEL.subscriber()
}

pub fn notify_publisher<'a>() -> Result<Publisher<'a, ThreadModeRawMutex, SystemNotify, 4, 4, 2>, embassy_sync::pubsub::Error> {
    NOTIFICATION_CHANNEL.publisher()
}
