#![no_std]
#![no_main]

use embassy_executor::Spawner;
use embassy_futures::select::{Either, select};
use embassy_nrf::gpio::{Level, Output, OutputDrive};
use embassy_nrf::nvmc::Nvmc;
use embassy_nrf::peripherals::{SERIAL0, SERIAL1};
use embassy_nrf::{bind_interrupts, uarte};
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_time::Delay;
use log::{error, info, warn};
use panic_probe as _;

use embassy_nrf::twim::{self, Twim};
use qn8027::settings::RadioSettings;
use qn8027::{I2cRegisterBus, Qn8027};
use rds_scheduler::{Countdown, MessageSet, MessageSetConfig, RdsStatus};
use static_cell::ConstStaticCell;

mod cli;
pub mod console;
pub mod events;
mod radio;
mod serial_logger;
mod storage;

use events::{MessageEdit, RadioCommand, RadioReport, SystemEvent, SystemNotify};
use storage::{ConfigStore, StorageError, StoredConfig};

/// Name of the message set edited from the console.
const LOCAL_SET_NAME: &str = "Local";

static MESSAGES: MessageSet<ThreadModeRawMutex> = MessageSet::new();

bind_interrupts!(struct Irqs {
    SERIAL0 => uarte::InterruptHandler<SERIAL0>;
    SERIAL1 => twim::InterruptHandler<SERIAL1>;
});

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_nrf::init(Default::default());
    // Lit while the carrier is on.
    let mut led = Output::new(p.P0_28, Level::Low, OutputDrive::Standard);

    let mut config = uarte::Config::default();
    config.parity = uarte::Parity::EXCLUDED;
    config.baudrate = uarte::Baudrate::BAUD115200;
    let uart: uarte::Uarte<'static> = uarte::Uarte::new(p.SERIAL0, p.P0_22, p.P0_20, Irqs, config);
    let (tx, rx) = uart.split();
    console::stdout_init(tx);
    let _ = serial_logger::init();
    info!("PixelRadio QN8027 RDS transmitter");

    let mut store = ConfigStore::new(Nvmc::new(p.NVMC));
    let stored = match store.load() {
        Ok(stored) => stored,
        Err(StorageError::Empty) => {
            info!("No saved configuration, using defaults");
            StoredConfig::default()
        }
        Err(e) => {
            warn!("Configuration not loaded: {}", e);
            StoredConfig::default()
        }
    };
    let mut settings = stored.radio;
    if let Err(e) = settings.validate() {
        warn!("Saved radio settings rejected: {}", e);
        settings = RadioSettings::default();
    }
    restore_messages(&stored.messages).await;

    let _ = spawner.spawn(cli::console_task(rx));

    let config = twim::Config::default();
    static RAM_BUFFER: ConstStaticCell<[u8; 16]> = ConstStaticCell::new([0; 16]);
    let twi = Twim::new(p.SERIAL1, Irqs, p.P1_14, p.P1_13, config, RAM_BUFFER.take());
    let bus: I2cRegisterBus<Twim<'static>> = I2cRegisterBus::new(twi);
    let mut radio: radio::Radio = Qn8027::new(bus, Delay);
    let radio_running = match start_radio(&mut radio, &settings).await {
        Ok(()) => {
            if settings.carrier {
                led.set_high();
            }
            let station_name = settings.station_name.clone();
            match spawner.spawn(radio::radio_task(radio, &MESSAGES, station_name)) {
                Ok(()) => true,
                Err(e) => {
                    error!("Radio task not spawned: {:?}", e);
                    false
                }
            }
        }
        Err(e) => {
            error!("QN8027 not started: {}", e);
            false
        }
    };

    let Ok(mut notifications) = events::notify_subscriber() else {
        error!("No notification slot left for the control loop");
        return;
    };
    let mut control = Control {
        settings,
        store,
        settings_unsaved: false,
        radio_running,
        rds: None,
    };

    loop {
        match select(events::event_receive(), notifications.next_message_pure()).await {
            Either::First(event) => {
                info!("Received event: {:?}", event);
                control.handle(event).await;
            }
            Either::Second(notification) => match notification {
                SystemNotify::RadioReady => info!("Radio task running"),
                SystemNotify::CarrierOn => led.set_high(),
                SystemNotify::CarrierOff => led.set_low(),
                SystemNotify::Rds(status) => control.rds = Some(status),
                SystemNotify::Report(report) => show_report(&report),
            },
        }
    }
}

async fn start_radio(radio: &mut radio::Radio, settings: &RadioSettings) -> Result<(), qn8027::Error> {
    radio.init().await?;
    settings.apply(radio).await?;
    info!(
        "Transmitting on {} MHz, PI 0x{:04X}, carrier {}",
        radio.frequency(),
        radio.pi_code(),
        if radio.carrier() { "on" } else { "off" }
    );
    Ok(())
}

async fn restore_messages(config: &MessageSetConfig) {
    match MESSAGES.lock().await {
        Ok(mut messages) => {
            messages.restore(config);
            if messages.name().is_empty() {
                let _ = messages.set_name(LOCAL_SET_NAME);
            }
        }
        Err(e) => error!("Messages not restored: {}", e),
    }
}

/// Settings owned by the control loop; accepted changes go on to the radio task.
struct Control {
    settings: RadioSettings,
    store: ConfigStore<Nvmc<'static>>,
    settings_unsaved: bool,
    /// No radio task means radio commands have no receiver.
    radio_running: bool,
    rds: Option<RdsStatus>,
}

impl Control {
    async fn handle(&mut self, event: SystemEvent) {
        let command = match event {
            SystemEvent::Message(edit) => {
                edit_messages(edit).await;
                None
            }
            SystemEvent::Carrier(on) => {
                self.settings.carrier = on;
                Some(RadioCommand::Carrier(on))
            }
            SystemEvent::Frequency(mhz) => self
                .settings
                .set_frequency(mhz)
                .ok()
                .map(|()| RadioCommand::Frequency(mhz)),
            SystemEvent::PiCode(code) => self
                .settings
                .set_pi_code(code)
                .ok()
                .map(|()| RadioCommand::PiCode(code)),
            SystemEvent::PtyCode(code) => self
                .settings
                .set_pty_code(code)
                .ok()
                .map(|()| RadioCommand::PtyCode(code)),
            SystemEvent::StationName(name) => self
                .settings
                .set_station_name(&name)
                .ok()
                .map(|()| RadioCommand::StationName(self.settings.station_name.clone())),
            SystemEvent::Mute(mute) => {
                self.settings.mute = mute;
                Some(RadioCommand::Mute(mute))
            }
            SystemEvent::Mono(mono) => {
                self.settings.mono = mono;
                Some(RadioCommand::Mono(mono))
            }
            SystemEvent::RfPower(power) => {
                self.settings.rf_power = power;
                Some(RadioCommand::RfPower(power))
            }
            SystemEvent::TestMode(enabled) => {
                self.send_radio(RadioCommand::TestMode(enabled));
                return;
            }
            SystemEvent::Save => {
                self.save().await;
                None
            }
            SystemEvent::Status => {
                self.show_status().await;
                Some(RadioCommand::Report)
            }
        };
        if let Some(command) = command {
            if command != RadioCommand::Report {
                self.settings_unsaved = true;
            }
            self.send_radio(command);
        }
    }

    fn send_radio(&self, command: RadioCommand) {
        if !self.radio_running {
            warn!("Radio not running, {:?} kept for the next start", command);
        } else if !events::radio_try_send(command) {
            warn!("Busy, radio command dropped");
        }
    }

    async fn save(&mut self) {
        let (messages, revision) = match MESSAGES.lock().await {
            Ok(messages) => (messages.to_config(), messages.revision()),
            Err(e) => {
                error!("Not saved: {}", e);
                return;
            }
        };
        // The set is unlocked while the flash page is erased.
        let config = StoredConfig {
            radio: self.settings.clone(),
            messages,
        };
        if let Err(e) = self.store.save(&config) {
            error!("Not saved: {}", e);
            return;
        }
        self.settings_unsaved = false;
        if let Ok(mut messages) = MESSAGES.lock().await {
            if !messages.mark_saved_at(revision) {
                warn!("Messages changed while saving, save again");
            }
        }
    }

    async fn show_status(&self) {
        let s = &self.settings;
        info!(
            "Carrier {} at {} MHz, RF power {:?}{}{}",
            if s.carrier { "on" } else { "off" },
            s.frequency_mhz,
            s.rf_power,
            if s.mute { ", muted" } else { "" },
            if s.mono { ", mono" } else { "" },
        );
        info!("RDS PSN '{}', PI 0x{:04X}, PTY {}", s.station_name, s.pi_code, s.pty_code);
        match &self.rds {
            Some(status) => show_rds(status),
            None => info!("RadioText: not started"),
        }
        match MESSAGES.lock().await {
            Ok(messages) => info!(
                "{} messages in '{}'{}",
                messages.len(),
                messages.name(),
                if messages.is_unsaved() || self.settings_unsaved { ", unsaved changes" } else { "" }
            ),
            Err(e) => warn!("{}", e),
        }
    }
}

async fn edit_messages(edit: MessageEdit) {
    let mut messages = match MESSAGES.lock().await {
        Ok(messages) => messages,
        Err(e) => {
            error!("{}", e);
            return;
        }
    };
    let result = match edit {
        MessageEdit::Add { name, text } => messages.add(&name, &text),
        MessageEdit::Remove(name) => messages.remove(&name).map(|_| ()),
        MessageEdit::Rename { from, to } => messages.rename(&from, &to),
        MessageEdit::Enable(name, enabled) => messages.set_enabled(&name, enabled),
        MessageEdit::Duration(name, secs) => messages.set_duration(&name, secs),
        MessageEdit::List => {
            for entry in messages.iter() {
                info!(
                    "{} '{}' -> '{}' {} s",
                    if entry.is_enabled() { "[x]" } else { "[ ]" },
                    entry.name(),
                    entry.text(),
                    entry.duration_secs()
                );
            }
            if messages.is_empty() {
                info!("No messages");
            }
            Ok(())
        }
    };
    if let Err(e) = result {
        error!("{}", e);
    }
}

fn show_rds(status: &RdsStatus) {
    match status.countdown {
        Countdown::Remaining(secs) => {
            info!("RadioText '{}' from {}, {} s left", status.text, status.controller, secs)
        }
        Countdown::Expired => info!("RadioText '{}' expired", status.text),
        Countdown::Waiting => info!("RadioText: no message enabled"),
        Countdown::TestMode => info!("RadioText: suspended by test tone"),
        Countdown::CarrierOff => info!("RadioText '{}' from {}, carrier off", status.text, status.controller),
    }
}

fn show_report(report: &RadioReport) {
    info!(
        "QN8027 {:?}, {} MHz, carrier {}, PI 0x{:04X}, PTY {}, audio peak {} mV",
        report.fsm,
        report.frequency_mhz,
        if report.carrier { "on" } else { "off" },
        report.pi_code,
        report.pty_code,
        report.audio_peak_mv
    );
}
