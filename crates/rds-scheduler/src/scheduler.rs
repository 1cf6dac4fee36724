//! Once-a-second radio text scheduling.
//!
//! The scheduler keeps one message on air until its duration runs out,
//! then asks the [`MessageSet`] for the next one. A message that is picked
//! again with unchanged text is not resent.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{Duration, Instant};
use embedded_hal_async::delay::DelayNs;
use heapless::String;
use log::{error, info, warn};
use qn8027::rds::STATION_NAME_LEN;
use qn8027::{Qn8027, RegisterBus};

use crate::entry::MessageText;
use crate::set::MessageSet;

/// Interval between scheduling decisions.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Where on-air text goes.
pub trait RdsTextSink {
    async fn send_station_name(&mut self, name: &str) -> Result<(), qn8027::Error>;
    async fn send_radio_text(&mut self, text: &str) -> Result<(), qn8027::Error>;
}

impl<B: RegisterBus, D: DelayNs> RdsTextSink for Qn8027<B, D> {
    async fn send_station_name(&mut self, name: &str) -> Result<(), qn8027::Error> {
        Qn8027::send_station_name(self, name).await.map(|_| ())
    }

    async fn send_radio_text(&mut self, text: &str) -> Result<(), qn8027::Error> {
        Qn8027::send_radio_text(self, text).await.map(|_| ())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RdsState {
    /// Nothing on air, waiting for an enabled message.
    Idle,
    Displaying {
        text: MessageText,
        controller: MessageText,
        expires_at: Instant,
    },
}

/// Countdown part of the status readout.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Countdown {
    Waiting,
    /// Whole seconds left, rounded up.
    Remaining(u32),
    Expired,
    TestMode,
    CarrierOff,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RdsStatus {
    pub text: MessageText,
    pub controller: MessageText,
    pub countdown: Countdown,
}

/// What one scheduling step did.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Tick {
    /// Test tone running, the scheduler stood aside.
    Suspended,
    /// No message enabled.
    Waiting,
    /// Current message still has time left.
    Holding,
    /// A message with new text went to the transmitter.
    Sent,
    /// The next message carries the text already on air.
    Unchanged,
    /// The transmitter rejected the text.
    Failed,
    /// The message set could not be locked, retried next time.
    Busy,
    /// Polled again inside the same interval.
    Skipped,
}

pub struct RdsScheduler {
    state: RdsState,
    status: RdsStatus,
    last_sent: Option<MessageText>,
    last_poll: Option<Instant>,
    station_name: String<STATION_NAME_LEN>,
    test_mode: bool,
    carrier: bool,
}

impl RdsScheduler {
    pub fn new(station_name: &str) -> Self {
        let mut scheduler = Self {
            state: RdsState::Idle,
            status: RdsStatus {
                text: MessageText::new(),
                controller: MessageText::new(),
                countdown: Countdown::Waiting,
            },
            last_sent: None,
            last_poll: None,
            station_name: String::new(),
            test_mode: false,
            carrier: true,
        };
        scheduler.set_station_name(station_name);
        scheduler
    }

    pub fn state(&self) -> &RdsState {
        &self.state
    }

    pub fn status(&self) -> &RdsStatus {
        &self.status
    }

    /// Text the transmitter currently carries.
    pub fn last_sent(&self) -> Option<&str> {
        self.last_sent.as_deref()
    }

    /// Program service name sent ahead of every new radio text.
    /// Longer names are cut to 8 bytes.
    pub fn set_station_name(&mut self, name: &str) {
        self.station_name.clear();
        for c in name.chars() {
            if self.station_name.push(c).is_err() {
                break;
            }
        }
        self.restart();
    }

    /// While the test tone runs it owns the RDS output.
    pub fn set_test_mode(&mut self, enabled: bool) {
        if self.test_mode != enabled {
            self.test_mode = enabled;
            self.restart();
        }
    }

    /// Rotation carries on with the carrier off; only the readout changes.
    /// The text is sent again at the next selection.
    pub fn set_carrier(&mut self, on: bool) {
        if self.carrier != on {
            self.carrier = on;
            self.last_sent = None;
            if !on {
                self.status.countdown = Countdown::CarrierOff;
            }
        }
    }

    /// Drop the current message; the next step picks and sends afresh.
    pub fn restart(&mut self) {
        self.state = RdsState::Idle;
        self.last_sent = None;
        self.last_poll = None;
    }

    /// Run [`RdsScheduler::tick`] if a full interval passed since the last
    /// step.
    pub async fn poll<M: RawMutex, S: RdsTextSink>(
        &mut self,
        now: Instant,
        messages: &MessageSet<M>,
        sink: &mut S,
    ) -> Tick {
        if let Some(last) = self.last_poll {
            if now.saturating_duration_since(last) < POLL_INTERVAL {
                return Tick::Skipped;
            }
        }
        self.last_poll = Some(now);
        self.tick(now, messages, sink).await
    }

    /// One scheduling step at `now`.
    pub async fn tick<M: RawMutex, S: RdsTextSink>(
        &mut self,
        now: Instant,
        messages: &MessageSet<M>,
        sink: &mut S,
    ) -> Tick {
        if self.test_mode {
            self.status.countdown = Countdown::TestMode;
            return Tick::Suspended;
        }

        if let RdsState::Displaying { expires_at, .. } = &self.state {
            if now < *expires_at {
                let left = *expires_at - now;
                self.status.countdown =
                    self.readout(Countdown::Remaining(left.as_millis().div_ceil(1000) as u32));
                return Tick::Holding;
            }
            self.status.countdown = self.readout(Countdown::Expired);
        }

        let next = match messages.next_rds_message().await {
            Ok(next) => next,
            Err(e) => {
                warn!("RDS rotation skipped: {}", e);
                return Tick::Busy;
            }
        };

        let Some(info) = next else {
            if self.state != RdsState::Idle {
                info!("No RDS radio text enabled");
            }
            self.state = RdsState::Idle;
            self.status.text.clear();
            self.status.controller.clear();
            self.status.countdown = self.readout(Countdown::Waiting);
            return Tick::Waiting;
        };

        let duration = Duration::from_millis(u64::from(info.duration_ms));
        let outcome = if self.last_sent.as_ref() == Some(&info.text) {
            Tick::Unchanged
        } else {
            self.send(&info.text, &info.controller_name, sink).await
        };

        self.status.text = info.text.clone();
        self.status.controller = info.controller_name.clone();
        self.status.countdown = self.readout(Countdown::Remaining(duration.as_secs() as u32));
        self.state = RdsState::Displaying {
            text: info.text,
            controller: info.controller_name,
            expires_at: now + duration,
        };
        outcome
    }

    fn readout(&self, countdown: Countdown) -> Countdown {
        if self.carrier { countdown } else { Countdown::CarrierOff }
    }

    async fn send<S: RdsTextSink>(&mut self, text: &str, controller: &str, sink: &mut S) -> Tick {
        info!("{} sending RDS radio text '{}'", controller, text);
        let result = match sink.send_station_name(&self.station_name).await {
            Ok(()) => sink.send_radio_text(text).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => {
                self.last_sent = MessageText::try_from(text).ok();
                Tick::Sent
            }
            Err(e) => {
                // Retried when the message comes round again.
                error!("RDS send failed: {}", e);
                self.last_sent = None;
                Tick::Failed
            }
        }
    }
}
