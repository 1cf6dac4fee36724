//! The task that owns the transmitter.
//!
//! Every register access goes through here: console changes arrive over the
//! radio channel and the RDS scheduler runs between them.

use embassy_futures::select::{Either, select};
use embassy_nrf::twim::Twim;
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_time::{Delay, Duration, Instant, Ticker};
use log::{error, info, warn};
use qn8027::{I2cRegisterBus, Qn8027};
use rds_scheduler::{MessageSet, RdsScheduler, Tick};

use crate::events::{self, RadioCommand, RadioReport, SystemNotify};

pub type Radio = Qn8027<I2cRegisterBus<Twim<'static>>, Delay>;

const SCHEDULER_TICK: Duration = Duration::from_millis(100);

#[embassy_executor::task]
pub async fn radio_task(
    mut radio: Radio,
    messages: &'static MessageSet<ThreadModeRawMutex>,
    station_name: events::StationName,
) {
    let Ok(publisher) = events::notify_publisher() else {
        error!("No notification slot left for the radio task");
        return;
    };
    let mut scheduler = RdsScheduler::new(&station_name);
    scheduler.set_carrier(radio.carrier());
    let mut ticker = Ticker::every(SCHEDULER_TICK);
    publisher.publish_immediate(SystemNotify::RadioReady);

    loop {
        match select(ticker.next(), events::radio_receive()).await {
            Either::First(()) => {
                let tick = scheduler.poll(Instant::now(), messages, &mut radio).await;
                if !matches!(tick, Tick::Skipped) {
                    publisher.publish_immediate(SystemNotify::Rds(scheduler.status().clone()));
                }
            }
            Either::Second(command) => {
                info!("Radio command: {:?}", command);
                if let Err(e) = apply(&mut radio, &mut scheduler, &command).await {
                    error!("Radio command {:?} failed: {}", command, e);
                    continue;
                }
                match command {
                    RadioCommand::Carrier(true) => publisher.publish_immediate(SystemNotify::CarrierOn),
                    RadioCommand::Carrier(false) => publisher.publish_immediate(SystemNotify::CarrierOff),
                    RadioCommand::Report => match report(&mut radio).await {
                        Ok(report) => publisher.publish_immediate(SystemNotify::Report(report)),
                        Err(e) => warn!("Radio status unavailable: {}", e),
                    },
                    _ => {}
                }
            }
        }
    }
}

async fn apply(
    radio: &mut Radio,
    scheduler: &mut RdsScheduler,
    command: &RadioCommand,
) -> Result<(), qn8027::Error> {
    match command {
        RadioCommand::Carrier(on) => {
            radio.set_carrier(*on).await?;
            scheduler.set_carrier(*on);
        }
        RadioCommand::Frequency(mhz) => radio.set_frequency(*mhz).await?,
        RadioCommand::PiCode(pi_code) => {
            radio.set_pi_code(*pi_code);
            scheduler.restart();
        }
        RadioCommand::PtyCode(pty_code) => {
            radio.set_pty_code(*pty_code)?;
            scheduler.restart();
        }
        RadioCommand::StationName(name) => scheduler.set_station_name(name),
        RadioCommand::Mute(mute) => radio.set_mute(*mute).await?,
        RadioCommand::Mono(mono) => radio.set_mono(*mono).await?,
        RadioCommand::RfPower(power) => radio.set_rf_power(*power).await?,
        RadioCommand::TestMode(enabled) => scheduler.set_test_mode(*enabled),
        RadioCommand::Report => {}
    }
    Ok(())
}

async fn report(radio: &mut Radio) -> Result<RadioReport, qn8027::Error> {
    Ok(RadioReport {
        frequency_mhz: radio.frequency(),
        carrier: radio.carrier(),
        pi_code: radio.pi_code(),
        pty_code: radio.pty_code(),
        audio_peak_mv: radio.audio_peak_mv().await?,
        fsm: radio.fsm_state().await?,
    })
}
