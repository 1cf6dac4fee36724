//! Hands RDS groups to the chip one at a time.
//!
//! The chip flips STATUS bit 3 each time it has shifted out a group. There
//! is no sequence number, so the pacer samples that bit before loading a
//! group and then waits for it to change.

use embedded_hal_async::delay::DelayNs;
use log::{error, trace};

use crate::Error;
use crate::bus::RegisterBus;
use crate::rds::RdsGroup;
use crate::registers::{Qn8027Bits, Qn8027Reg, SystemRegister};

/// Delay between two STATUS polls.
pub const ACK_POLL_INTERVAL_MS: u32 = 5;
/// Polls before a group is given up on (100 ms in total).
pub const ACK_POLL_LIMIT: u32 = 20;

/// Outcome of sending a whole group sequence.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct TransmitReport {
    pub groups: usize,
    pub timeouts: usize,
}

#[derive(Debug, Default)]
pub struct RdsPacer {
    ack_baseline: bool,
}

impl RdsPacer {
    pub const fn new() -> Self {
        Self {
            ack_baseline: false,
        }
    }

    /// Last observed level of the RDS sent bit.
    pub fn ack_level(&self) -> bool {
        self.ack_baseline
    }

    /// Load `group` into RDSD0..RDSD7 and signal it with the RDS ready toggle.
    ///
    /// SYSTEM is rewritten from `system`, so carrier, mono and mute keep
    /// their cached state.
    pub async fn send_group<B: RegisterBus>(
        &mut self,
        bus: &mut B,
        system: &mut SystemRegister,
        group: &RdsGroup,
    ) -> Result<(), Error> {
        let status = bus.read_register(Qn8027Reg::STATUS).await?;
        self.ack_baseline = status & Qn8027Bits::STATUS_RDS_SENT != 0;

        for (reg, byte) in (Qn8027Reg::RDSD0..).zip(group.as_bytes()) {
            bus.write_register(reg, *byte).await?;
        }
        system.toggle_rds_ready();
        bus.write_register(Qn8027Reg::SYSTEM, system.bits()).await?;
        trace!("RDS group {:02X?}", group.as_bytes());
        Ok(())
    }

    /// Poll STATUS until the RDS sent bit differs from the sampled level.
    ///
    /// Returns `Error::AckTimeout` after [`ACK_POLL_LIMIT`] polls. The caller
    /// carries on with the next group; the baseline is re-sampled by the
    /// next [`RdsPacer::send_group`].
    pub async fn wait_for_ack<B: RegisterBus, D: DelayNs>(
        &mut self,
        bus: &mut B,
        delay: &mut D,
    ) -> Result<(), Error> {
        for _ in 0..ACK_POLL_LIMIT {
            let status = bus.read_register(Qn8027Reg::STATUS).await?;
            let sent = status & Qn8027Bits::STATUS_RDS_SENT != 0;
            if sent != self.ack_baseline {
                self.ack_baseline = sent;
                return Ok(());
            }
            delay.delay_ms(ACK_POLL_INTERVAL_MS).await;
        }
        error!(
            "RDS group not acknowledged within {} ms",
            ACK_POLL_LIMIT * ACK_POLL_INTERVAL_MS
        );
        Err(Error::AckTimeout)
    }

    /// Send every group in order, waiting for each acknowledgement.
    ///
    /// Acknowledgement timeouts are counted, not returned. Bus errors stop
    /// the sequence.
    pub async fn transmit<B, D, I>(
        &mut self,
        bus: &mut B,
        delay: &mut D,
        system: &mut SystemRegister,
        groups: I,
    ) -> Result<TransmitReport, Error>
    where
        B: RegisterBus,
        D: DelayNs,
        I: IntoIterator<Item = RdsGroup>,
    {
        let mut report = TransmitReport::default();
        for group in groups {
            self.send_group(bus, system, &group).await?;
            report.groups += 1;
            match self.wait_for_ack(bus, delay).await {
                Ok(()) => {}
                Err(Error::AckTimeout) => report.timeouts += 1,
                Err(e) => return Err(e),
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use embassy_futures::block_on;

    use super::*;
    use crate::mock::{MockDelay, SimBus};
    use crate::rds::radio_text_groups;

    #[test]
    fn send_group_writes_data_then_toggles_ready() {
        let mut bus = SimBus::new();
        let mut system = SystemRegister {
            carrier: true,
            mute: true,
            ..Default::default()
        };
        let mut pacer = RdsPacer::new();
        let group = RdsGroup([1, 2, 3, 4, 5, 6, 7, 8]);

        block_on(pacer.send_group(&mut bus, &mut system, &group)).unwrap();
        assert_eq!(bus.registers[0x08..0x10], [1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(bus.registers[0x00], 0x20 | 0x08 | 0x04);

        block_on(pacer.send_group(&mut bus, &mut system, &group)).unwrap();
        assert_eq!(bus.registers[0x00], 0x20 | 0x08);
        // The SYSTEM write is always the last one of a group.
        assert_eq!(bus.writes.last().map(|w| w.0), Some(0x00));
    }

    #[test]
    fn ack_is_edge_triggered() {
        let mut bus = SimBus::new().with_ack_after(3);
        let mut delay = MockDelay::default();
        let mut system = SystemRegister::default();
        let mut pacer = RdsPacer::new();

        block_on(pacer.send_group(&mut bus, &mut system, &RdsGroup([0; 8]))).unwrap();
        let before = bus.status_reads;
        block_on(pacer.wait_for_ack(&mut bus, &mut delay)).unwrap();
        assert_eq!(bus.status_reads - before, 3);
        assert_eq!(delay.elapsed_ms(), 2 * ACK_POLL_INTERVAL_MS as u64);
        assert!(pacer.ack_level());

        // Bit now stays high: a level check would pass, an edge check must not.
        bus.ack_after = None;
        block_on(pacer.send_group(&mut bus, &mut system, &RdsGroup([0; 8]))).unwrap();
        assert_eq!(
            block_on(pacer.wait_for_ack(&mut bus, &mut delay)),
            Err(Error::AckTimeout)
        );
    }

    #[test]
    fn ack_timeout_takes_exactly_twenty_polls() {
        let mut bus = SimBus::new();
        let mut delay = MockDelay::default();
        let mut pacer = RdsPacer::new();

        let result = block_on(pacer.wait_for_ack(&mut bus, &mut delay));
        assert_eq!(result, Err(Error::AckTimeout));
        assert_eq!(bus.status_reads, ACK_POLL_LIMIT as usize);
        assert_eq!(delay.elapsed_ms(), 100);
    }

    #[test]
    fn transmit_continues_after_a_timeout() {
        let mut bus = SimBus::new();
        let mut delay = MockDelay::default();
        let mut system = SystemRegister::default();
        let mut pacer = RdsPacer::new();

        let report = block_on(pacer.transmit(
            &mut bus,
            &mut delay,
            &mut system,
            radio_text_groups(0x6400, 0, "never acked"),
        ))
        .unwrap();
        assert_eq!(report, TransmitReport { groups: 3, timeouts: 3 });
        assert_eq!(delay.elapsed_ms(), 300);
    }

    #[test]
    fn transmit_with_a_healthy_chip_has_no_timeouts() {
        let mut bus = SimBus::new().with_ack_after(1);
        let mut delay = MockDelay::default();
        let mut system = SystemRegister::default();
        let mut pacer = RdsPacer::new();

        let report = block_on(pacer.transmit(
            &mut bus,
            &mut delay,
            &mut system,
            radio_text_groups(0x6400, 0, "ok"),
        ))
        .unwrap();
        assert_eq!(report, TransmitReport { groups: 1, timeouts: 0 });
        assert_eq!(delay.elapsed_ms(), 0);
    }

    #[test]
    fn bus_errors_abort_the_sequence() {
        let mut bus = SimBus::new().failing_after(4);
        let mut delay = MockDelay::default();
        let mut system = SystemRegister::default();
        let mut pacer = RdsPacer::new();

        let result = block_on(pacer.transmit(
            &mut bus,
            &mut delay,
            &mut system,
            radio_text_groups(0x6400, 0, "abc"),
        ));
        assert!(matches!(result, Err(Error::I2c(_))));
    }
}
