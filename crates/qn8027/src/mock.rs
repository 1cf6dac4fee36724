//! Simulated register file and delay for host tests.

extern crate std;

use std::vec::Vec;

use embedded_hal::i2c::ErrorKind;
use embedded_hal_async::delay::DelayNs;

use crate::Error;
use crate::bus::RegisterBus;
use crate::registers::{Qn8027Bits, Qn8027Reg};

/// Register file that flips the RDS sent bit a configurable number of
/// STATUS polls after each RDS ready toggle.
pub struct SimBus {
    pub registers: [u8; 0x20],
    pub writes: Vec<(u8, u8)>,
    pub status_reads: usize,
    pub ack_after: Option<usize>,
    pending_ack: Option<usize>,
    fail_after: Option<usize>,
    operations: usize,
}

impl SimBus {
    pub fn new() -> Self {
        let mut registers = [0u8; 0x20];
        registers[Qn8027Reg::CID1 as usize] = 0x01;
        registers[Qn8027Reg::CID2 as usize] = 0x41;
        Self {
            registers,
            writes: Vec::new(),
            status_reads: 0,
            ack_after: None,
            pending_ack: None,
            fail_after: None,
            operations: 0,
        }
    }

    pub fn with_ack_after(mut self, polls: usize) -> Self {
        self.ack_after = Some(polls);
        self
    }

    pub fn failing_after(mut self, operations: usize) -> Self {
        self.fail_after = Some(operations);
        self
    }

    pub fn writes_to(&self, reg: u8) -> Vec<u8> {
        self.writes
            .iter()
            .filter(|(r, _)| *r == reg)
            .map(|(_, v)| *v)
            .collect()
    }

    fn count_operation(&mut self) -> Result<(), Error> {
        self.operations += 1;
        match self.fail_after {
            Some(limit) if self.operations > limit => Err(Error::I2c(ErrorKind::Other)),
            _ => Ok(()),
        }
    }
}

impl RegisterBus for SimBus {
    async fn read_register(&mut self, reg: u8) -> Result<u8, Error> {
        self.count_operation()?;
        if reg == Qn8027Reg::STATUS {
            self.status_reads += 1;
            if let Some(remaining) = self.pending_ack.as_mut() {
                *remaining -= 1;
                if *remaining == 0 {
                    self.registers[reg as usize] ^= Qn8027Bits::STATUS_RDS_SENT;
                    self.pending_ack = None;
                }
            }
        }
        Ok(self.registers[reg as usize])
    }

    async fn write_register(&mut self, reg: u8, value: u8) -> Result<(), Error> {
        self.count_operation()?;
        if reg == Qn8027Reg::SYSTEM {
            let previous = self.registers[reg as usize];
            if (previous ^ value) & Qn8027Bits::SYSTEM_RDSRDY != 0 {
                self.pending_ack = self.ack_after;
            }
        }
        self.registers[reg as usize] = value;
        self.writes.push((reg, value));
        Ok(())
    }
}

/// Delay that only accounts for the requested time.
#[derive(Debug, Default)]
pub struct MockDelay {
    elapsed_ns: u64,
}

impl MockDelay {
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ns / 1_000_000
    }
}

impl DelayNs for MockDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += u64::from(ns);
    }
}
