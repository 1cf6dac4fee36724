//! Async driver for the Quintic QN8027 FM transmitter.
//!
//! Besides the usual tuning and audio controls the driver sends RDS program
//! service names and radio text. Text is packed into RDS groups by
//! [`rds::RdsGroups`] and handed to the chip one group at a time by
//! [`pacer::RdsPacer`], which waits for the chip to acknowledge each group.

#![no_std]
#![allow(async_fn_in_trait)]

use core::fmt;

use embedded_hal_async::delay::DelayNs;
use log::{debug, error, info, warn};

pub mod bus;
pub mod pacer;
pub mod rds;
pub mod registers;
pub mod settings;

#[cfg(test)]
mod mock;

pub use bus::{I2cRegisterBus, RegisterBus};
pub use pacer::{RdsPacer, TransmitReport};
pub use rds::{RdsGroup, RdsGroups, TextKind};
pub use registers::{AutoOff, FsmState, InputImpedance};

use registers::{GpltRegister, Qn8027Bits, Qn8027Reg, SystemRegister, VgaRegister};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// I2C communication error
    I2c(embedded_hal_async::i2c::ErrorKind),
    /// Invalid parameter provided
    InvalidParameter,
    /// Chip identification registers do not describe a QN8027
    WrongChip { cid1: u8, cid2: u8 },
    /// RDS group was not acknowledged in time
    AckTimeout,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::I2c(kind) => write!(f, "I2C error: {kind:?}"),
            Error::InvalidParameter => f.write_str("invalid parameter"),
            Error::WrongChip { cid1, cid2 } => {
                write!(f, "unexpected chip id CID1=0x{cid1:02X} CID2=0x{cid2:02X}")
            }
            Error::AckTimeout => f.write_str("RDS acknowledge timeout"),
        }
    }
}

impl core::error::Error for Error {}

/// Lowest and highest carrier the synthesizer can produce, in MHz.
pub const FREQUENCY_MIN_MHZ: f32 = 76.0;
pub const FREQUENCY_MAX_MHZ: f32 = 108.0;

/// RF output level written to PAC.
#[derive(Debug, Copy, Clone, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum RfPower {
    Low,
    Medium,
    High,
}

impl RfPower {
    pub fn pac_value(self) -> u8 {
        match self {
            RfPower::Low => 27,
            RfPower::Medium => 40,
            RfPower::High => 78,
        }
    }
}

/// QN8027 transmitter.
///
/// The driver keeps images of the write-only registers and composes every
/// write from them. All register traffic, RDS included, goes through the
/// one [`RegisterBus`] it owns.
#[derive(Debug)]
pub struct Qn8027<B: RegisterBus, D: DelayNs> {
    bus: B,
    delay: D,
    system: SystemRegister,
    gplt: GpltRegister,
    vga: VgaRegister,
    channel: u16,
    pac_power: u8,
    peak_clear: bool,
    rds_enabled: bool,
    rds_deviation: u8,
    pi_code: u16,
    pty_code: u8,
    pacer: RdsPacer,
}

impl<B: RegisterBus, D: DelayNs> Qn8027<B, D> {
    pub const DEFAULT_PI_CODE: u16 = 0x6400;

    pub fn new(bus: B, delay: D) -> Self {
        Self {
            bus,
            delay,
            system: SystemRegister::default(),
            gplt: GpltRegister::default(),
            vga: VgaRegister::default(),
            channel: 0,
            pac_power: RfPower::High.pac_value(),
            peak_clear: false,
            rds_enabled: false,
            rds_deviation: 6,
            pi_code: Self::DEFAULT_PI_CODE,
            pty_code: 0,
            pacer: RdsPacer::new(),
        }
    }

    pub fn release(self) -> (B, D) {
        (self.bus, self.delay)
    }

    /// Verify the chip identity
    /// Returns `Error::WrongChip` when CID1/CID2 do not match the QN8027 family
    pub async fn check_chip_id(&mut self) -> Result<(), Error> {
        let cid1 = self.bus.read_register(Qn8027Reg::CID1).await?;
        let cid2 = self.bus.read_register(Qn8027Reg::CID2).await?;
        if cid1 == 0x00
            || cid1 & Qn8027Bits::CID1_FAMILY_MASK != 0
            || cid2 & Qn8027Bits::CID2_VERSION_MASK != Qn8027Bits::CID2_VERSION
        {
            error!("QN8027 not found: CID1=0x{:02X} CID2=0x{:02X}", cid1, cid2);
            return Err(Error::WrongChip { cid1, cid2 });
        }
        debug!("QN8027 CID1=0x{:02X} CID2=0x{:02X}", cid1, cid2);
        Ok(())
    }

    /// Bring the chip into a muted, RDS enabled state with the carrier off.
    /// Crystal: 12 MHz between XTAL1/XTAL2 at 30 % drive current.
    pub async fn init(&mut self) -> Result<(), Error> {
        info!("Initializing QN8027");
        self.check_chip_id().await?;
        self.reset().await?;
        // Clock source 0 (crystal) in bits 7..6, drive current in 5..0.
        self.bus
            .write_register(Qn8027Reg::XTL, ((30u16 * 64) / 100) as u8)
            .await?;
        self.vga.crystal_24mhz = false;
        self.write_vga().await?;
        // 0x81 * 0.58 kHz = 75 kHz total deviation.
        self.bus.write_register(Qn8027Reg::FDEV, 0x81).await?;
        self.gplt = GpltRegister::default();
        self.write_gplt().await?;
        self.clear_audio_peak().await?;
        self.system.mute = true;
        self.write_system().await?;
        self.set_rds(true, 10).await?;
        self.delay.delay_ms(20).await;
        let state = self.fsm_state().await?;
        info!("QN8027 ready, FSM {:?}", state);
        Ok(())
    }

    /// Soft reset; all registers return to their power-on values.
    pub async fn reset(&mut self) -> Result<(), Error> {
        self.bus
            .write_register(Qn8027Reg::SYSTEM, Qn8027Bits::SYSTEM_RESET)
            .await?;
        self.delay.delay_us(100).await;
        self.system = SystemRegister::default();
        self.write_system().await?;
        self.delay.delay_ms(30).await;
        Ok(())
    }

    /// Re-run the power amplifier calibration against the attached antenna.
    pub async fn recalibrate(&mut self) -> Result<(), Error> {
        self.bus
            .write_register(Qn8027Reg::SYSTEM, Qn8027Bits::SYSTEM_RECAL)
            .await?;
        self.delay.delay_us(100).await;
        self.write_system().await
    }

    /// Set the carrier frequency
    /// `frequency` specifies the frequency in MHz, in 50 kHz steps
    /// Returns `Error::InvalidParameter` outside 76.0..=108.0 MHz
    pub async fn set_frequency(&mut self, frequency: f32) -> Result<(), Error> {
        if !(FREQUENCY_MIN_MHZ..=FREQUENCY_MAX_MHZ).contains(&frequency) {
            return Err(Error::InvalidParameter);
        }
        let channel = (((frequency + 0.001) * 100.0 - 7600.0) / 5.0) as u16;
        let carrier = self.system.carrier;
        self.system.carrier = false;
        self.system.channel_high = (channel >> 8) as u8 & Qn8027Bits::SYSTEM_CH_HIGH_MASK;
        self.write_system().await?;
        self.bus
            .write_register(Qn8027Reg::CH1, (channel & 0xFF) as u8)
            .await?;
        self.channel = channel;
        self.system.carrier = carrier;
        self.write_system().await?;
        info!("Carrier frequency {} MHz (channel {})", frequency, channel);
        Ok(())
    }

    /// Frequency in MHz from the cached channel index.
    pub fn frequency(&self) -> f32 {
        (self.channel as f32 * 5.0 + 7600.0) / 100.0
    }

    pub async fn set_carrier(&mut self, on: bool) -> Result<(), Error> {
        self.system.carrier = on;
        self.write_system().await
    }

    pub async fn set_mute(&mut self, mute: bool) -> Result<(), Error> {
        self.system.mute = mute;
        self.write_system().await
    }

    pub async fn set_mono(&mut self, mono: bool) -> Result<(), Error> {
        self.system.mono = mono;
        self.write_system().await
    }

    pub fn carrier(&self) -> bool {
        self.system.carrier
    }

    /// `true` selects the 75 µs (Americas) curve, `false` 50 µs.
    pub async fn set_pre_emphasis(&mut self, us75: bool) -> Result<(), Error> {
        self.gplt.pre_emphasis_75us = us75;
        self.write_gplt().await
    }

    pub async fn set_auto_off(&mut self, auto_off: AutoOff) -> Result<(), Error> {
        self.gplt.auto_off = auto_off;
        self.write_gplt().await
    }

    pub async fn set_input_impedance(&mut self, impedance: InputImpedance) -> Result<(), Error> {
        self.vga.impedance = impedance;
        self.write_vga().await
    }

    /// Digital gain in dB, 0..=2
    pub async fn set_digital_gain(&mut self, gain: u8) -> Result<(), Error> {
        if gain > 2 {
            return Err(Error::InvalidParameter);
        }
        self.vga.digital_gain = gain;
        self.write_vga().await
    }

    /// Set the RF output level.
    /// The chip latches PAC on the next carrier off/on, so an active carrier
    /// is cycled.
    pub async fn set_rf_power(&mut self, power: RfPower) -> Result<(), Error> {
        self.pac_power = power.pac_value() & Qn8027Bits::PAC_POWER_MASK;
        self.write_pac().await?;
        if self.system.carrier {
            self.system.carrier = false;
            self.write_system().await?;
            self.delay.delay_ms(10).await;
            self.system.carrier = true;
            self.write_system().await?;
        }
        Ok(())
    }

    /// Enable or disable the RDS subcarrier.
    /// `deviation` is in 0.35 kHz steps, 0..=127
    pub async fn set_rds(&mut self, enabled: bool, deviation: u8) -> Result<(), Error> {
        if deviation > Qn8027Bits::RDS_DEVIATION_MASK {
            return Err(Error::InvalidParameter);
        }
        self.rds_enabled = enabled;
        self.rds_deviation = deviation;
        let mut value = deviation;
        if enabled {
            value |= Qn8027Bits::RDS_ENABLE;
        }
        self.bus.write_register(Qn8027Reg::RDS, value).await
    }

    pub fn set_pi_code(&mut self, pi_code: u16) {
        self.pi_code = pi_code;
    }

    pub fn pi_code(&self) -> u16 {
        self.pi_code
    }

    /// Programme type, 0..=31
    pub fn set_pty_code(&mut self, pty_code: u8) -> Result<(), Error> {
        if pty_code > 31 {
            return Err(Error::InvalidParameter);
        }
        self.pty_code = pty_code;
        Ok(())
    }

    pub fn pty_code(&self) -> u8 {
        self.pty_code
    }

    /// Read STATUS and restart peak detection.
    pub async fn status(&mut self) -> Result<u8, Error> {
        let status = self.bus.read_register(Qn8027Reg::STATUS).await?;
        self.clear_audio_peak().await?;
        Ok(status)
    }

    pub async fn fsm_state(&mut self) -> Result<FsmState, Error> {
        let status = self.bus.read_register(Qn8027Reg::STATUS).await?;
        Ok(FsmState::from_status(status))
    }

    /// Peak input level since the previous call, in mV (45 mV per count).
    pub async fn audio_peak_mv(&mut self) -> Result<u16, Error> {
        let status = self.status().await?;
        Ok(u16::from(status >> Qn8027Bits::STATUS_AUDIO_PEAK_SHIFT) * 45)
    }

    /// Send the program service name; text beyond 8 bytes is dropped.
    pub async fn send_station_name(&mut self, name: &str) -> Result<TransmitReport, Error> {
        let groups = rds::station_name_groups(self.pi_code, self.pty_code, name);
        self.send_rds(groups).await
    }

    /// Send radio text; text beyond 64 bytes is dropped.
    pub async fn send_radio_text(&mut self, text: &str) -> Result<TransmitReport, Error> {
        let groups = rds::radio_text_groups(self.pi_code, self.pty_code, text);
        self.send_rds(groups).await
    }

    async fn send_rds(&mut self, groups: RdsGroups) -> Result<TransmitReport, Error> {
        if !self.rds_enabled {
            warn!("RDS subcarrier is disabled, {:?} not sent", groups.kind());
        }
        let report = self
            .pacer
            .transmit(&mut self.bus, &mut self.delay, &mut self.system, groups)
            .await?;
        if report.timeouts > 0 {
            warn!(
                "{} of {} RDS groups were not acknowledged",
                report.timeouts, report.groups
            );
        }
        Ok(report)
    }

    async fn clear_audio_peak(&mut self) -> Result<(), Error> {
        self.peak_clear = !self.peak_clear;
        self.write_pac().await
    }

    async fn write_pac(&mut self) -> Result<(), Error> {
        let mut value = self.pac_power;
        if self.peak_clear {
            value |= Qn8027Bits::PAC_PEAK_CLEAR;
        }
        self.bus.write_register(Qn8027Reg::PAC, value).await
    }

    async fn write_system(&mut self) -> Result<(), Error> {
        self.bus
            .write_register(Qn8027Reg::SYSTEM, self.system.bits())
            .await
    }

    async fn write_gplt(&mut self) -> Result<(), Error> {
        self.bus
            .write_register(Qn8027Reg::GPLT, self.gplt.bits())
            .await
    }

    async fn write_vga(&mut self) -> Result<(), Error> {
        self.bus.write_register(Qn8027Reg::VGA, self.vga.bits()).await
    }
}
