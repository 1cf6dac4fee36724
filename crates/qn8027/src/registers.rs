//! QN8027 register map and the software images of the write-only
//! configuration registers.
//!
//! The chip offers no useful read-back for SYSTEM, GPLT and VGA while it is
//! transmitting, so every write is composed from the cached image held here.

pub struct Qn8027Reg;
impl Qn8027Reg {
    pub const SYSTEM: u8 = 0x00;
    pub const CH1: u8 = 0x01;
    pub const GPLT: u8 = 0x02;
    pub const XTL: u8 = 0x03;
    pub const VGA: u8 = 0x04;
    pub const CID1: u8 = 0x05;
    pub const CID2: u8 = 0x06;
    pub const STATUS: u8 = 0x07;
    /// First of the eight RDS data registers (RDSD0..RDSD7).
    pub const RDSD0: u8 = 0x08;
    pub const PAC: u8 = 0x10;
    pub const FDEV: u8 = 0x11;
    pub const RDS: u8 = 0x12;
}

pub struct Qn8027Bits;
impl Qn8027Bits {
    // SYSTEM
    pub const SYSTEM_RESET: u8 = 0x80;
    pub const SYSTEM_RECAL: u8 = 0x40;
    pub const SYSTEM_TXREQ: u8 = 0x20;
    pub const SYSTEM_MONO: u8 = 0x10;
    pub const SYSTEM_MUTE: u8 = 0x08;
    pub const SYSTEM_RDSRDY: u8 = 0x04;
    pub const SYSTEM_CH_HIGH_MASK: u8 = 0x03;
    // STATUS
    pub const STATUS_RDS_SENT: u8 = 0x08;
    pub const STATUS_FSM_MASK: u8 = 0x07;
    pub const STATUS_AUDIO_PEAK_SHIFT: u8 = 4;
    // RDS
    pub const RDS_ENABLE: u8 = 0x80;
    pub const RDS_DEVIATION_MASK: u8 = 0x7F;
    // PAC
    pub const PAC_PEAK_CLEAR: u8 = 0x80;
    pub const PAC_POWER_MASK: u8 = 0x7F;
    // CID
    pub const CID1_FAMILY_MASK: u8 = 0x0C;
    pub const CID2_VERSION_MASK: u8 = 0xF0;
    pub const CID2_VERSION: u8 = 0x40;
}

/// Transmitter state machine as reported in STATUS[2:0].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FsmState {
    Resetting,
    Recalibrating,
    Idle,
    TxReady,
    PaCalibration,
    Transmitting,
    PaOff,
    Undefined,
}

impl FsmState {
    pub fn from_status(status: u8) -> Self {
        match status & Qn8027Bits::STATUS_FSM_MASK {
            0 => FsmState::Resetting,
            1 => FsmState::Recalibrating,
            2 => FsmState::Idle,
            3 => FsmState::TxReady,
            4 => FsmState::PaCalibration,
            5 => FsmState::Transmitting,
            6 => FsmState::PaOff,
            _ => FsmState::Undefined,
        }
    }
}

/// Image of the SYSTEM register.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct SystemRegister {
    pub carrier: bool,
    pub mono: bool,
    pub mute: bool,
    /// Alternates on every RDS group handed to the chip.
    pub rds_ready: bool,
    /// Bits 9..8 of the channel index.
    pub channel_high: u8,
}

impl SystemRegister {
    pub fn bits(&self) -> u8 {
        let mut value = self.channel_high & Qn8027Bits::SYSTEM_CH_HIGH_MASK;
        if self.carrier {
            value |= Qn8027Bits::SYSTEM_TXREQ;
        }
        if self.mono {
            value |= Qn8027Bits::SYSTEM_MONO;
        }
        if self.mute {
            value |= Qn8027Bits::SYSTEM_MUTE;
        }
        if self.rds_ready {
            value |= Qn8027Bits::SYSTEM_RDSRDY;
        }
        value
    }

    /// Flip the RDS ready flag, returning the new value.
    pub fn toggle_rds_ready(&mut self) -> bool {
        self.rds_ready = !self.rds_ready;
        self.rds_ready
    }
}

/// Silence timeout after which the chip turns its power amplifier off.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AutoOff {
    After60s,
    Never,
}

/// Image of the GPLT register.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct GpltRegister {
    /// `true` selects 75 µs, `false` 50 µs.
    pub pre_emphasis_75us: bool,
    pub scramble: bool,
    pub auto_off: AutoOff,
    /// Pilot deviation in percent of 75 kHz, 7..=10.
    pub pilot_deviation: u8,
}

impl Default for GpltRegister {
    fn default() -> Self {
        Self {
            pre_emphasis_75us: true,
            scramble: false,
            auto_off: AutoOff::After60s,
            pilot_deviation: 9,
        }
    }
}

impl GpltRegister {
    pub fn bits(&self) -> u8 {
        let mut value = self.pilot_deviation & 0x0F;
        if self.pre_emphasis_75us {
            value |= 0x80;
        }
        if self.scramble {
            value |= 0x40;
        }
        value |= match self.auto_off {
            AutoOff::After60s => 0x20,
            AutoOff::Never => 0x30,
        };
        value
    }
}

/// Audio input impedance of the left/right inputs.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum InputImpedance {
    K5,
    K10,
    K20,
    K40,
}

impl InputImpedance {
    pub fn from_kohms(kohms: u8) -> Option<Self> {
        match kohms {
            5 => Some(InputImpedance::K5),
            10 => Some(InputImpedance::K10),
            20 => Some(InputImpedance::K20),
            40 => Some(InputImpedance::K40),
            _ => None,
        }
    }

    fn bits(self) -> u8 {
        match self {
            InputImpedance::K5 => 0,
            InputImpedance::K10 => 1,
            InputImpedance::K20 => 2,
            InputImpedance::K40 => 3,
        }
    }
}

/// Image of the VGA register.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VgaRegister {
    pub crystal_24mhz: bool,
    /// Input buffer gain step, 0..=5.
    pub buffer_gain: u8,
    /// Digital gain in dB, 0..=2.
    pub digital_gain: u8,
    pub impedance: InputImpedance,
}

impl Default for VgaRegister {
    fn default() -> Self {
        Self {
            crystal_24mhz: false,
            buffer_gain: 3,
            digital_gain: 0,
            impedance: InputImpedance::K20,
        }
    }
}

impl VgaRegister {
    pub fn bits(&self) -> u8 {
        let mut value = (self.buffer_gain.min(5) << 4) | (self.digital_gain.min(2) << 2);
        value |= self.impedance.bits();
        if self.crystal_24mhz {
            value |= 0x80;
        }
        value
    }
}
