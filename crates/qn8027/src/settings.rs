//! Operator facing transmitter settings.
//!
//! Every setter validates its input and leaves the stored value untouched
//! when it is rejected. The error renders as the message shown to whoever
//! made the request.

use core::fmt;

use embedded_hal_async::delay::DelayNs;
use heapless::String;
use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::rds::STATION_NAME_LEN;
use crate::{AutoOff, Error, Qn8027, RegisterBus, RfPower};

/// Broadcast band accepted from the operator, in MHz.
pub const BAND_MIN_MHZ: f32 = 87.5;
pub const BAND_MAX_MHZ: f32 = 108.0;
pub const PI_CODE_MIN: u16 = 0x00FF;
pub const PTY_CODE_MAX: u8 = 31;
pub const STATION_NAME_MIN: usize = 4;

#[derive(Debug, Copy, Clone, PartialEq)]
#[non_exhaustive]
pub enum SettingsError {
    FrequencyOutOfRange(f32),
    PiCodeOutOfRange(u16),
    PtyCodeOutOfRange(u8),
    StationNameTooShort(usize),
    StationNameTooLong(usize),
    NotANumber,
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::FrequencyOutOfRange(mhz) => write!(
                f,
                "Frequency {mhz:.1} MHz out of range ({BAND_MIN_MHZ:.1} - {BAND_MAX_MHZ:.1})"
            ),
            SettingsError::PiCodeOutOfRange(pi) => {
                write!(f, "PI code 0x{pi:04X} out of range (0x{PI_CODE_MIN:04X} - 0xFFFF)")
            }
            SettingsError::PtyCodeOutOfRange(pty) => {
                write!(f, "PTY code {pty} out of range (0 - {PTY_CODE_MAX})")
            }
            SettingsError::StationNameTooShort(len) => write!(
                f,
                "Station name is too short ({len} chars, minimum {STATION_NAME_MIN})"
            ),
            SettingsError::StationNameTooLong(len) => write!(
                f,
                "Station name is too long ({len} chars, maximum {STATION_NAME_LEN})"
            ),
            SettingsError::NotANumber => f.write_str("Value is not a number"),
        }
    }
}

impl core::error::Error for SettingsError {}

/// Parse a PI code written in hex, with or without a `0x` prefix.
pub fn parse_pi_code(value: &str) -> Result<u16, SettingsError> {
    let value = value.trim();
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u16::from_str_radix(digits, 16).map_err(|_| SettingsError::NotANumber)
}

fn rejected(err: SettingsError) -> Result<(), SettingsError> {
    error!("{}", err);
    Err(err)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RadioSettings {
    pub frequency_mhz: f32,
    pub pi_code: u16,
    pub pty_code: u8,
    pub station_name: String<STATION_NAME_LEN>,
    pub rf_power: RfPower,
    pub pre_emphasis_75us: bool,
    pub mono: bool,
    pub mute: bool,
    pub carrier: bool,
    pub auto_off: bool,
}

impl Default for RadioSettings {
    fn default() -> Self {
        let mut station_name = String::new();
        let _ = station_name.push_str("PixelFM");
        Self {
            frequency_mhz: 88.1,
            pi_code: 0x6400,
            pty_code: 0,
            station_name,
            rf_power: RfPower::High,
            pre_emphasis_75us: true,
            mono: false,
            mute: false,
            carrier: false,
            auto_off: false,
        }
    }
}

impl RadioSettings {
    pub fn set_frequency(&mut self, mhz: f32) -> Result<(), SettingsError> {
        if !(BAND_MIN_MHZ..=BAND_MAX_MHZ).contains(&mhz) {
            return rejected(SettingsError::FrequencyOutOfRange(mhz));
        }
        self.frequency_mhz = mhz;
        info!("Frequency set to {} MHz", mhz);
        Ok(())
    }

    pub fn set_pi_code(&mut self, pi_code: u16) -> Result<(), SettingsError> {
        if pi_code < PI_CODE_MIN {
            return rejected(SettingsError::PiCodeOutOfRange(pi_code));
        }
        self.pi_code = pi_code;
        info!("RDS PI code set to 0x{:04X}", pi_code);
        Ok(())
    }

    pub fn set_pty_code(&mut self, pty_code: u8) -> Result<(), SettingsError> {
        if pty_code > PTY_CODE_MAX {
            return rejected(SettingsError::PtyCodeOutOfRange(pty_code));
        }
        self.pty_code = pty_code;
        info!("RDS PTY code set to {}", pty_code);
        Ok(())
    }

    pub fn set_station_name(&mut self, name: &str) -> Result<(), SettingsError> {
        let len = name.len();
        if len < STATION_NAME_MIN {
            return rejected(SettingsError::StationNameTooShort(len));
        }
        let mut value = String::new();
        if value.push_str(name).is_err() {
            return rejected(SettingsError::StationNameTooLong(len));
        }
        self.station_name = value;
        info!("Program service name set to '{}'", name);
        Ok(())
    }

    /// Re-check values that arrived without going through the setters,
    /// e.g. from storage.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let mut probe = RadioSettings::default();
        probe.set_frequency(self.frequency_mhz)?;
        probe.set_pi_code(self.pi_code)?;
        probe.set_pty_code(self.pty_code)?;
        probe.set_station_name(&self.station_name)
    }

    /// Push every setting to the transmitter, carrier last.
    pub async fn apply<B: RegisterBus, D: DelayNs>(
        &self,
        radio: &mut Qn8027<B, D>,
    ) -> Result<(), Error> {
        radio.set_pi_code(self.pi_code);
        radio.set_pty_code(self.pty_code)?;
        radio.set_carrier(false).await?;
        radio.set_frequency(self.frequency_mhz).await?;
        radio.set_pre_emphasis(self.pre_emphasis_75us).await?;
        radio
            .set_auto_off(if self.auto_off {
                AutoOff::After60s
            } else {
                AutoOff::Never
            })
            .await?;
        radio.set_rf_power(self.rf_power).await?;
        radio.set_mono(self.mono).await?;
        radio.set_mute(self.mute).await?;
        radio.set_carrier(self.carrier).await
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use std::string::ToString;

    use embassy_futures::block_on;

    use super::*;
    use crate::mock::{MockDelay, SimBus};
    use crate::registers::Qn8027Reg;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(RadioSettings::default().validate(), Ok(()));
    }

    #[test]
    fn rejected_values_are_not_applied() {
        let mut settings = RadioSettings::default();
        assert_eq!(
            settings.set_frequency(120.0),
            Err(SettingsError::FrequencyOutOfRange(120.0))
        );
        assert_eq!(settings.frequency_mhz, 88.1);
        assert_eq!(
            settings.set_pi_code(0x00FE),
            Err(SettingsError::PiCodeOutOfRange(0x00FE))
        );
        assert_eq!(settings.pi_code, 0x6400);
        assert_eq!(settings.set_pty_code(32), Err(SettingsError::PtyCodeOutOfRange(32)));
        assert_eq!(settings.pty_code, 0);

        settings.set_frequency(107.9).unwrap();
        settings.set_pi_code(0xBEEF).unwrap();
        settings.set_pty_code(31).unwrap();
        assert_eq!(settings.frequency_mhz, 107.9);
        assert_eq!(settings.pi_code, 0xBEEF);
        assert_eq!(settings.pty_code, 31);
    }

    #[test]
    fn station_name_must_be_four_to_eight_chars() {
        let mut settings = RadioSettings::default();
        assert_eq!(
            settings.set_station_name("KZ"),
            Err(SettingsError::StationNameTooShort(2))
        );
        assert_eq!(
            settings.set_station_name("KZAP ROCKS"),
            Err(SettingsError::StationNameTooLong(10))
        );
        assert_eq!(settings.station_name.as_str(), "PixelFM");
        settings.set_station_name("KZAP FM").unwrap();
        assert_eq!(settings.station_name.as_str(), "KZAP FM");
    }

    #[test]
    fn pi_code_parses_hex() {
        assert_eq!(parse_pi_code("0x6400"), Ok(0x6400));
        assert_eq!(parse_pi_code(" BEEF "), Ok(0xBEEF));
        assert_eq!(parse_pi_code("0Xff"), Ok(0xFF));
        assert_eq!(parse_pi_code("radio"), Err(SettingsError::NotANumber));
        assert_eq!(parse_pi_code("0x10000"), Err(SettingsError::NotANumber));
    }

    #[test]
    fn errors_read_as_messages() {
        assert_eq!(
            SettingsError::PiCodeOutOfRange(0x12).to_string(),
            "PI code 0x0012 out of range (0x00FF - 0xFFFF)"
        );
        assert_eq!(
            SettingsError::FrequencyOutOfRange(120.0).to_string(),
            "Frequency 120.0 MHz out of range (87.5 - 108.0)"
        );
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let settings: RadioSettings =
            serde_json::from_str(r#"{"piCode": 48879, "stationName": "KZAP"}"#).unwrap();
        assert_eq!(settings.pi_code, 0xBEEF);
        assert_eq!(settings.station_name.as_str(), "KZAP");
        assert_eq!(settings.frequency_mhz, 88.1);
        assert_eq!(settings.rf_power, RfPower::High);
    }

    #[test]
    fn apply_turns_the_carrier_on_last() {
        let mut settings = RadioSettings::default();
        settings.carrier = true;
        settings.mute = true;
        let mut radio = Qn8027::new(SimBus::new(), MockDelay::default());
        block_on(settings.apply(&mut radio)).unwrap();
        assert_eq!(radio.pi_code(), 0x6400);
        let (bus, _) = radio.release();
        let system = bus.writes_to(Qn8027Reg::SYSTEM);
        assert_eq!(system.last(), Some(&0x28));
        assert!(system[..system.len() - 1].iter().all(|v| v & 0x20 == 0));
    }
}
