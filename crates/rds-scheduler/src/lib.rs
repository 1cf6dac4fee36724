//! Radio text rotation for the QN8027 transmitter.
//!
//! A [`MessageSet`] holds the named messages an operator can put on air and
//! hands them out one at a time, skipping disabled ones. The
//! [`RdsScheduler`] polls the set once a second, keeps the selected message
//! on air for its duration and only talks to the transmitter when the text
//! actually changes.

#![no_std]
#![allow(async_fn_in_trait)]

use core::fmt;

pub mod config;
pub mod entry;
pub mod scheduler;
pub mod set;

pub use config::{MessageConfig, MessageSetConfig};
pub use entry::{MessageEntry, MessageText, RdsMsgInfo};
pub use scheduler::{Countdown, RdsScheduler, RdsState, RdsStatus, RdsTextSink, Tick};
pub use set::{MessageSet, Messages};

/// Most messages one set holds.
pub const MAX_MESSAGES: usize = 16;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// Message name is empty
    EmptyName,
    /// A message with this name already exists
    Duplicate,
    /// No message with this name
    NotFound,
    /// The set holds `MAX_MESSAGES` already
    Full,
    /// Name or text does not fit the message buffer
    TooLong,
    /// Display duration outside 5..=900 seconds
    InvalidDuration(u16),
    /// The set stayed locked for the whole acquisition window
    LockTimeout,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyName => f.write_str("Message name is empty"),
            Error::Duplicate => f.write_str("Message already exists"),
            Error::NotFound => f.write_str("No such message"),
            Error::Full => write!(f, "Message list is full ({MAX_MESSAGES} messages)"),
            Error::TooLong => write!(
                f,
                "Message is longer than {} characters",
                qn8027::rds::RADIO_TEXT_LEN
            ),
            Error::InvalidDuration(secs) => write!(
                f,
                "Duration {secs} s out of range ({} - {} s)",
                entry::DURATION_MIN_SECS,
                entry::DURATION_MAX_SECS
            ),
            Error::LockTimeout => f.write_str("Message list is busy"),
        }
    }
}

impl core::error::Error for Error {}
