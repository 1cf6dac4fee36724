use heapless::String;
use qn8027::rds::RADIO_TEXT_LEN;

use crate::Error;

pub const DURATION_MIN_SECS: u16 = 5;
pub const DURATION_MAX_SECS: u16 = 900;
pub const DURATION_DEFAULT_SECS: u16 = DURATION_MIN_SECS;

/// Text buffer sized to one full radio text.
pub type MessageText = String<RADIO_TEXT_LEN>;

pub(crate) fn message_text(value: &str) -> Result<MessageText, Error> {
    let mut text = MessageText::new();
    text.push_str(value).map_err(|_| Error::TooLong)?;
    Ok(text)
}

/// One radio text the operator can put on air.
///
/// `name` is the stable key the message is looked up by, `text` is what
/// receivers display.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEntry {
    pub(crate) name: MessageText,
    pub(crate) text: MessageText,
    duration_secs: u16,
    enabled: bool,
}

impl MessageEntry {
    pub fn new(name: &str, text: &str) -> Result<Self, Error> {
        if name.is_empty() {
            return Err(Error::EmptyName);
        }
        Ok(Self {
            name: message_text(name)?,
            text: message_text(text)?,
            duration_secs: DURATION_DEFAULT_SECS,
            enabled: true,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn duration_secs(&self) -> u16 {
        self.duration_secs
    }

    pub fn duration_ms(&self) -> u32 {
        u32::from(self.duration_secs) * 1000
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Returns `Error::InvalidDuration` outside 5..=900 s
    pub fn set_duration(&mut self, secs: u16) -> Result<(), Error> {
        if !(DURATION_MIN_SECS..=DURATION_MAX_SECS).contains(&secs) {
            return Err(Error::InvalidDuration(secs));
        }
        self.duration_secs = secs;
        Ok(())
    }

    pub fn set_text(&mut self, text: &str) -> Result<(), Error> {
        self.text = message_text(text)?;
        Ok(())
    }
}

/// What the scheduler needs to put a message on air.
#[derive(Debug, Clone, PartialEq)]
pub struct RdsMsgInfo {
    pub text: MessageText,
    /// Name of the message set the text came from.
    pub controller_name: MessageText,
    pub duration_ms: u32,
}
