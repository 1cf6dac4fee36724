//! Persisted form of a message set.
//!
//! Every key is optional when reading back: a missing key keeps its
//! default. Entries without a usable name, or repeating a name already
//! restored, are skipped.

use heapless::Vec;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::entry::{DURATION_DEFAULT_SECS, MessageText};
use crate::set::Messages;
use crate::MAX_MESSAGES;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MessageConfig {
    /// Lookup key; `message` doubles as the key when absent.
    pub name: Option<MessageText>,
    pub message: MessageText,
    pub duration_sec: u16,
    pub enabled: bool,
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            name: None,
            message: MessageText::new(),
            duration_sec: DURATION_DEFAULT_SECS,
            enabled: true,
        }
    }
}

impl MessageConfig {
    fn key(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.message,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageSetConfig {
    pub name: MessageText,
    pub list: Vec<MessageConfig, MAX_MESSAGES>,
}

impl Messages {
    pub fn to_config(&self) -> MessageSetConfig {
        let mut config = MessageSetConfig {
            name: self.name().try_into().unwrap_or_default(),
            list: Vec::new(),
        };
        for entry in self.iter() {
            // Both containers hold MAX_MESSAGES.
            let _ = config.list.push(MessageConfig {
                name: Some(entry.name.clone()),
                message: entry.text.clone(),
                duration_sec: entry.duration_secs(),
                enabled: entry.is_enabled(),
            });
        }
        config
    }

    /// Replace the set with the stored one.
    /// Returns the number of messages restored.
    pub fn restore(&mut self, config: &MessageSetConfig) -> usize {
        self.clear();
        let _ = self.set_name(&config.name);
        for stored in &config.list {
            let key = stored.key();
            if key.is_empty() {
                warn!("Skipping stored message without a name");
                continue;
            }
            if self.contains(key) {
                warn!("Skipping duplicate stored message '{}'", key);
                continue;
            }
            if let Err(e) = self.add(key, &stored.message) {
                warn!("Skipping stored message '{}': {}", key, e);
                continue;
            }
            if let Err(e) = self.set_duration(key, stored.duration_sec) {
                warn!("Message '{}': {}, keeping default", key, e);
            }
            let _ = self.set_enabled(key, stored.enabled);
        }
        let first = self.iter().next().map(|entry| entry.name.clone());
        if let Some(first) = first {
            let _ = self.activate(&first);
        }
        self.mark_saved();
        info!("Restored {} messages into '{}'", self.len(), self.name());
        self.len()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::entry::MessageEntry;

    fn sample() -> Messages {
        let mut messages = Messages::new();
        messages.set_name("Local").unwrap();
        messages.add("welcome", "Welcome to the show").unwrap();
        messages.add("schedule", "Shows start at dusk").unwrap();
        messages.set_duration("schedule", 45).unwrap();
        messages.set_enabled("welcome", false).unwrap();
        messages
    }

    #[test]
    fn save_then_restore_reproduces_the_set() {
        let original = sample();
        let mut restored = Messages::new();
        assert_eq!(restored.restore(&original.to_config()), 2);
        assert_eq!(restored.name(), "Local");
        assert!(restored.iter().eq(original.iter()));
        assert!(!restored.is_unsaved());
        // First in rotation order becomes active.
        assert_eq!(restored.active().map(MessageEntry::name), Some("schedule"));
    }

    #[test]
    fn json_layout_uses_camel_case_keys() {
        let json = serde_json::to_value(sample().to_config()).unwrap();
        assert_eq!(json["name"], "Local");
        assert_eq!(json["list"][0]["name"], "schedule");
        assert_eq!(json["list"][0]["message"], "Shows start at dusk");
        assert_eq!(json["list"][0]["durationSec"], 45);
        assert_eq!(json["list"][1]["enabled"], false);
    }

    #[test]
    fn restore_skips_unnamed_and_duplicate_entries() {
        let config: MessageSetConfig = serde_json::from_str(
            r#"{
                "name": "Local",
                "list": [
                    { "message": "Hello", "durationSec": 20 },
                    { "durationSec": 30 },
                    { "message": "Hello", "enabled": false },
                    { "name": "", "message": "" },
                    { "message": "Bye", "durationSec": 2 }
                ]
            }"#,
        )
        .unwrap();
        let mut messages = Messages::new();
        assert_eq!(messages.restore(&config), 2);

        let hello = messages.get("Hello").unwrap();
        assert_eq!(hello.duration_secs(), 20);
        assert!(hello.is_enabled());
        // Out of range durations fall back to the default.
        assert_eq!(messages.get("Bye").map(MessageEntry::duration_secs), Some(5));
    }

    #[test]
    fn restore_replaces_previous_messages() {
        let mut messages = sample();
        let config: MessageSetConfig = serde_json::from_str(r#"{"list": []}"#).unwrap();
        assert_eq!(messages.restore(&config), 0);
        assert!(messages.is_empty());
        assert!(messages.select_next().is_none());
    }
}
