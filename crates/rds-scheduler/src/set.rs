//! Named message collection and the rotation over it.
//!
//! Entries are kept sorted by name and rotation walks them in that order,
//! so a full cycle visits every enabled message once regardless of the order
//! they were added in.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::{Mutex, MutexGuard};
use embassy_time::{Duration, with_timeout};
use heapless::Vec;
use log::{debug, info, warn};

use crate::entry::{MessageEntry, MessageText, RdsMsgInfo, message_text};
use crate::{Error, MAX_MESSAGES};

/// Longest a caller waits for the set before giving up.
pub const LOCK_TIMEOUT: Duration = Duration::from_millis(100);

/// The messages of one set. Reached through [`MessageSet::lock`].
///
/// `cursor`, when set, always indexes an existing entry. Any change to the
/// set of names clears it and the next selection starts from the first
/// entry again.
///
/// Every edit bumps `revision`; the set is unsaved while it differs from
/// `saved_revision`.
#[derive(Debug)]
pub struct Messages {
    name: MessageText,
    entries: Vec<MessageEntry, MAX_MESSAGES>,
    cursor: Option<usize>,
    active: Option<MessageText>,
    revision: u32,
    saved_revision: u32,
}

impl Default for Messages {
    fn default() -> Self {
        Self::new()
    }
}

impl Messages {
    pub const fn new() -> Self {
        Self {
            name: MessageText::new(),
            entries: Vec::new(),
            cursor: None,
            active: None,
            revision: 0,
            saved_revision: 0,
        }
    }

    /// Name of the set, reported as the controller of its messages.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) -> Result<(), Error> {
        self.name = message_text(name)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in rotation order.
    pub fn iter(&self) -> impl Iterator<Item = &MessageEntry> {
        self.entries.iter()
    }

    pub fn get(&self, name: &str) -> Option<&MessageEntry> {
        self.position(name).ok().map(|index| &self.entries[index])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_ok()
    }

    /// The message selected for editing, if any.
    pub fn active(&self) -> Option<&MessageEntry> {
        self.active.as_deref().and_then(|name| self.get(name))
    }

    /// Add a message with the default duration and make it active.
    pub fn add(&mut self, name: &str, text: &str) -> Result<(), Error> {
        let entry = MessageEntry::new(name, text)?;
        let index = match self.position(name) {
            Ok(_) => return Err(Error::Duplicate),
            Err(index) => index,
        };
        self.entries.insert(index, entry).map_err(|_| Error::Full)?;
        self.cursor = None;
        self.active = Some(message_text(name)?);
        self.touch();
        info!("Message '{}' added", name);
        Ok(())
    }

    /// Remove a message. When it was active the first remaining message
    /// becomes active.
    pub fn remove(&mut self, name: &str) -> Result<MessageEntry, Error> {
        let index = self.position(name).map_err(|_| Error::NotFound)?;
        let entry = self.entries.remove(index);
        self.cursor = None;
        if self.active.as_deref() == Some(name) {
            self.active = self.entries.first().map(|first| first.name.clone());
        }
        self.touch();
        info!("Message '{}' removed", name);
        Ok(entry)
    }

    /// Move a message to a new name, keeping text, duration and enable flag.
    pub fn rename(&mut self, old_name: &str, new_name: &str) -> Result<(), Error> {
        if new_name.is_empty() {
            return Err(Error::EmptyName);
        }
        let index = self.position(old_name).map_err(|_| Error::NotFound)?;
        if old_name == new_name {
            return Ok(());
        }
        if self.contains(new_name) {
            return Err(Error::Duplicate);
        }
        let key = message_text(new_name)?;
        let mut entry = self.entries.remove(index);
        entry.name = key.clone();
        let index = self.position(new_name).unwrap_or_else(|index| index);
        // One slot was just freed.
        let _ = self.entries.insert(index, entry);
        self.cursor = None;
        if self.active.as_deref() == Some(old_name) {
            self.active = Some(key);
        }
        self.touch();
        info!("Message '{}' renamed to '{}'", old_name, new_name);
        Ok(())
    }

    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<(), Error> {
        self.entry_mut(name)?.set_enabled(enabled);
        self.touch();
        info!(
            "Message '{}' {}",
            name,
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(())
    }

    pub fn set_duration(&mut self, name: &str, secs: u16) -> Result<(), Error> {
        self.entry_mut(name)?.set_duration(secs)?;
        self.touch();
        info!("Message '{}' duration {} s", name, secs);
        Ok(())
    }

    pub fn set_text(&mut self, name: &str, text: &str) -> Result<(), Error> {
        self.entry_mut(name)?.set_text(text)?;
        self.touch();
        Ok(())
    }

    /// Select a message for editing, creating it when it does not exist yet.
    pub fn activate(&mut self, name: &str) -> Result<(), Error> {
        if !self.contains(name) {
            self.add(name, name)?;
        }
        self.active = Some(message_text(name)?);
        Ok(())
    }

    /// Advance the rotation to the next enabled message.
    ///
    /// Starts after the previous pick, or at the first entry when there is
    /// none, and wraps around at most once. Returns `None` when no message
    /// is enabled.
    pub fn select_next(&mut self) -> Option<&MessageEntry> {
        let len = self.entries.len();
        for _ in 0..len {
            let next = match self.cursor {
                None => 0,
                Some(index) => (index + 1) % len,
            };
            self.cursor = Some(next);
            if self.entries[next].is_enabled() {
                debug!("Rotation picked '{}'", self.entries[next].name());
                return Some(&self.entries[next]);
            }
        }
        None
    }

    pub fn next_rds_message(&mut self) -> Option<RdsMsgInfo> {
        let controller_name = self.name.clone();
        self.select_next().map(|entry| RdsMsgInfo {
            text: entry.text.clone(),
            controller_name,
            duration_ms: entry.duration_ms(),
        })
    }

    /// Whether anything changed since the last save.
    pub fn is_unsaved(&self) -> bool {
        self.revision != self.saved_revision
    }

    /// Edit counter, taken together with [`Messages::to_config`] by a
    /// caller that writes the set out unlocked.
    pub fn revision(&self) -> u32 {
        self.revision
    }

    pub fn mark_saved(&mut self) {
        self.saved_revision = self.revision;
    }

    /// Mark the set saved as of `revision`. Edits made after that snapshot
    /// keep it unsaved. Returns whether the set is now saved.
    pub fn mark_saved_at(&mut self, revision: u32) -> bool {
        self.saved_revision = revision;
        !self.is_unsaved()
    }

    /// Drop every message.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
        self.active = None;
        self.touch();
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    fn position(&self, name: &str) -> Result<usize, usize> {
        self.entries
            .binary_search_by(|entry| entry.name().cmp(name))
    }

    fn entry_mut(&mut self, name: &str) -> Result<&mut MessageEntry, Error> {
        let index = self.position(name).map_err(|_| Error::NotFound)?;
        Ok(&mut self.entries[index])
    }
}

/// [`Messages`] shared between the tasks that edit them and the scheduler.
pub struct MessageSet<M: RawMutex> {
    messages: Mutex<M, Messages>,
}

impl<M: RawMutex> Default for MessageSet<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex> MessageSet<M> {
    pub const fn new() -> Self {
        Self {
            messages: Mutex::new(Messages::new()),
        }
    }

    /// Lock the set, waiting at most [`LOCK_TIMEOUT`].
    /// Returns `Error::LockTimeout` if another holder keeps it longer.
    pub async fn lock(&self) -> Result<MutexGuard<'_, M, Messages>, Error> {
        with_timeout(LOCK_TIMEOUT, self.messages.lock())
            .await
            .map_err(|_| {
                warn!("Message set still locked after {} ms", LOCK_TIMEOUT.as_millis());
                Error::LockTimeout
            })
    }

    pub fn try_lock(&self) -> Option<MutexGuard<'_, M, Messages>> {
        self.messages.try_lock().ok()
    }

    pub async fn next_rds_message(&self) -> Result<Option<RdsMsgInfo>, Error> {
        Ok(self.lock().await?.next_rds_message())
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::vec::Vec as StdVec;

    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    use super::*;
    use crate::entry::DURATION_DEFAULT_SECS;

    fn picks(messages: &mut Messages, count: usize) -> StdVec<std::string::String> {
        (0..count)
            .filter_map(|_| messages.select_next().map(|entry| entry.name().into()))
            .collect()
    }

    #[test]
    fn single_enabled_entry_is_picked_forever() {
        let mut messages = Messages::new();
        messages.add("A", "first").unwrap();
        messages.add("B", "second").unwrap();
        messages.set_duration("B", 10).unwrap();
        messages.set_enabled("B", false).unwrap();
        assert_eq!(picks(&mut messages, 5), ["A"; 5]);

        messages.set_enabled("B", true).unwrap();
        assert_eq!(picks(&mut messages, 4), ["B", "A", "B", "A"]);
    }

    #[test]
    fn nothing_enabled_selects_nothing() {
        let mut messages = Messages::new();
        assert!(messages.select_next().is_none());
        messages.add("A", "a").unwrap();
        messages.add("B", "b").unwrap();
        messages.set_enabled("A", false).unwrap();
        messages.set_enabled("B", false).unwrap();
        for _ in 0..3 {
            assert!(messages.select_next().is_none());
        }
    }

    #[test]
    fn rotation_follows_name_order() {
        let mut messages = Messages::new();
        messages.add("charlie", "c").unwrap();
        messages.add("alpha", "a").unwrap();
        messages.add("bravo", "b").unwrap();
        assert_eq!(picks(&mut messages, 4), ["alpha", "bravo", "charlie", "alpha"]);
    }

    #[test]
    fn structural_change_restarts_rotation() {
        let mut messages = Messages::new();
        messages.add("a", "a").unwrap();
        messages.add("b", "b").unwrap();
        messages.add("c", "c").unwrap();
        assert_eq!(picks(&mut messages, 2), ["a", "b"]);
        messages.remove("c").unwrap();
        assert_eq!(picks(&mut messages, 1), ["a"]);
    }

    #[test]
    fn add_mid_rotation_restarts_it() {
        let mut messages = Messages::new();
        messages.add("b", "b").unwrap();
        messages.add("c", "c").unwrap();
        assert_eq!(picks(&mut messages, 2), ["b", "c"]);
        messages.add("d", "d").unwrap();
        assert_eq!(picks(&mut messages, 3), ["b", "c", "d"]);
    }

    #[test]
    fn rename_mid_rotation_restarts_it() {
        let mut messages = Messages::new();
        messages.add("a", "a").unwrap();
        messages.add("b", "b").unwrap();
        messages.add("c", "c").unwrap();
        assert_eq!(picks(&mut messages, 2), ["a", "b"]);
        messages.rename("c", "z").unwrap();
        assert_eq!(picks(&mut messages, 4), ["a", "b", "z", "a"]);
    }

    #[test]
    fn edit_after_snapshot_stays_unsaved() {
        let mut messages = Messages::new();
        messages.add("a", "a").unwrap();
        let revision = messages.revision();
        let config = messages.to_config();
        messages.set_duration("a", 20).unwrap();

        assert!(!messages.mark_saved_at(revision));
        assert!(messages.is_unsaved());
        assert_eq!(config.list[0].duration_sec, DURATION_DEFAULT_SECS);

        let revision = messages.revision();
        assert!(messages.mark_saved_at(revision));
        assert!(!messages.is_unsaved());
    }

    #[test]
    fn add_rejects_empty_and_duplicate_names() {
        let mut messages = Messages::new();
        assert_eq!(messages.add("", "text"), Err(Error::EmptyName));
        messages.add("a", "text").unwrap();
        messages.mark_saved();
        assert_eq!(messages.add("a", "other"), Err(Error::Duplicate));
        assert_eq!(messages.get("a").map(MessageEntry::text), Some("text"));
        assert!(!messages.is_unsaved());
    }

    #[test]
    fn set_is_bounded() {
        let mut messages = Messages::new();
        let mut name = MessageText::new();
        for i in 0..MAX_MESSAGES {
            name.clear();
            core::fmt::write(&mut name, format_args!("msg{i:02}")).unwrap();
            messages.add(&name, "x").unwrap();
        }
        assert_eq!(messages.add("overflow", "x"), Err(Error::Full));
        assert_eq!(messages.len(), MAX_MESSAGES);
    }

    #[test]
    fn removing_the_active_entry_promotes_the_first() {
        let mut messages = Messages::new();
        messages.add("b", "b").unwrap();
        messages.add("c", "c").unwrap();
        messages.add("a", "a").unwrap();
        messages.activate("c").unwrap();
        messages.remove("c").unwrap();
        assert_eq!(messages.active().map(MessageEntry::name), Some("a"));
        messages.remove("a").unwrap();
        messages.remove("b").unwrap();
        assert!(messages.active().is_none());
        assert_eq!(messages.remove("b"), Err(Error::NotFound));
    }

    #[test]
    fn rename_keeps_fields_and_activation() {
        let mut messages = Messages::new();
        messages.add("old", "Hello").unwrap();
        messages.set_duration("old", 30).unwrap();
        messages.set_enabled("old", false).unwrap();
        messages.rename("old", "new").unwrap();

        assert!(!messages.contains("old"));
        let entry = messages.get("new").unwrap();
        assert_eq!(entry.text(), "Hello");
        assert_eq!(entry.duration_secs(), 30);
        assert!(!entry.is_enabled());
        assert_eq!(messages.active().map(MessageEntry::name), Some("new"));
    }

    #[test]
    fn rename_rejects_bad_targets() {
        let mut messages = Messages::new();
        messages.add("a", "a").unwrap();
        messages.add("b", "b").unwrap();
        assert_eq!(messages.rename("a", ""), Err(Error::EmptyName));
        assert_eq!(messages.rename("missing", "c"), Err(Error::NotFound));
        assert_eq!(messages.rename("a", "b"), Err(Error::Duplicate));
        assert_eq!(messages.rename("a", "a"), Ok(()));
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn activate_adds_missing_entries() {
        let mut messages = Messages::new();
        messages.activate("Now playing").unwrap();
        let entry = messages.active().unwrap();
        assert_eq!(entry.name(), "Now playing");
        assert_eq!(entry.text(), "Now playing");
    }

    #[test]
    fn rds_message_reports_set_name() {
        let mut messages = Messages::new();
        messages.set_name("Local").unwrap();
        messages.add("a", "Hello").unwrap();
        messages.set_duration("a", 12).unwrap();
        let info = messages.next_rds_message().unwrap();
        assert_eq!(info.text.as_str(), "Hello");
        assert_eq!(info.controller_name.as_str(), "Local");
        assert_eq!(info.duration_ms, 12_000);
    }

    #[test]
    fn lock_gives_up_while_held() {
        let set = MessageSet::<NoopRawMutex>::new();
        let guard = set.try_lock().unwrap();
        assert_eq!(block_on(set.lock()).err(), Some(Error::LockTimeout));
        drop(guard);
        block_on(set.lock()).unwrap().add("a", "a").unwrap();
        assert!(block_on(set.next_rds_message()).unwrap().is_some());
    }
}
