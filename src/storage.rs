//! Flash-backed configuration.
//!
//! The whole configuration lives in the last flash page as
//! `[magic u32][length u32][postcard body]`, padded to the flash write size.

use core::fmt;

use embedded_storage::nor_flash::{NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash};
use log::info;
use qn8027::settings::RadioSettings;
use rds_scheduler::MessageSetConfig;
use serde::{Deserialize, Serialize};

/// Last 4 KiB page of the 1 MiB application flash.
const CONFIG_OFFSET: u32 = 0x000F_F000;
const CONFIG_MAGIC: u32 = 0x5052_4431;
const HEADER_LEN: usize = 8;
const BUFFER_LEN: usize = 4096;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoredConfig {
    pub radio: RadioSettings,
    pub messages: MessageSetConfig,
}

#[derive(Debug)]
pub enum StorageError {
    Flash(NorFlashErrorKind),
    Postcard(postcard::Error),
    /// No configuration has been saved yet.
    Empty,
    /// Header length does not fit the page.
    Corrupt(u32),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Flash(kind) => write!(f, "flash error: {kind:?}"),
            StorageError::Postcard(e) => write!(f, "config encoding: {e}"),
            StorageError::Empty => f.write_str("no saved configuration"),
            StorageError::Corrupt(len) => write!(f, "stored configuration is corrupt (length {len})"),
        }
    }
}

fn flash_error<E: NorFlashError>(e: E) -> StorageError {
    StorageError::Flash(e.kind())
}

pub struct ConfigStore<F: NorFlash> {
    flash: F,
    buffer: [u8; BUFFER_LEN],
}

impl<F: NorFlash> ConfigStore<F> {
    pub fn new(flash: F) -> Self {
        Self {
            flash,
            buffer: [0; BUFFER_LEN],
        }
    }

    pub fn load(&mut self) -> Result<StoredConfig, StorageError> {
        let mut header = [0u8; HEADER_LEN];
        self.flash.read(CONFIG_OFFSET, &mut header).map_err(flash_error)?;
        let [m0, m1, m2, m3, l0, l1, l2, l3] = header;
        if u32::from_le_bytes([m0, m1, m2, m3]) != CONFIG_MAGIC {
            return Err(StorageError::Empty);
        }
        let len = u32::from_le_bytes([l0, l1, l2, l3]);
        if len as usize > BUFFER_LEN - HEADER_LEN {
            return Err(StorageError::Corrupt(len));
        }
        let body = &mut self.buffer[..len as usize];
        self.flash
            .read(CONFIG_OFFSET + HEADER_LEN as u32, body)
            .map_err(flash_error)?;
        let config = postcard::from_bytes(body).map_err(StorageError::Postcard)?;
        info!("Configuration loaded ({} bytes)", len);
        Ok(config)
    }

    /// Returns the number of bytes written.
    pub fn save(&mut self, config: &StoredConfig) -> Result<usize, StorageError> {
        let (header, body) = self.buffer.split_at_mut(HEADER_LEN);
        let len = postcard::to_slice(config, body)
            .map_err(StorageError::Postcard)?
            .len();
        header[..4].copy_from_slice(&CONFIG_MAGIC.to_le_bytes());
        header[4..].copy_from_slice(&(len as u32).to_le_bytes());

        let total = (HEADER_LEN + len).next_multiple_of(F::WRITE_SIZE);
        self.buffer[HEADER_LEN + len..total].fill(0xFF);
        self.flash
            .erase(CONFIG_OFFSET, CONFIG_OFFSET + F::ERASE_SIZE as u32)
            .map_err(flash_error)?;
        self.flash
            .write(CONFIG_OFFSET, &self.buffer[..total])
            .map_err(flash_error)?;
        info!("Configuration saved ({} bytes)", len);
        Ok(total)
    }
}
