//! The configuration-file event written at prestart.
//!
//! ```text
//! bank  tag 137, type bank
//!   bank  tag roc_id, type u32, num file index
//!     word 0   file length in bytes
//!     word 1.. file bytes, little-endian, zero padded
//! ```

use crate::buffer::{bank_header, EventBuffer, BANK_HEADER_WORDS, DATA_TYPE_BANK, DATA_TYPE_U32};
use crate::error::{Result, RocError};
use std::path::Path;
use tracing::{debug, info};

/// Event type of the configuration-file event.
pub const CONFIG_FILE_EVENT: u16 = 137;

/// Words kept free for the event headers.
pub const EVENT_HEADROOM_WORDS: usize = 128;

/// Most file bytes that fit in an event of `capacity_words`.
pub fn max_file_bytes(capacity_words: usize) -> usize {
    capacity_words
        .saturating_sub(EVENT_HEADROOM_WORDS + 2 * BANK_HEADER_WORDS + 1)
        .saturating_mul(4)
}

/// Wrap `contents` into a configuration-file event.
///
/// `path` only labels the error when the contents are too large.
pub fn encode(
    path: &Path,
    contents: &[u8],
    roc_id: u16,
    index: u8,
    capacity_words: usize,
) -> Result<EventBuffer> {
    let max = max_file_bytes(capacity_words);
    if contents.len() > max {
        return Err(RocError::ConfigFileTooLarge {
            path: path.to_path_buf(),
            bytes: contents.len(),
            max,
        });
    }

    let payload = pack_bytes(contents);
    let inner_len = payload.len() + 2;
    let mut words = Vec::with_capacity(inner_len + 2 * BANK_HEADER_WORDS);
    words.push((inner_len + BANK_HEADER_WORDS) as u32);
    words.push(bank_header(CONFIG_FILE_EVENT, DATA_TYPE_BANK, 0));
    words.push(inner_len as u32);
    words.push(bank_header(roc_id, DATA_TYPE_U32, index));
    words.push(contents.len() as u32);
    words.extend(payload);

    let mut event = EventBuffer::new(capacity_words);
    event
        .extend_from_slice(&words)
        .map_err(|_| RocError::ConfigFileTooLarge {
            path: path.to_path_buf(),
            bytes: contents.len(),
            max,
        })?;
    Ok(event)
}

/// Read `path` and wrap it into a configuration-file event.
pub fn from_file(path: &Path, roc_id: u16, capacity_words: usize) -> Result<EventBuffer> {
    let contents = std::fs::read(path).map_err(|e| RocError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let event = encode(path, &contents, roc_id, 0, capacity_words)?;
    info!(
        path = %path.display(),
        bytes = contents.len(),
        words = event.len(),
        "Configuration file event built"
    );
    Ok(event)
}

/// File bytes carried by a configuration-file event, if `words` is one.
pub fn decode(words: &[u32]) -> Option<Vec<u8>> {
    let outer = crate::buffer::parse_banks(words).into_iter().next()?;
    if outer.tag != CONFIG_FILE_EVENT || outer.data_type != DATA_TYPE_BANK {
        return None;
    }
    let inner = outer.children().into_iter().next()?;
    let (len, packed) = inner.data.split_first()?;
    let len = *len as usize;
    if len > packed.len() * 4 {
        debug!(len, words = packed.len(), "Truncated configuration file bank");
        return None;
    }
    let mut bytes: Vec<u8> = packed.iter().flat_map(|w| w.to_le_bytes()).collect();
    bytes.truncate(len);
    Some(bytes)
}

fn pack_bytes(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks(4)
        .map(|chunk| {
            let mut word = [0u8; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            u32::from_le_bytes(word)
        })
        .collect()
}
