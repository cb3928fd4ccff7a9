//! Fixed-capacity event buffer of 32-bit words, partitioned into banks.
//!
//! # Bank layout
//!
//! ```text
//! word 0   exclusive length (words that follow)
//! word 1   tag << 16 | data_type << 8 | num
//! word 2.. payload
//! ```
//!
//! Module readout writes straight into the buffer through
//! [`EventBuffer::append_with`], the way a DMA engine writes behind the
//! buffer pointer. A finished event is frozen into little-endian
//! [`Bytes`] for hand-off.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

/// 64 KiB of 32-bit words.
pub const DEFAULT_CAPACITY_WORDS: usize = 16 * 1024;

/// Unsigned 32-bit payload.
pub const DATA_TYPE_U32: u8 = 0x01;

/// Payload of nested banks.
pub const DATA_TYPE_BANK: u8 = 0x0e;

/// Words taken by a bank header.
pub const BANK_HEADER_WORDS: usize = 2;

/// Second header word of a bank.
pub fn bank_header(tag: u16, data_type: u8, num: u8) -> u32 {
    (u32::from(tag) << 16) | (u32::from(data_type) << 8) | u32::from(num)
}

/// Buffer misuse or overflow.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    /// Not enough room left.
    #[error("event buffer full: need {needed} words, {remaining} left")]
    Full {
        /// Words requested.
        needed: usize,
        /// Words still free.
        remaining: usize,
    },
    /// Banks do not nest.
    #[error("a bank is already open")]
    BankOpen,
}

/// One event under construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBuffer {
    words: Vec<u32>,
    capacity: usize,
    open: Option<usize>,
}

impl EventBuffer {
    /// Empty buffer holding at most `capacity` words.
    pub fn new(capacity: usize) -> Self {
        Self {
            words: Vec::with_capacity(capacity),
            capacity,
            open: None,
        }
    }

    /// Words written so far.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// True if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Maximum number of words.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Words still free.
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.words.len())
    }

    /// The words written so far.
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// True while a bank is open.
    pub fn has_open_bank(&self) -> bool {
        self.open.is_some()
    }

    /// Start a bank; its length word is filled in by [`close_bank`](Self::close_bank).
    pub fn open_bank(&mut self, tag: u16, data_type: u8, num: u8) -> Result<(), BufferError> {
        if self.open.is_some() {
            return Err(BufferError::BankOpen);
        }
        self.reserve(BANK_HEADER_WORDS)?;
        self.open = Some(self.words.len());
        self.words.push(0);
        self.words.push(bank_header(tag, data_type, num));
        Ok(())
    }

    /// Close the open bank and return its payload length. `None` if no bank
    /// was open.
    pub fn close_bank(&mut self) -> Option<usize> {
        let start = self.open.take()?;
        let exclusive = self.words.len() - start - 1;
        self.words[start] = exclusive as u32;
        Some(exclusive - 1)
    }

    /// Append words.
    pub fn extend_from_slice(&mut self, words: &[u32]) -> Result<(), BufferError> {
        self.reserve(words.len())?;
        self.words.extend_from_slice(words);
        Ok(())
    }

    /// Let `read` write up to `max` words at the end of the buffer.
    ///
    /// `read` gets a zeroed slice of `min(max, remaining)` words and returns
    /// how many it filled; only those are kept. On error nothing is kept.
    pub fn append_with<E>(
        &mut self,
        max: usize,
        read: impl FnOnce(&mut [u32]) -> Result<usize, E>,
    ) -> Result<usize, E> {
        let start = self.words.len();
        let room = max.min(self.remaining());
        self.words.resize(start + room, 0);
        let result = read(&mut self.words[start..]);
        let kept = match &result {
            Ok(n) => (*n).min(room),
            Err(_) => 0,
        };
        self.words.truncate(start + kept);
        result.map(|_| kept)
    }

    /// Top-level banks, in order. Stops at the first malformed bank.
    pub fn banks(&self) -> Vec<BankView<'_>> {
        parse_banks(&self.words)
    }

    /// Freeze into little-endian bytes.
    pub fn to_bytes(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(self.words.len() * 4);
        for word in &self.words {
            out.put_u32_le(*word);
        }
        out.freeze()
    }

    /// The words, consuming the buffer.
    pub fn into_words(self) -> Vec<u32> {
        self.words
    }

    fn reserve(&self, needed: usize) -> Result<(), BufferError> {
        let remaining = self.remaining();
        if needed > remaining {
            return Err(BufferError::Full { needed, remaining });
        }
        Ok(())
    }
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY_WORDS)
    }
}

/// A bank inside a word slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankView<'a> {
    /// Bank tag.
    pub tag: u16,
    /// Payload type.
    pub data_type: u8,
    /// Bank number (block level for readout banks).
    pub num: u8,
    /// Payload words.
    pub data: &'a [u32],
}

impl<'a> BankView<'a> {
    /// Banks nested in this bank's payload.
    pub fn children(&self) -> Vec<BankView<'a>> {
        parse_banks(self.data)
    }
}

/// Split `words` into consecutive banks.
pub fn parse_banks(words: &[u32]) -> Vec<BankView<'_>> {
    let mut banks = Vec::new();
    let mut rest = words;
    while rest.len() >= BANK_HEADER_WORDS {
        let exclusive = rest[0] as usize;
        if exclusive < 1 || exclusive >= rest.len() {
            break;
        }
        let header = rest[1];
        banks.push(BankView {
            tag: (header >> 16) as u16,
            data_type: ((header >> 8) & 0xFF) as u8,
            num: (header & 0xFF) as u8,
            data: &rest[BANK_HEADER_WORDS..=exclusive],
        });
        rest = &rest[exclusive + 1..];
    }
    banks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bank_length_is_exclusive() {
        let mut buf = EventBuffer::new(64);
        buf.open_bank(0x05, DATA_TYPE_U32, 1).unwrap();
        buf.extend_from_slice(&[10, 11, 12]).unwrap();
        assert_eq!(buf.close_bank(), Some(3));

        assert_eq!(buf.words(), &[4, 0x0005_0101, 10, 11, 12]);
        let banks = buf.banks();
        assert_eq!(banks.len(), 1);
        assert_eq!(banks[0].tag, 0x05);
        assert_eq!(banks[0].num, 1);
        assert_eq!(banks[0].data, &[10, 11, 12]);
    }

    #[test]
    fn test_empty_bank() {
        let mut buf = EventBuffer::new(8);
        buf.open_bank(0x11, DATA_TYPE_U32, 1).unwrap();
        assert_eq!(buf.close_bank(), Some(0));
        assert_eq!(buf.words(), &[1, 0x0011_0101]);
        assert!(buf.banks()[0].data.is_empty());
    }

    #[test]
    fn test_banks_do_not_nest() {
        let mut buf = EventBuffer::new(8);
        buf.open_bank(1, DATA_TYPE_U32, 0).unwrap();
        assert_eq!(buf.open_bank(2, DATA_TYPE_U32, 0), Err(BufferError::BankOpen));
        assert_eq!(buf.close_bank(), Some(0));
        assert_eq!(buf.close_bank(), None);
    }

    #[test]
    fn test_append_with_keeps_only_filled_words() {
        let mut buf = EventBuffer::new(10);
        let n = buf
            .append_with(8, |dest| {
                assert_eq!(dest.len(), 8);
                dest[..3].copy_from_slice(&[1, 2, 3]);
                Ok::<_, ()>(3)
            })
            .unwrap();
        assert_eq!(n, 3);
        assert_eq!(buf.words(), &[1, 2, 3]);

        let err = buf.append_with(8, |_| Err::<usize, _>("bus error"));
        assert_eq!(err, Err("bus error"));
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_append_with_bounded_by_capacity() {
        let mut buf = EventBuffer::new(4);
        let n = buf
            .append_with(100, |dest| Ok::<_, ()>(dest.len() + 50))
            .unwrap();
        assert_eq!(n, 4);
        assert_eq!(buf.remaining(), 0);
        assert!(matches!(
            buf.open_bank(1, DATA_TYPE_U32, 0),
            Err(BufferError::Full { needed: 2, remaining: 0 })
        ));
    }

    #[test]
    fn test_to_bytes_little_endian() {
        let mut buf = EventBuffer::new(4);
        buf.extend_from_slice(&[0x0102_0304]).unwrap();
        assert_eq!(buf.to_bytes().as_ref(), &[4, 3, 2, 1]);
    }

    #[test]
    fn test_parse_stops_at_truncated_bank() {
        let words = [2, 0x0005_0101, 7, 9, 0x0011_0101];
        let banks = parse_banks(&words);
        assert_eq!(banks.len(), 1);
        assert_eq!(banks[0].data, &[7]);
    }
}
