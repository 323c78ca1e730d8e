// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Binary journal record codec
//!
//! On-disk layout of one record, all integers big-endian:
//!
//! ```text
//! +-------------+------------------+----------------+
//! | length: i32 | entry: length B  | checksum: u64  |
//! +-------------+------------------+----------------+
//! ```
//!
//! The checksum covers the length field and the entry bytes.

use crate::checksum::Checksum;
use crate::error::RecordError;
use std::io::{self, Read};

/// Size of the length prefix
pub const LENGTH_SIZE: usize = 4;

/// Size of the checksum trailer
pub const CHECKSUM_SIZE: usize = 8;

/// Bytes a record occupies beyond its entry
pub const RECORD_OVERHEAD: usize = LENGTH_SIZE + CHECKSUM_SIZE;

/// One encoded journal record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalRecord {
    content: Vec<u8>,
    checksum: u64,
}

impl JournalRecord {
    /// Build a record around a serialized entry
    pub fn encode<C: Checksum + ?Sized>(entry: &[u8], codec: &C) -> Result<Self, RecordError> {
        if entry.is_empty() {
            return Err(RecordError::EmptyEntry);
        }
        let length =
            i32::try_from(entry.len()).map_err(|_| RecordError::EntryTooLarge { len: entry.len() })?;

        let mut content = Vec::with_capacity(entry.len() + RECORD_OVERHEAD);
        content.extend_from_slice(&length.to_be_bytes());
        content.extend_from_slice(entry);
        let checksum = codec.checksum(&content);
        content.extend_from_slice(&checksum.to_be_bytes());

        Ok(Self { content, checksum })
    }

    /// Parse exactly one record from its persisted bytes
    pub fn decode<C: Checksum + ?Sized>(content: &[u8], codec: &C) -> Result<Self, RecordError> {
        if content.len() < RECORD_OVERHEAD {
            return Err(RecordError::TooShort { len: content.len() });
        }
        let length = read_length(&content[..LENGTH_SIZE]);
        if length <= 0 {
            return Err(RecordError::InvalidLength { length });
        }

        let expected = length as usize + RECORD_OVERHEAD;
        if content.len() < expected {
            return Err(RecordError::Truncated {
                expected,
                actual: content.len(),
            });
        }
        if content.len() > expected {
            return Err(RecordError::TrailingBytes {
                extra: content.len() - expected,
            });
        }

        Self::verified(content.to_vec(), codec)
    }

    /// Read the next record from a byte source
    ///
    /// Returns `Ok(None)` when the source ends before a complete record is
    /// available, which is how a crash-truncated tail presents itself.
    pub fn read_from<R, C>(source: &mut R, codec: &C) -> Result<Option<Self>, RecordError>
    where
        R: Read + ?Sized,
        C: Checksum + ?Sized,
    {
        let mut header = [0u8; LENGTH_SIZE];
        if read_full(source, &mut header)? < LENGTH_SIZE {
            return Ok(None);
        }
        let length = read_length(&header);
        if length <= 0 {
            return Err(RecordError::InvalidLength { length });
        }

        let body_len = length as usize + CHECKSUM_SIZE;
        let mut content = Vec::with_capacity(LENGTH_SIZE + body_len.min(64 * 1024));
        content.extend_from_slice(&header);
        // `take` grows the buffer as bytes arrive, so a corrupt length field
        // cannot force a huge up-front allocation.
        let read = source.take(body_len as u64).read_to_end(&mut content)?;
        if read < body_len {
            return Ok(None);
        }

        Self::verified(content, codec).map(Some)
    }

    fn verified<C: Checksum + ?Sized>(content: Vec<u8>, codec: &C) -> Result<Self, RecordError> {
        let split = content.len() - CHECKSUM_SIZE;
        let mut trailer = [0u8; CHECKSUM_SIZE];
        trailer.copy_from_slice(&content[split..]);
        let stored = u64::from_be_bytes(trailer);
        let computed = codec.checksum(&content[..split]);
        if stored != computed {
            return Err(RecordError::ChecksumMismatch { stored, computed });
        }
        Ok(Self {
            content,
            checksum: stored,
        })
    }

    /// The serialized entry carried by this record
    pub fn entry(&self) -> &[u8] {
        &self.content[LENGTH_SIZE..self.content.len() - CHECKSUM_SIZE]
    }

    /// The full on-disk bytes: length, entry and checksum
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn checksum(&self) -> u64 {
        self.checksum
    }

    /// Size of the record on disk
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Always false: a record carries at least one entry byte
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

fn read_length(bytes: &[u8]) -> i32 {
    let mut raw = [0u8; LENGTH_SIZE];
    raw.copy_from_slice(&bytes[..LENGTH_SIZE]);
    i32::from_be_bytes(raw)
}

/// Fill `buf` as far as the source allows, returning the bytes read
fn read_full<R: Read + ?Sized>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
