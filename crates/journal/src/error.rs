// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Journal error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while encoding or decoding a single journal record
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("journal entry is empty")]
    EmptyEntry,
    #[error("journal entry of {len} bytes exceeds the maximum record length")]
    EntryTooLarge { len: usize },
    #[error("record content of {len} bytes cannot hold a length prefix and checksum")]
    TooShort { len: usize },
    #[error("record declares {expected} bytes but only {actual} are present")]
    Truncated { expected: usize, actual: usize },
    #[error("invalid record length field: {length}")]
    InvalidLength { length: i32 },
    #[error("record is followed by {extra} unexpected bytes")]
    TrailingBytes { extra: usize },
    #[error("checksum mismatch: stored {stored:#018x}, computed {computed:#018x}")]
    ChecksumMismatch { stored: u64, computed: u64 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RecordError {
    /// True for malformed input, false for failures of the underlying reader
    pub fn is_corruption(&self) -> bool {
        !matches!(self, RecordError::Io(_))
    }
}

/// Errors from journal files, the writable journal and its iterators
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("illegal state: {0}")]
    IllegalState(String),
    #[error("journal is in use: {}", .0.display())]
    InUse(PathBuf),
    #[error("journal is not started")]
    NotStarted,
    #[error("no more journal records")]
    NoSuchElement,
    #[error("corrupt record in {} at offset {offset}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        offset: u64,
        #[source]
        source: RecordError,
    },
    #[error("invalid record: {0}")]
    Record(#[from] RecordError),
    #[error("entry encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("invalid journal configuration: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl JournalError {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, offset: u64, source: RecordError) -> Self {
        match source {
            RecordError::Io(e) => JournalError::Io(e),
            source => JournalError::Corrupt {
                path: path.into(),
                offset,
                source,
            },
        }
    }
}
