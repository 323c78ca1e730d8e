// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dtx-journal: durable transaction journal
//!
//! Records are framed as `i32 length ‖ entry ‖ u64 checksum`, big-endian,
//! with the checksum taken over the length and the entry. Files are
//! append-only; a crash can leave at most one incomplete record at the end,
//! which readers treat as the end of the file.

pub mod checksum;
pub mod config;
pub mod entry;
pub mod error;
pub mod file;
mod iter;
mod journal;
pub mod record;
pub mod rotation;

pub use checksum::{Checksum, ChecksumKind, Crc32Checksum, Sha256Checksum};
pub use config::JournalConfig;
pub use entry::{ProtocolVersion, TxJournalEntry, TxMessage, TxOp, TxOperation};
pub use error::{JournalError, RecordError};
pub use file::{repair, verify, JournalFile, JournalScanner, ScannedRecord, Verification};
pub use iter::JournalIterator;
pub use journal::{repair_stopped, WritableTxJournal};
pub use record::JournalRecord;
pub use rotation::{JournalRotationManager, Rotate, RotationOutcome};
