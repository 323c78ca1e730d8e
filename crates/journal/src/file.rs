// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A single append-only journal file
//!
//! The file is a concatenation of complete records, optionally followed by
//! one fragment left behind by a crash during append. Readers treat the
//! fragment as the end of the file.

use crate::checksum::Checksum;
use crate::error::JournalError;
use crate::record::JournalRecord;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Append handle on a journal file
#[derive(Debug)]
pub struct JournalFile {
    path: PathBuf,
    file: File,
    size: u64,
    threshold: u64,
}

impl JournalFile {
    /// Open or create a journal file for appending
    pub fn open(path: &Path, threshold: u64) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            path: path.to_path_buf(),
            file,
            size,
            threshold,
        })
    }

    /// Append record bytes and flush them to disk
    ///
    /// Returns the file size after the append. On failure the file is cut
    /// back to its previous size so that a half-written record does not hide
    /// later appends from readers.
    pub fn append(&mut self, content: &[u8]) -> io::Result<u64> {
        let written = self
            .file
            .write_all(content)
            .and_then(|()| self.file.sync_data());
        if let Err(e) = written {
            if let Err(undo) = self.file.set_len(self.size) {
                tracing::error!(
                    path = %self.path.display(),
                    error = %undo,
                    "failed to cut back partial append"
                );
            }
            return Err(e);
        }
        self.size += content.len() as u64;
        Ok(self.size)
    }

    /// Discard everything after `len` bytes
    pub fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.file.set_len(len)?;
        self.file.sync_all()?;
        self.size = len;
        Ok(())
    }

    pub fn sync(&self) -> io::Result<()> {
        self.file.sync_all()
    }

    /// Current write offset
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    pub fn exceeds_threshold(&self) -> bool {
        self.size > self.threshold
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record that the open file now lives at `path` after a rename
    pub(crate) fn renamed(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }
}

/// A record found by a scan, with the offset it starts at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedRecord {
    pub offset: u64,
    pub record: JournalRecord,
}

/// Forward scan over the complete records of a journal file
///
/// Stops silently at a trailing partial record; yields one error and stops
/// at a corrupt record.
pub struct JournalScanner {
    path: PathBuf,
    reader: BufReader<File>,
    codec: Arc<dyn Checksum>,
    offset: u64,
    done: bool,
}

impl JournalScanner {
    pub fn open(path: &Path, codec: Arc<dyn Checksum>) -> Result<Self, JournalError> {
        let file = File::open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            codec,
            offset: 0,
            done: false,
        })
    }

    /// Offset just past the last complete record returned so far
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

impl Iterator for JournalScanner {
    type Item = Result<ScannedRecord, JournalError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match JournalRecord::read_from(&mut self.reader, &self.codec) {
            Ok(Some(record)) => {
                let offset = self.offset;
                self.offset += record.len() as u64;
                Some(Ok(ScannedRecord { offset, record }))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(JournalError::corrupt(&self.path, self.offset, e)))
            }
        }
    }
}

/// Result of verifying a journal file end to end
#[derive(Debug)]
pub struct Verification {
    pub records: u64,
    /// Offset just past the last complete, valid record
    pub valid_len: u64,
    pub file_len: u64,
    /// Offset and description of the first corrupt record
    pub corruption: Option<(u64, String)>,
}

impl Verification {
    /// True when the file ends in an incomplete record rather than corruption
    pub fn has_partial_tail(&self) -> bool {
        self.corruption.is_none() && self.valid_len < self.file_len
    }

    pub fn is_clean(&self) -> bool {
        self.corruption.is_none() && self.valid_len == self.file_len
    }
}

/// Scan a journal file and report what it contains
pub fn verify(path: &Path, codec: Arc<dyn Checksum>) -> Result<Verification, JournalError> {
    let file_len = std::fs::metadata(path)?.len();
    let mut scanner = JournalScanner::open(path, codec)?;
    let mut records = 0u64;
    let mut corruption = None;

    for scanned in scanner.by_ref() {
        match scanned {
            Ok(_) => records += 1,
            Err(JournalError::Corrupt { offset, source, .. }) => {
                corruption = Some((offset, source.to_string()));
            }
            Err(e) => return Err(e),
        }
    }

    Ok(Verification {
        records,
        valid_len: scanner.offset(),
        file_len,
        corruption,
    })
}

/// Truncate a journal file after its last valid record
///
/// Intended for explicit recovery; returns the number of bytes removed.
pub fn repair(path: &Path, codec: Arc<dyn Checksum>) -> Result<u64, JournalError> {
    let report = verify(path, codec)?;
    if report.valid_len >= report.file_len {
        return Ok(0);
    }

    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(report.valid_len)?;
    file.sync_all()?;

    let removed = report.file_len - report.valid_len;
    tracing::info!(
        path = %path.display(),
        valid_len = report.valid_len,
        removed,
        "journal truncated after last valid record"
    );
    Ok(removed)
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
