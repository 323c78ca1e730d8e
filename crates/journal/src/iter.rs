// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tailing reader over the active journal file

use crate::error::JournalError;
use crate::journal::JournalInner;
use crate::record::JournalRecord;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Forward-only, single-pass view of a journal file
///
/// Only records the writer has completely appended are visible. Records
/// appended after the iterator was created are picked up by later calls to
/// [`has_next`](Self::has_next). Once the journal is stopped the iterator
/// is exhausted for good, even if the journal is started again; only a
/// record already staged by `has_next` is still handed out. After a
/// rotation the iterator finishes the segment it was reading.
pub struct JournalIterator {
    inner: Arc<JournalInner>,
    session: u64,
    generation: u64,
    file: File,
    path: PathBuf,
    position: u64,
    pending: Option<Result<JournalRecord, JournalError>>,
    finished: bool,
}

impl JournalIterator {
    pub(crate) fn new(
        inner: Arc<JournalInner>,
        session: u64,
        generation: u64,
        file: File,
        path: PathBuf,
    ) -> Self {
        Self {
            inner,
            session,
            generation,
            file,
            path,
            position: 0,
            pending: None,
            finished: false,
        }
    }

    /// Whether another record is available right now
    ///
    /// A `true` answer stages the record, so the following
    /// [`next_record`](Self::next_record) returns it even if the journal is
    /// stopped in between.
    pub fn has_next(&mut self) -> bool {
        if self.pending.is_some() {
            return true;
        }
        if self.finished {
            return false;
        }
        let Some(bound) = self.readable_bound() else {
            self.finished = true;
            return false;
        };

        let bound = match bound {
            Bound::Known(len) => len,
            Bound::Archived => match self.file.metadata() {
                Ok(meta) => meta.len(),
                Err(e) => return self.fail(e.into()),
            },
        };
        if self.position >= bound {
            return false;
        }

        if let Err(e) = self.file.seek(SeekFrom::Start(self.position)) {
            return self.fail(e.into());
        }
        let mut window = (&self.file).take(bound - self.position);
        match JournalRecord::read_from(&mut window, self.inner.codec()) {
            Ok(Some(record)) => {
                tracing::trace!(offset = self.position, len = record.len(), "journal record read");
                self.position += record.len() as u64;
                self.pending = Some(Ok(record));
                true
            }
            Ok(None) => false,
            Err(e) => {
                let offset = self.position;
                self.fail(JournalError::corrupt(&self.path, offset, e))
            }
        }
    }

    /// Take the next record
    ///
    /// Fails with [`JournalError::NoSuchElement`] once the iterator is
    /// exhausted.
    pub fn next_record(&mut self) -> Result<JournalRecord, JournalError> {
        if !self.has_next() {
            return Err(JournalError::NoSuchElement);
        }
        self.pending.take().unwrap_or(Err(JournalError::NoSuchElement))
    }

    /// Offset just past the last record read
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// How far the file may be read, or `None` once the journal has stopped
    fn readable_bound(&self) -> Option<Bound> {
        let state = self.inner.read_state();
        let active = state.active.as_ref()?;
        if state.session != self.session {
            return None;
        }
        if state.generation == self.generation {
            Some(Bound::Known(active.file.size()))
        } else {
            Some(Bound::Archived)
        }
    }

    fn fail(&mut self, error: JournalError) -> bool {
        self.finished = true;
        self.pending = Some(Err(error));
        true
    }
}

enum Bound {
    /// Length of the active file as last appended by the writer
    Known(u64),
    /// The file has been rotated away and no longer grows
    Archived,
}

impl Iterator for JournalIterator {
    type Item = Result<JournalRecord, JournalError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.has_next() {
            self.pending.take()
        } else {
            None
        }
    }
}

impl std::fmt::Debug for JournalIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalIterator")
            .field("path", &self.path)
            .field("position", &self.position)
            .field("finished", &self.finished)
            .finish()
    }
}

#[cfg(test)]
#[path = "iter_tests.rs"]
mod tests;
