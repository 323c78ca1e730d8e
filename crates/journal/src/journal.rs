// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only transaction journal
//!
//! Appends are serialized under the write half of a `RwLock` and synced
//! before the call returns. Iterators read through their own file handles
//! and only take the read half to learn how far the file is known to be
//! complete.

use crate::checksum::Checksum;
use crate::config::JournalConfig;
use crate::entry::{now_millis, TxJournalEntry, TxMessage};
use crate::error::JournalError;
use crate::file::{repair, JournalFile, JournalScanner};
use crate::iter::JournalIterator;
use crate::record::JournalRecord;
use crate::rotation::{JournalRotationManager, Rotate, RotationOutcome};
use fs2::FileExt;
use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

/// Durable log of transaction lifecycle events
///
/// Cloning yields another handle on the same journal.
#[derive(Clone)]
pub struct WritableTxJournal {
    inner: Arc<JournalInner>,
}

pub(crate) struct JournalInner {
    config: JournalConfig,
    codec: Arc<dyn Checksum>,
    rotation: Arc<JournalRotationManager>,
    state: RwLock<JournalState>,
    rotation_pending: AtomicBool,
    rotation_seq: AtomicU64,
}

pub(crate) struct JournalState {
    pub(crate) active: Option<ActiveFile>,
    last_finished_tx_id: Option<i64>,
    /// Bumped on every start; iterators from an earlier session never resume
    pub(crate) session: u64,
    /// Bumped whenever rotation swaps the active file
    pub(crate) generation: u64,
}

pub(crate) struct ActiveFile {
    pub(crate) file: JournalFile,
    lock: File,
}

impl WritableTxJournal {
    /// Create a stopped journal using the configured checksum algorithm
    pub fn new(config: JournalConfig, rotation: Arc<JournalRotationManager>) -> Self {
        let codec = config.checksum.checksum();
        Self::with_checksum(config, rotation, codec)
    }

    /// Create a stopped journal with an explicit checksum function
    pub fn with_checksum(
        config: JournalConfig,
        rotation: Arc<JournalRotationManager>,
        codec: Arc<dyn Checksum>,
    ) -> Self {
        Self {
            inner: Arc::new(JournalInner {
                config,
                codec,
                rotation,
                state: RwLock::new(JournalState {
                    active: None,
                    last_finished_tx_id: None,
                    session: 0,
                    generation: 0,
                }),
                rotation_pending: AtomicBool::new(false),
                rotation_seq: AtomicU64::new(0),
            }),
        }
    }

    /// Open the active file and replay it
    ///
    /// Calling `start` on a started journal does nothing.
    pub fn start(&self) -> Result<(), JournalError> {
        let mut state = self.inner.write_state();
        if state.active.is_some() {
            return Ok(());
        }

        let config = &self.inner.config;
        config.validate()?;
        check_directory(&config.dir)?;
        let lock = acquire_lock(&config.lock_path())?;

        let path = config.active_path();
        let mut file = JournalFile::open(&path, config.rotation_threshold).map_err(|e| {
            if e.kind() == io::ErrorKind::PermissionDenied {
                JournalError::IllegalState(format!(
                    "journal file is not writable: {}",
                    path.display()
                ))
            } else {
                JournalError::Io(e)
            }
        })?;

        let replayed = replay(&path, &self.inner.codec)?;
        if replayed.valid_len < file.size() {
            let saved = save_tail(&path, replayed.valid_len)?;
            warn!(
                path = %path.display(),
                valid_len = replayed.valid_len,
                file_len = file.size(),
                saved = %saved.display(),
                "discarding incomplete record at end of journal"
            );
            file.truncate(replayed.valid_len)?;
        }

        let last_finished = match replayed.last_finished {
            Some(tx_id) => Some(tx_id),
            None => self.inner.last_finished_from_archives(),
        };

        state.active = Some(ActiveFile { file, lock });
        state.last_finished_tx_id = last_finished;
        state.session += 1;

        info!(
            path = %path.display(),
            records = replayed.records,
            last_finished_tx_id = ?last_finished,
            "journal started"
        );
        Ok(())
    }

    /// Flush and close the active file
    ///
    /// Iterators created before the stop produce no further records, apart
    /// from one already staged by [`JournalIterator::has_next`].
    pub fn stop(&self) -> Result<(), JournalError> {
        let mut state = self.inner.write_state();
        let Some(active) = state.active.take() else {
            return Ok(());
        };

        let synced = active.file.sync();
        if let Err(e) = FileExt::unlock(&active.lock) {
            warn!(error = %e, "failed to release journal lock");
        }
        info!(path = %active.file.path().display(), "journal stopped");
        synced.map_err(JournalError::from)
    }

    pub fn is_started(&self) -> bool {
        self.inner.read_state().active.is_some()
    }

    pub fn write_start(
        &self,
        message: TxMessage,
        participants: impl IntoIterator<Item = Uuid>,
    ) -> Result<(), JournalError> {
        let participants: BTreeSet<Uuid> = participants.into_iter().collect();
        self.append(TxJournalEntry::start(message, participants))
    }

    pub fn write_commit(
        &self,
        tx_id: i64,
        participants: impl IntoIterator<Item = Uuid>,
    ) -> Result<(), JournalError> {
        let participants: BTreeSet<Uuid> = participants.into_iter().collect();
        self.append(TxJournalEntry::commit(tx_id, participants))
    }

    pub fn write_rollback(
        &self,
        tx_id: i64,
        error_code: Option<i32>,
        participants: impl IntoIterator<Item = Uuid>,
    ) -> Result<(), JournalError> {
        let participants: BTreeSet<Uuid> = participants.into_iter().collect();
        self.append(TxJournalEntry::rollback(tx_id, error_code, participants))
    }

    /// Highest transaction id seen in a COMMIT or ROLLBACK entry
    pub fn last_finished_tx_id(&self) -> Option<i64> {
        self.inner.read_state().last_finished_tx_id
    }

    /// Read the active file from the beginning
    pub fn iterator(&self) -> Result<JournalIterator, JournalError> {
        let state = self.inner.read_state();
        let active = state.active.as_ref().ok_or(JournalError::NotStarted)?;
        let path = active.file.path().to_path_buf();
        let file = File::open(&path)?;
        Ok(JournalIterator::new(
            Arc::clone(&self.inner),
            state.session,
            state.generation,
            file,
            path,
        ))
    }

    pub fn path(&self) -> PathBuf {
        self.inner.config.active_path()
    }

    pub fn config(&self) -> &JournalConfig {
        &self.inner.config
    }

    /// Rotated segments still on disk, oldest first
    pub fn rotated_files(&self) -> Result<Vec<PathBuf>, JournalError> {
        Ok(list_rotated(&self.inner.config)?)
    }

    /// Rotate now, regardless of size
    ///
    /// Runs on the calling thread; used by operators and tests. Requests
    /// raised by appends still go through the rotation manager.
    pub fn rotate_now(&self) -> Result<RotationOutcome, JournalError> {
        self.inner.rotate_inner(true)
    }

    fn append(&self, entry: TxJournalEntry) -> Result<(), JournalError> {
        let op = entry.op();
        let tx_id = entry.tx_id;
        let bytes = entry.to_bytes()?;
        let record = JournalRecord::encode(&bytes, self.inner.codec.as_ref())?;

        let wants_rotation = {
            let mut guard = self.inner.write_state();
            let state = &mut *guard;
            let active = state.active.as_mut().ok_or(JournalError::NotStarted)?;
            let size = active.file.append(record.content())?;
            if op.is_terminal() && state.last_finished_tx_id.is_none_or(|last| tx_id > last) {
                state.last_finished_tx_id = Some(tx_id);
            }
            trace!(tx_id, op = %op, size, "journal append");
            active.file.exceeds_threshold()
        };

        if wants_rotation {
            self.request_rotation();
        }
        Ok(())
    }

    fn request_rotation(&self) {
        if self
            .inner
            .rotation_pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let target: Arc<dyn Rotate> = Arc::clone(&self.inner) as Arc<dyn Rotate>;
        if !self.inner.rotation.submit(target) {
            self.inner.rotation_pending.store(false, Ordering::Release);
        }
    }
}

impl std::fmt::Debug for WritableTxJournal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WritableTxJournal")
            .field("path", &self.inner.config.active_path())
            .field("started", &self.is_started())
            .finish()
    }
}

impl JournalInner {
    pub(crate) fn read_state(&self) -> RwLockReadGuard<'_, JournalState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, JournalState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn codec(&self) -> &dyn Checksum {
        self.codec.as_ref()
    }

    /// Newest rotated segment's last finished transaction, if any
    fn last_finished_from_archives(&self) -> Option<i64> {
        let archives = match list_rotated(&self.config) {
            Ok(archives) => archives,
            Err(e) => {
                warn!(error = %e, "failed to list rotated journal segments");
                return None;
            }
        };
        for path in archives.iter().rev() {
            match replay(path, &self.codec) {
                Ok(Replay {
                    last_finished: Some(tx_id),
                    ..
                }) => return Some(tx_id),
                Ok(_) => continue,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable journal segment");
                }
            }
        }
        None
    }

    fn rotate_inner(&self, force: bool) -> Result<RotationOutcome, JournalError> {
        let next_path = self.config.next_path();
        let mut replacement = JournalFile::open(&next_path, self.config.rotation_threshold)?;
        if replacement.size() > 0 {
            // Left over from an interrupted rotation
            replacement.truncate(0)?;
        }

        let archived = {
            let mut guard = self.write_state();
            let state = &mut *guard;
            let active = match state.active.as_mut() {
                Some(active) if force || active.file.exceeds_threshold() => active,
                _ => {
                    discard(&next_path);
                    return Ok(RotationOutcome::Skipped);
                }
            };

            let active_path = self.config.active_path();
            let seq = self.rotation_seq.fetch_add(1, Ordering::Relaxed);
            let archived = self.config.rotated_path(now_millis(), seq);
            active.file.sync()?;
            std::fs::rename(&active_path, &archived)?;
            if let Err(e) = std::fs::rename(&next_path, &active_path) {
                if let Err(undo) = std::fs::rename(&archived, &active_path) {
                    error!(
                        archived = %archived.display(),
                        error = %undo,
                        "failed to restore journal after aborted rotation"
                    );
                }
                return Err(e.into());
            }
            active.file = replacement.renamed(active_path);
            state.generation += 1;
            archived
        };

        sync_dir(&self.config.dir);
        self.prune_archives();
        Ok(RotationOutcome::Rotated { archived })
    }

    fn prune_archives(&self) {
        let archives = match list_rotated(&self.config) {
            Ok(archives) => archives,
            Err(e) => {
                warn!(error = %e, "failed to list rotated journal segments");
                return;
            }
        };
        let excess = archives.len().saturating_sub(self.config.max_rotated_files);
        for path in archives.into_iter().take(excess) {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "removed old journal segment"),
                Err(e) => warn!(path = %path.display(), error = %e, "failed to remove journal segment"),
            }
        }
    }
}

impl Rotate for JournalInner {
    fn rotate(&self) -> Result<RotationOutcome, JournalError> {
        let outcome = self.rotate_inner(false);
        self.rotation_pending.store(false, Ordering::Release);
        outcome
    }
}

struct Replay {
    records: u64,
    valid_len: u64,
    last_finished: Option<i64>,
}

/// Scan a journal file, tracking the highest finished transaction
fn replay(path: &Path, codec: &Arc<dyn Checksum>) -> Result<Replay, JournalError> {
    let mut scanner = JournalScanner::open(path, Arc::clone(codec))?;
    let mut records = 0;
    let mut last_finished: Option<i64> = None;

    for scanned in scanner.by_ref() {
        let scanned = scanned?;
        let entry = TxJournalEntry::from_bytes(scanned.record.entry()).inspect_err(|e| {
            error!(
                path = %path.display(),
                offset = scanned.offset,
                error = %e,
                "undecodable journal entry"
            );
        })?;
        if entry.op().is_terminal() && last_finished.is_none_or(|last| entry.tx_id > last) {
            last_finished = Some(entry.tx_id);
        }
        records += 1;
    }

    Ok(Replay {
        records,
        valid_len: scanner.offset(),
        last_finished,
    })
}

fn check_directory(dir: &Path) -> Result<(), JournalError> {
    let metadata = std::fs::metadata(dir).map_err(|_| {
        JournalError::IllegalState(format!("journal directory does not exist: {}", dir.display()))
    })?;
    if !metadata.is_dir() {
        return Err(JournalError::IllegalState(format!(
            "journal path is not a directory: {}",
            dir.display()
        )));
    }
    if metadata.permissions().readonly() {
        return Err(JournalError::IllegalState(format!(
            "journal directory is not writable: {}",
            dir.display()
        )));
    }
    Ok(())
}

/// Truncate the active file of a stopped journal after its last valid record
///
/// Takes the journal lock first and fails with [`JournalError::InUse`] while
/// a writer holds it. Returns the number of bytes removed.
pub fn repair_stopped(config: &JournalConfig) -> Result<u64, JournalError> {
    config.validate()?;
    let lock_path = config.lock_path();
    let lock = open_lock(&lock_path)?;
    if lock.try_lock_exclusive().is_err() {
        return Err(JournalError::InUse(lock_path));
    }
    let removed = repair(&config.active_path(), config.checksum.checksum());
    if let Err(e) = FileExt::unlock(&lock) {
        warn!(error = %e, "failed to release journal lock");
    }
    removed
}

/// Copy the bytes of `path` from `offset` on into a sidecar file
fn save_tail(path: &Path, offset: u64) -> Result<PathBuf, JournalError> {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".tail-{}", now_millis()));
    let saved = PathBuf::from(name);

    let mut source = File::open(path)?;
    source.seek(SeekFrom::Start(offset))?;
    let mut sidecar = File::create(&saved)?;
    io::copy(&mut source, &mut sidecar)?;
    sidecar.sync_all()?;
    Ok(saved)
}

fn open_lock(path: &Path) -> Result<File, JournalError> {
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
        .map_err(|e| {
            JournalError::IllegalState(format!("cannot open journal lock {}: {}", path.display(), e))
        })
}

fn acquire_lock(path: &Path) -> Result<File, JournalError> {
    let lock = open_lock(path)?;
    lock.try_lock_exclusive().map_err(|_| {
        JournalError::IllegalState(format!(
            "journal is locked by another process: {}",
            path.display()
        ))
    })?;
    Ok(lock)
}

/// Rotated segments of `config`, oldest first
pub(crate) fn list_rotated(config: &JournalConfig) -> io::Result<Vec<PathBuf>> {
    let mut segments = Vec::new();
    for entry in std::fs::read_dir(&config.dir)? {
        let path = entry?.path();
        if let Some(key) = config.rotated_key(&path) {
            segments.push((key, path));
        }
    }
    segments.sort();
    Ok(segments.into_iter().map(|(_, path)| path).collect())
}

fn discard(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        debug!(path = %path.display(), error = %e, "failed to remove unused journal file");
    }
}

fn sync_dir(dir: &Path) {
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        debug!(dir = %dir.display(), error = %e, "directory sync failed");
    }
}

#[cfg(test)]
#[path = "journal_tests.rs"]
mod tests;
