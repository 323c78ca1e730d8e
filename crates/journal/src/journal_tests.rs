// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::entry::TxOp;
use std::io::Write;
use tempfile::TempDir;

const RM: Uuid = Uuid::from_u128(0x5eed);

fn message(tx_id: i64) -> TxMessage {
    TxMessage::new(tx_id, RM, format!("op-{}", tx_id).into_bytes())
}

fn node(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

fn journal_in(dir: &TempDir) -> WritableTxJournal {
    WritableTxJournal::new(
        JournalConfig::new(dir.path()),
        Arc::new(JournalRotationManager::disabled()),
    )
}

fn entries(journal: &WritableTxJournal) -> Vec<TxJournalEntry> {
    journal
        .iterator()
        .unwrap()
        .map(|record| TxJournalEntry::from_bytes(record.unwrap().entry()).unwrap())
        .collect()
}

#[test]
fn start_creates_active_file() {
    let dir = TempDir::new().unwrap();
    let journal = journal_in(&dir);

    journal.start().unwrap();

    assert!(journal.is_started());
    assert!(dir.path().join("txjournal.jnl").exists());
    assert_eq!(journal.last_finished_tx_id(), None);
}

#[test]
fn start_and_stop_are_idempotent() {
    let dir = TempDir::new().unwrap();
    let journal = journal_in(&dir);

    journal.start().unwrap();
    journal.start().unwrap();
    journal.write_commit(1, [node(1)]).unwrap();
    journal.stop().unwrap();
    journal.stop().unwrap();

    assert!(!journal.is_started());
    journal.start().unwrap();
    assert_eq!(journal.last_finished_tx_id(), Some(1));
}

#[test]
fn start_fails_for_missing_directory() {
    let dir = TempDir::new().unwrap();
    let journal = WritableTxJournal::new(
        JournalConfig::new(dir.path().join("missing")),
        Arc::new(JournalRotationManager::disabled()),
    );

    let err = journal.start().unwrap_err();
    assert!(matches!(err, JournalError::IllegalState(_)), "{:?}", err);
    assert!(!journal.is_started());
}

#[test]
fn start_fails_when_path_is_a_file() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("not-a-dir");
    std::fs::write(&file, b"").unwrap();
    let journal = WritableTxJournal::new(
        JournalConfig::new(&file),
        Arc::new(JournalRotationManager::disabled()),
    );

    assert!(matches!(journal.start(), Err(JournalError::IllegalState(_))));
}

#[cfg(unix)]
#[test]
fn start_fails_for_readonly_directory() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let readonly = dir.path().join("ro");
    std::fs::create_dir(&readonly).unwrap();
    std::fs::set_permissions(&readonly, std::fs::Permissions::from_mode(0o555)).unwrap();
    let journal = WritableTxJournal::new(
        JournalConfig::new(&readonly),
        Arc::new(JournalRotationManager::disabled()),
    );

    let result = journal.start();
    std::fs::set_permissions(&readonly, std::fs::Permissions::from_mode(0o755)).unwrap();

    let err = result.unwrap_err();
    assert!(matches!(err, JournalError::IllegalState(_)), "{:?}", err);
    assert!(!journal.is_started());
}

#[test]
fn start_rejects_invalid_config() {
    let dir = TempDir::new().unwrap();
    let journal = WritableTxJournal::new(
        JournalConfig::new(dir.path()).with_prefix(""),
        Arc::new(JournalRotationManager::disabled()),
    );

    assert!(matches!(journal.start(), Err(JournalError::Config(_))));
}

#[test]
fn second_writer_is_locked_out() {
    let dir = TempDir::new().unwrap();
    let first = journal_in(&dir);
    let second = journal_in(&dir);

    first.start().unwrap();
    assert!(matches!(second.start(), Err(JournalError::IllegalState(_))));

    first.stop().unwrap();
    second.start().unwrap();
}

#[test]
fn repair_is_refused_while_started() {
    let dir = TempDir::new().unwrap();
    let journal = journal_in(&dir);
    journal.start().unwrap();
    journal.write_commit(1, [node(1)]).unwrap();
    let size = std::fs::metadata(journal.path()).unwrap().len();
    OpenOptions::new()
        .append(true)
        .open(journal.path())
        .unwrap()
        .write_all(&[0, 0, 1])
        .unwrap();

    let err = repair_stopped(journal.config()).unwrap_err();
    assert!(matches!(err, JournalError::InUse(_)), "{:?}", err);
    assert_eq!(std::fs::metadata(journal.path()).unwrap().len(), size + 3);

    journal.stop().unwrap();
    assert_eq!(repair_stopped(journal.config()).unwrap(), 3);
    assert_eq!(std::fs::metadata(journal.path()).unwrap().len(), size);
    journal.start().unwrap();
}

#[test]
fn writes_require_started_journal() {
    let dir = TempDir::new().unwrap();
    let journal = journal_in(&dir);

    assert!(matches!(
        journal.write_start(message(1), [node(1)]),
        Err(JournalError::NotStarted)
    ));
    assert!(matches!(
        journal.write_commit(1, [node(1)]),
        Err(JournalError::NotStarted)
    ));
    assert!(matches!(
        journal.write_rollback(1, None, [node(1)]),
        Err(JournalError::NotStarted)
    ));
    assert!(matches!(journal.iterator(), Err(JournalError::NotStarted)));
}

#[test]
fn writes_are_read_back_in_order() {
    let dir = TempDir::new().unwrap();
    let journal = journal_in(&dir);
    journal.start().unwrap();

    journal.write_start(message(1), [node(2), node(1)]).unwrap();
    journal.write_commit(1, [node(1), node(2)]).unwrap();
    journal.write_start(message(2), [node(1)]).unwrap();
    journal.write_rollback(2, Some(-3), [node(1)]).unwrap();

    let read = entries(&journal);
    let ops: Vec<_> = read.iter().map(|e| (e.tx_id, e.op())).collect();
    assert_eq!(
        ops,
        vec![
            (1, TxOp::Start),
            (1, TxOp::Commit),
            (2, TxOp::Start),
            (2, TxOp::Rollback)
        ]
    );
    assert_eq!(read[0].message(), Some(&message(1)));
    assert_eq!(read[0].participants, [node(1), node(2)].into_iter().collect());
    assert_eq!(read[3].error_code(), Some(-3));
}

#[test]
fn last_finished_only_moves_forward() {
    let dir = TempDir::new().unwrap();
    let journal = journal_in(&dir);
    journal.start().unwrap();

    journal.write_start(message(10), [node(1)]).unwrap();
    assert_eq!(journal.last_finished_tx_id(), None);

    journal.write_commit(10, [node(1)]).unwrap();
    journal.write_rollback(4, None, [node(1)]).unwrap();
    journal.write_start(message(11), [node(1)]).unwrap();

    assert_eq!(journal.last_finished_tx_id(), Some(10));
}

#[test]
fn restart_recovers_last_finished() {
    let dir = TempDir::new().unwrap();
    {
        let journal = journal_in(&dir);
        journal.start().unwrap();
        journal.write_start(message(5), [node(1)]).unwrap();
        journal.write_commit(5, [node(1)]).unwrap();
        journal.write_start(message(6), [node(1)]).unwrap();
        journal.stop().unwrap();
    }

    let journal = journal_in(&dir);
    journal.start().unwrap();

    assert_eq!(journal.last_finished_tx_id(), Some(5));
}

#[test]
fn start_truncates_partial_tail() {
    let dir = TempDir::new().unwrap();
    let path = {
        let journal = journal_in(&dir);
        journal.start().unwrap();
        journal.write_commit(3, [node(1)]).unwrap();
        journal.stop().unwrap();
        journal.path()
    };
    let valid_len = std::fs::metadata(&path).unwrap().len();
    {
        let mut raw = OpenOptions::new().append(true).open(&path).unwrap();
        raw.write_all(&[0, 0, 0, 40, b'{']).unwrap();
    }

    let journal = journal_in(&dir);
    journal.start().unwrap();

    assert_eq!(std::fs::metadata(&path).unwrap().len(), valid_len);
    journal.write_commit(4, [node(1)]).unwrap();
    let ids: Vec<_> = entries(&journal).iter().map(|e| e.tx_id).collect();
    assert_eq!(ids, vec![3, 4]);
}

fn saved_tails(dir: &TempDir) -> Vec<PathBuf> {
    std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("txjournal.jnl.tail-"))
        })
        .collect()
}

#[test]
fn discarded_tail_is_kept_beside_the_journal() {
    let dir = TempDir::new().unwrap();
    let path = {
        let journal = journal_in(&dir);
        journal.start().unwrap();
        journal.write_commit(1, [node(1)]).unwrap();
        journal.write_commit(2, [node(1)]).unwrap();
        journal.stop().unwrap();
        journal.path()
    };
    let original = std::fs::read(&path).unwrap();
    let first_len = original.len() / 2;
    // A damaged length field on the second record swallows the rest of the file
    let mut damaged = original.clone();
    damaged[first_len..first_len + 4].copy_from_slice(&0x00ff_ffffi32.to_be_bytes());
    std::fs::write(&path, &damaged).unwrap();

    let journal = journal_in(&dir);
    journal.start().unwrap();

    assert_eq!(journal.last_finished_tx_id(), Some(1));
    let tails = saved_tails(&dir);
    assert_eq!(tails.len(), 1);
    assert_eq!(std::fs::read(&tails[0]).unwrap(), &damaged[first_len..]);
    assert!(journal.rotated_files().unwrap().is_empty());
}

#[test]
fn clean_start_saves_no_tail() {
    let dir = TempDir::new().unwrap();
    let journal = journal_in(&dir);
    journal.start().unwrap();
    journal.write_commit(1, [node(1)]).unwrap();
    journal.stop().unwrap();

    journal.start().unwrap();

    assert!(saved_tails(&dir).is_empty());
}

#[test]
fn start_surfaces_corruption() {
    let dir = TempDir::new().unwrap();
    let path = {
        let journal = journal_in(&dir);
        journal.start().unwrap();
        journal.write_commit(1, [node(1)]).unwrap();
        journal.write_commit(2, [node(1)]).unwrap();
        journal.stop().unwrap();
        journal.path()
    };
    let mut bytes = std::fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x40;
    std::fs::write(&path, bytes).unwrap();

    let journal = journal_in(&dir);
    let err = journal.start().unwrap_err();

    match err {
        JournalError::Corrupt { path: p, offset, .. } => {
            assert_eq!(p, path);
            assert!(offset > 0);
        }
        other => panic!("expected corruption, got {:?}", other),
    }
    assert!(!journal.is_started());
}

#[test]
fn custom_checksum_is_used_for_replay() {
    let dir = TempDir::new().unwrap();
    let config = JournalConfig::new(dir.path()).with_checksum(crate::ChecksumKind::Crc32);
    {
        let journal =
            WritableTxJournal::new(config.clone(), Arc::new(JournalRotationManager::disabled()));
        journal.start().unwrap();
        journal.write_commit(8, [node(1)]).unwrap();
        journal.stop().unwrap();
    }

    let mismatched = journal_in(&dir);
    assert!(matches!(
        mismatched.start(),
        Err(JournalError::Corrupt { .. })
    ));

    let journal = WritableTxJournal::new(config, Arc::new(JournalRotationManager::disabled()));
    journal.start().unwrap();
    assert_eq!(journal.last_finished_tx_id(), Some(8));
}

#[test]
fn rotate_now_archives_active_file() {
    let dir = TempDir::new().unwrap();
    let journal = journal_in(&dir);
    journal.start().unwrap();
    journal.write_commit(1, [node(1)]).unwrap();

    let outcome = journal.rotate_now().unwrap();

    let RotationOutcome::Rotated { archived } = outcome else {
        panic!("expected rotation, got {:?}", outcome);
    };
    assert!(archived.exists());
    assert_eq!(journal.rotated_files().unwrap(), vec![archived]);
    assert_eq!(std::fs::metadata(journal.path()).unwrap().len(), 0);
    assert!(!journal.config().next_path().exists());
    assert_eq!(journal.last_finished_tx_id(), Some(1));

    journal.write_commit(2, [node(1)]).unwrap();
    let ids: Vec<_> = entries(&journal).iter().map(|e| e.tx_id).collect();
    assert_eq!(ids, vec![2]);
}

#[test]
fn rotation_below_threshold_is_skipped() {
    let dir = TempDir::new().unwrap();
    let journal = journal_in(&dir);
    journal.start().unwrap();
    journal.write_commit(1, [node(1)]).unwrap();

    let outcome = Rotate::rotate(&*journal.inner).unwrap();

    assert_eq!(outcome, RotationOutcome::Skipped);
    assert!(journal.rotated_files().unwrap().is_empty());
    assert!(!journal.config().next_path().exists());
}

#[test]
fn rotation_of_stopped_journal_is_skipped() {
    let dir = TempDir::new().unwrap();
    let journal = journal_in(&dir);

    assert_eq!(journal.rotate_now().unwrap(), RotationOutcome::Skipped);
}

#[test]
fn rotation_prunes_old_segments() {
    let dir = TempDir::new().unwrap();
    let journal = WritableTxJournal::new(
        JournalConfig::new(dir.path()).with_max_rotated_files(2),
        Arc::new(JournalRotationManager::disabled()),
    );
    journal.start().unwrap();

    let mut archived = Vec::new();
    for tx_id in 0..4 {
        journal.write_commit(tx_id, [node(1)]).unwrap();
        match journal.rotate_now().unwrap() {
            RotationOutcome::Rotated { archived: path } => archived.push(path),
            RotationOutcome::Skipped => panic!("rotation skipped"),
        }
    }

    assert_eq!(journal.rotated_files().unwrap(), archived[2..].to_vec());
}

#[test]
fn restart_after_rotation_reads_last_finished_from_archive() {
    let dir = TempDir::new().unwrap();
    {
        let journal = journal_in(&dir);
        journal.start().unwrap();
        journal.write_commit(42, [node(1)]).unwrap();
        journal.rotate_now().unwrap();
        journal.write_start(message(43), [node(1)]).unwrap();
        journal.stop().unwrap();
    }

    let journal = journal_in(&dir);
    journal.start().unwrap();

    assert_eq!(journal.last_finished_tx_id(), Some(42));
}

#[test]
fn threshold_crossing_submits_rotation() {
    let dir = TempDir::new().unwrap();
    let rotation = Arc::new(JournalRotationManager::new(1).unwrap());
    let journal = WritableTxJournal::new(
        JournalConfig::new(dir.path()).with_rotation_threshold(64),
        Arc::clone(&rotation),
    );
    journal.start().unwrap();

    journal.write_commit(1, [node(1)]).unwrap();
    assert!(rotation.wait_idle(std::time::Duration::from_secs(5)));

    assert_eq!(journal.rotated_files().unwrap().len(), 1);
    assert!(!journal.inner.rotation_pending.load(Ordering::Acquire));
    assert_eq!(journal.last_finished_tx_id(), Some(1));
}

#[test]
fn disabled_rotation_leaves_file_growing() {
    let dir = TempDir::new().unwrap();
    let journal = WritableTxJournal::new(
        JournalConfig::new(dir.path()).with_rotation_threshold(16),
        Arc::new(JournalRotationManager::disabled()),
    );
    journal.start().unwrap();

    for tx_id in 0..5 {
        journal.write_commit(tx_id, [node(1)]).unwrap();
    }

    assert!(journal.rotated_files().unwrap().is_empty());
    assert!(!journal.inner.rotation_pending.load(Ordering::Acquire));
    assert_eq!(entries(&journal).len(), 5);
}

/// Log output captured from a scoped subscriber
#[derive(Clone, Default)]
struct CapturedLogs {
    logs: Arc<std::sync::Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.logs.lock().unwrap()).to_string()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.logs.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[test]
fn partial_tail_truncation_is_logged() {
    let dir = TempDir::new().unwrap();
    let path = {
        let journal = journal_in(&dir);
        journal.start().unwrap();
        journal.write_commit(8, [node(1)]).unwrap();
        journal.stop().unwrap();
        journal.path()
    };
    OpenOptions::new()
        .append(true)
        .open(&path)
        .unwrap()
        .write_all(&[0, 0, 0])
        .unwrap();

    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(logs.clone())
        .with_ansi(false)
        .without_time()
        .finish();
    tracing::subscriber::with_default(subscriber, || {
        journal_in(&dir).start().unwrap();
    });

    let output = logs.contents();
    assert!(output.contains("discarding incomplete record at end of journal"));
    assert!(output.contains("last_finished_tx_id=Some(8)"));
}
