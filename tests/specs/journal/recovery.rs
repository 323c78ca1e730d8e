//! Journal recovery specs
//!
//! Verify that verify and repair handle torn writes and corruption.

use crate::prelude::*;
use std::io::Write;
use std::sync::Arc;

fn committed_journal(temp: &Project) {
    temp.journal(|j| {
        start(j, 1);
        j.write_commit(1, [NODE]).unwrap();
    });
}

#[test]
fn clean_journal_verifies() {
    let temp = Project::empty();
    committed_journal(&temp);

    temp.journal_cmd("verify")
        .passes()
        .stdout_has("txjournal.jnl: 2 records");
}

#[test]
fn torn_write_is_a_partial_tail() {
    let temp = Project::empty();
    committed_journal(&temp);
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(temp.active_journal())
        .unwrap();
    file.write_all(&[0, 0, 1]).unwrap();

    temp.journal_cmd("verify")
        .passes()
        .stdout_has("partial record at offset");

    temp.journal_cmd("repair")
        .passes()
        .stdout_eq("removed 3 bytes from txjournal.jnl\n");
}

#[test]
fn corruption_fails_verify_until_repaired() {
    let temp = Project::empty();
    committed_journal(&temp);
    let path = temp.active_journal();
    let mut bytes = std::fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    std::fs::write(&path, &bytes).unwrap();

    temp.journal_cmd("verify")
        .fails()
        .stderr_has("journal is corrupt");
    temp.journal_cmd("last-tx").fails();

    temp.journal_cmd("repair").passes().stdout_has("removed");

    temp.journal_cmd("verify").passes().stdout_has("1 records");
    temp.journal_cmd("last-tx").passes().stdout_eq("none\n");
}

#[test]
fn repair_of_clean_journal_removes_nothing() {
    let temp = Project::empty();
    committed_journal(&temp);

    temp.journal_cmd("repair")
        .passes()
        .stdout_eq("removed 0 bytes from txjournal.jnl\n");
}

#[test]
fn repair_without_journal_fails() {
    let temp = Project::empty();

    temp.journal_cmd("repair")
        .fails()
        .stderr_has("no active journal file");
}

#[test]
fn repair_waits_for_the_node_to_stop() {
    let temp = Project::empty();
    committed_journal(&temp);
    let journal = WritableTxJournal::new(
        temp.journal_config(),
        Arc::new(JournalRotationManager::disabled()),
    );
    journal.start().unwrap();

    temp.journal_cmd("repair")
        .fails()
        .stderr_has("journal is in use");

    journal.stop().unwrap();
    temp.journal_cmd("repair")
        .passes()
        .stdout_eq("removed 0 bytes from txjournal.jnl\n");
}
