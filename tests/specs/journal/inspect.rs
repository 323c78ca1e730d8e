//! Journal inspection specs
//!
//! Verify dump and last-tx against journals written by the library.

use crate::prelude::*;

#[test]
fn empty_directory_has_no_last_transaction() {
    let temp = Project::empty();

    temp.journal_cmd("last-tx").passes().stdout_eq("none\n");
}

#[test]
fn fresh_journal_dumps_nothing() {
    let temp = Project::empty();
    temp.journal(|_| {});

    temp.journal_cmd("dump").passes().stdout_eq("");
}

#[test]
fn last_tx_ignores_open_transactions() {
    let temp = Project::empty();
    temp.journal(|j| {
        start(j, 5);
        start(j, 9);
        j.write_commit(5, [NODE]).unwrap();
    });

    temp.journal_cmd("last-tx").passes().stdout_eq("5\n");
}

#[test]
fn last_tx_counts_rollbacks() {
    let temp = Project::empty();
    temp.journal(|j| {
        start(j, 3);
        j.write_rollback(3, None, [NODE]).unwrap();
    });

    temp.journal_cmd("last-tx").passes().stdout_eq("3\n");
}

#[test]
fn dump_shows_each_lifecycle_record() {
    let temp = Project::empty();
    temp.journal(|j| {
        start(j, 1);
        j.write_rollback(1, Some(-3), [NODE]).unwrap();
    });

    temp.journal_cmd("dump")
        .passes()
        .stdout_has("tx=1")
        .stdout_has("START")
        .stdout_has(&format!("rm={}", RM))
        .stdout_has("ROLLBACK")
        .stdout_has("error_code=-3");
}

#[test]
fn dump_reads_rotated_segments_first() {
    let temp = Project::empty();
    temp.journal(|j| {
        start(j, 1);
        j.write_commit(1, [NODE]).unwrap();
        j.rotate_now().unwrap();
        start(j, 2);
    });

    let out = temp.journal_cmd("dump").passes().stdout();
    let lines: Vec<_> = out.lines().collect();

    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("txjournal.jnl."));
    assert!(lines[2].starts_with("txjournal.jnl "));
    assert!(lines[2].contains("tx=2"));
}

#[test]
fn last_tx_falls_back_to_rotated_segment() {
    let temp = Project::empty();
    temp.journal(|j| {
        start(j, 4);
        j.write_commit(4, [NODE]).unwrap();
        j.rotate_now().unwrap();
    });

    temp.journal_cmd("last-tx").passes().stdout_eq("4\n");
}
