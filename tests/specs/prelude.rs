//! Shared helpers for CLI specs

#![allow(dead_code)]

pub use dtx_journal::{JournalConfig, JournalRotationManager, TxMessage, WritableTxJournal};
pub use uuid::Uuid;

use predicates::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub const RM: Uuid = Uuid::from_u128(0x5eed);
pub const NODE: Uuid = Uuid::from_u128(1);

/// A temporary directory holding a journal
pub struct Project {
    dir: TempDir,
}

impl Project {
    pub fn empty() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn journal_config(&self) -> JournalConfig {
        JournalConfig::new(self.path())
    }

    pub fn active_journal(&self) -> PathBuf {
        self.journal_config().active_path()
    }

    /// Open the journal, run `f` against it, and stop it again
    pub fn journal(&self, f: impl FnOnce(&WritableTxJournal)) {
        let journal = WritableTxJournal::new(
            self.journal_config(),
            Arc::new(JournalRotationManager::disabled()),
        );
        journal.start().unwrap();
        f(&journal);
        journal.stop().unwrap();
    }

    pub fn file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// `dtx` with no arguments
    pub fn dtx(&self) -> CliBuilder {
        CliBuilder::new()
    }

    /// `dtx journal <sub> --dir <project>`
    pub fn journal_cmd(&self, sub: &str) -> CliBuilder {
        CliBuilder::new()
            .args(&["journal", sub, "--dir"])
            .arg(self.path().to_string_lossy().as_ref())
    }
}

pub fn start(journal: &WritableTxJournal, tx_id: i64) {
    journal
        .write_start(TxMessage::new(tx_id, RM, b"op".to_vec()), [NODE])
        .unwrap();
}

pub struct CliBuilder {
    args: Vec<String>,
}

impl CliBuilder {
    fn new() -> Self {
        Self { args: Vec::new() }
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|a| a.to_string()));
        self
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.args.push(arg.to_string());
        self
    }

    fn run(&self) -> RunAssert {
        #[allow(deprecated)]
        let output = assert_cmd::Command::cargo_bin("dtx")
            .unwrap()
            .args(&self.args)
            .output()
            .unwrap();
        RunAssert { output }
    }

    pub fn passes(self) -> RunAssert {
        let run = self.run();
        assert!(
            run.output.status.success(),
            "expected dtx {:?} to pass\nstdout:\n{}\nstderr:\n{}",
            self.args,
            run.stdout(),
            run.stderr()
        );
        run
    }

    pub fn fails(self) -> RunAssert {
        let run = self.run();
        assert!(
            !run.output.status.success(),
            "expected dtx {:?} to fail\nstdout:\n{}",
            self.args,
            run.stdout()
        );
        run
    }
}

pub struct RunAssert {
    output: std::process::Output,
}

impl RunAssert {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).into_owned()
    }

    pub fn stdout_eq(self, expected: &str) -> Self {
        similar_asserts::assert_eq!(self.stdout(), expected);
        self
    }

    pub fn stdout_has(self, needle: &str) -> Self {
        let stdout = self.stdout();
        assert!(
            predicate::str::contains(needle).eval(stdout.as_str()),
            "stdout does not contain {:?}:\n{}",
            needle,
            stdout
        );
        self
    }

    pub fn stderr_has(self, needle: &str) -> Self {
        let stderr = self.stderr();
        assert!(
            predicate::str::contains(needle).eval(stderr.as_str()),
            "stderr does not contain {:?}:\n{}",
            needle,
            stderr
        );
        self
    }
}
