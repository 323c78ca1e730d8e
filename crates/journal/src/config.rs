// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Journal configuration

use crate::checksum::ChecksumKind;
use crate::error::JournalError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_PREFIX: &str = "txjournal";
pub const DEFAULT_EXTENSION: &str = ".jnl";
pub const DEFAULT_ROTATION_THRESHOLD: u64 = 64 * 1024 * 1024;
pub const DEFAULT_MAX_ROTATED_FILES: usize = 8;

/// Where the journal lives and when it rotates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    /// Directory holding the active file and rotated segments
    pub dir: PathBuf,
    pub prefix: String,
    pub extension: String,
    /// Active file size in bytes above which a rotation is requested
    pub rotation_threshold: u64,
    /// Rotated segments kept on disk; older ones are deleted
    pub max_rotated_files: usize,
    pub checksum: ChecksumKind,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("journal"),
            prefix: DEFAULT_PREFIX.to_string(),
            extension: DEFAULT_EXTENSION.to_string(),
            rotation_threshold: DEFAULT_ROTATION_THRESHOLD,
            max_rotated_files: DEFAULT_MAX_ROTATED_FILES,
            checksum: ChecksumKind::default(),
        }
    }
}

impl JournalConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_rotation_threshold(mut self, bytes: u64) -> Self {
        self.rotation_threshold = bytes;
        self
    }

    pub fn with_max_rotated_files(mut self, count: usize) -> Self {
        self.max_rotated_files = count;
        self
    }

    pub fn with_checksum(mut self, checksum: ChecksumKind) -> Self {
        self.checksum = checksum;
        self
    }

    /// `<prefix><extension>`
    pub fn file_name(&self) -> String {
        format!("{}{}", self.prefix, self.extension)
    }

    /// Path of the active journal file
    pub fn active_path(&self) -> PathBuf {
        self.dir.join(self.file_name())
    }

    /// Path of the advisory lock held while the journal is started
    pub fn lock_path(&self) -> PathBuf {
        self.dir.join(format!("{}.lock", self.prefix))
    }

    /// Rotated segments oldest first, then the active file if present
    pub fn segments(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut paths = crate::journal::list_rotated(self)?;
        let active = self.active_path();
        if active.is_file() {
            paths.push(active);
        }
        Ok(paths)
    }

    /// Path used to prepare the replacement file during rotation
    pub(crate) fn next_path(&self) -> PathBuf {
        self.dir.join(format!("{}.next", self.file_name()))
    }

    /// Path of a rotated segment
    pub(crate) fn rotated_path(&self, millis: i64, seq: u64) -> PathBuf {
        self.dir.join(format!("{}.{}-{}", self.file_name(), millis, seq))
    }

    /// Ordering key `(millis, seq)` if `path` names a rotated segment
    pub(crate) fn rotated_key(&self, path: &Path) -> Option<(i64, u64)> {
        let name = path.file_name()?.to_str()?;
        let suffix = name.strip_prefix(&format!("{}.", self.file_name()))?;
        let (millis, seq) = suffix.split_once('-')?;
        if !millis.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some((millis.parse().ok()?, seq.parse().ok()?))
    }

    pub fn validate(&self) -> Result<(), JournalError> {
        if self.prefix.is_empty() {
            return Err(JournalError::Config("prefix must not be empty".to_string()));
        }
        if self.extension.is_empty() {
            return Err(JournalError::Config("extension must not be empty".to_string()));
        }
        if self.prefix.contains(std::path::MAIN_SEPARATOR) || self.prefix.contains('/') {
            return Err(JournalError::Config(format!(
                "prefix must be a plain file name: {}",
                self.prefix
            )));
        }
        if self.rotation_threshold == 0 {
            return Err(JournalError::Config(
                "rotation_threshold must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
