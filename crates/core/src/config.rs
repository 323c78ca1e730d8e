// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node configuration
//!
//! Loaded from TOML. Every section and field is optional and falls back to
//! its default.

use crate::error::ConfigError;
use crate::peer::DEFAULT_SELF_REMOVAL_GRACE;
use dtx_journal::{JournalConfig, JournalError, JournalRotationManager};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DtxConfig {
    pub journal: JournalConfig,
    pub rotation: RotationConfig,
    pub peers: PeersConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Rotations allowed to run at once; 0 disables background rotation
    pub capacity: usize,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self { capacity: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeersConfig {
    pub local_node_id: Option<Uuid>,
    /// JSON file holding the effective peer list
    pub store_path: PathBuf,
    /// Delay between committing this node's removal and exiting
    #[serde(with = "humantime_serde")]
    pub self_removal_grace: Duration,
}

impl Default for PeersConfig {
    fn default() -> Self {
        Self {
            local_node_id: None,
            store_path: PathBuf::from("peers.json"),
            self_removal_grace: DEFAULT_SELF_REMOVAL_GRACE,
        }
    }
}

impl DtxConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: DtxConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), journal_dir = %config.journal.dir.display(), "config loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.journal.validate().map_err(|e| match e {
            JournalError::Config(msg) => ConfigError::Invalid(msg),
            other => ConfigError::Invalid(other.to_string()),
        })?;
        if self.peers.store_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "peers.store_path must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn rotation_manager(&self) -> Result<JournalRotationManager, JournalError> {
        JournalRotationManager::new(self.rotation.capacity)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
