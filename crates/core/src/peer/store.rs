// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Effective peer configuration

use super::Peer;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid peer file: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("peer store unavailable: {0}")]
    Unavailable(String),
}

/// Durable list of cluster peers
pub trait PeerStore: Send + Sync {
    fn load(&self) -> Result<Vec<Peer>, StoreError>;

    /// Replace the whole list; durable once this returns
    fn store(&self, peers: &[Peer]) -> Result<(), StoreError>;
}

/// Peers kept as a JSON file, replaced atomically on every write
#[derive(Debug, Clone)]
pub struct FilePeerStore {
    path: PathBuf,
}

impl FilePeerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl PeerStore for FilePeerStore {
    fn load(&self) -> Result<Vec<Peer>, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, peers: &[Peer]) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(peers)?;

        // write to temp file then rename
        let temp_path = self.temp_path();
        let mut file = File::create(&temp_path)?;
        file.write_all(&json)?;
        file.sync_all()?;
        fs::rename(&temp_path, &self.path)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = File::open(parent).and_then(|d| d.sync_all()) {
                tracing::debug!(dir = %parent.display(), error = %e, "directory sync failed");
            }
        }
        tracing::debug!(path = %self.path.display(), peers = peers.len(), "peer list stored");
        Ok(())
    }
}

/// In-memory store for tests, with injectable write failures
#[derive(Debug, Clone, Default)]
pub struct MemoryPeerStore {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    peers: Vec<Peer>,
    writes: usize,
    fail_writes: bool,
}

impl MemoryPeerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_peers(peers: impl IntoIterator<Item = Peer>) -> Self {
        let store = Self::new();
        store.lock().peers = peers.into_iter().collect();
        store
    }

    /// Current list, bypassing failure injection
    pub fn peers(&self) -> Vec<Peer> {
        self.lock().peers.clone()
    }

    /// Number of successful `store` calls
    pub fn writes(&self) -> usize {
        self.lock().writes
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PeerStore for MemoryPeerStore {
    fn load(&self) -> Result<Vec<Peer>, StoreError> {
        Ok(self.peers())
    }

    fn store(&self, peers: &[Peer]) -> Result<(), StoreError> {
        let mut state = self.lock();
        if state.fail_writes {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        state.peers = peers.to_vec();
        state.writes += 1;
        Ok(())
    }
}
