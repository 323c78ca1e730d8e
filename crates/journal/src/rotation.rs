// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background journal rotation
//!
//! Writers never rotate inline. When the active file grows past its
//! threshold the journal hands a request to the [`JournalRotationManager`],
//! which runs it on a small blocking pool. A manager with capacity zero
//! accepts requests and drops them, which keeps rotation under external
//! control.

use crate::error::JournalError;
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Something that can swap its active file for a fresh one
pub trait Rotate: Send + Sync {
    fn rotate(&self) -> Result<RotationOutcome, JournalError>;
}

/// What a rotation request ended up doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationOutcome {
    /// The active file was archived under this path
    Rotated { archived: PathBuf },
    /// Nothing to do: journal stopped or already below threshold
    Skipped,
}

/// Bounded runner for rotation requests
pub struct JournalRotationManager {
    capacity: usize,
    runtime: Option<tokio::runtime::Runtime>,
    in_flight: Arc<(Mutex<usize>, Condvar)>,
}

impl JournalRotationManager {
    /// Create a manager running at most `capacity` rotations at once
    pub fn new(capacity: usize) -> Result<Self, JournalError> {
        let runtime = if capacity == 0 {
            None
        } else {
            Some(
                tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(1)
                    .max_blocking_threads(capacity)
                    .thread_name("journal-rotation")
                    .build()?,
            )
        };
        Ok(Self {
            capacity,
            runtime,
            in_flight: Arc::new((Mutex::new(0), Condvar::new())),
        })
    }

    /// A manager that accepts requests but never rotates
    pub fn disabled() -> Self {
        Self {
            capacity: 0,
            runtime: None,
            in_flight: Arc::new((Mutex::new(0), Condvar::new())),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_enabled(&self) -> bool {
        self.runtime.is_some()
    }

    /// Hand a rotation request to the pool
    ///
    /// Returns false when the request was dropped because rotation is
    /// disabled.
    pub fn submit(&self, target: Arc<dyn Rotate>) -> bool {
        let Some(runtime) = &self.runtime else {
            tracing::debug!("rotation disabled, request dropped");
            return false;
        };

        let tracker = Arc::clone(&self.in_flight);
        {
            let (count, _) = &*tracker;
            *count.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        }

        runtime.spawn_blocking(move || {
            let start = Instant::now();
            match target.rotate() {
                Ok(RotationOutcome::Rotated { archived }) => tracing::info!(
                    archived = %archived.display(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "journal rotated"
                ),
                Ok(RotationOutcome::Skipped) => tracing::debug!("rotation skipped"),
                Err(e) => tracing::error!(error = %e, "journal rotation failed"),
            }

            let (count, done) = &*tracker;
            let mut count = count.lock().unwrap_or_else(|e| e.into_inner());
            *count = count.saturating_sub(1);
            done.notify_all();
        });
        true
    }

    /// Number of accepted requests that have not finished
    pub fn pending(&self) -> usize {
        let (count, _) = &*self.in_flight;
        *count.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Block until every accepted request has finished
    ///
    /// Returns false if `timeout` elapsed first.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let (count, done) = &*self.in_flight;
        let guard = count.lock().unwrap_or_else(|e| e.into_inner());
        let (guard, _) = done
            .wait_timeout_while(guard, timeout, |pending| *pending > 0)
            .unwrap_or_else(|e| e.into_inner());
        *guard == 0
    }
}

impl Drop for JournalRotationManager {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl std::fmt::Debug for JournalRotationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalRotationManager")
            .field("capacity", &self.capacity)
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
#[path = "rotation_tests.rs"]
mod tests;
