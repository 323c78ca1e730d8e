// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process termination as an injectable effect

use std::sync::{Arc, Mutex};

pub trait ProcessControl: Send + Sync {
    /// End the local process
    fn terminate(&self, reason: &str);
}

/// Exits the process with a fixed status code
#[derive(Debug, Clone, Copy)]
pub struct ExitProcess {
    code: i32,
}

impl ExitProcess {
    pub fn new(code: i32) -> Self {
        Self { code }
    }
}

impl Default for ExitProcess {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ProcessControl for ExitProcess {
    fn terminate(&self, reason: &str) {
        tracing::warn!(reason, code = self.code, "terminating process");
        std::process::exit(self.code);
    }
}

/// Records termination requests instead of exiting
#[derive(Debug, Clone, Default)]
pub struct RecordingProcessControl {
    reasons: Arc<Mutex<Vec<String>>>,
}

impl RecordingProcessControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn terminations(&self) -> Vec<String> {
        self.reasons
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl ProcessControl for RecordingProcessControl {
    fn terminate(&self, reason: &str) {
        self.reasons
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(reason.to_string());
    }
}
