// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transaction journal entries
//!
//! An entry records one lifecycle event of a distributed transaction.
//! Entries are serialized with serde_json and then wrapped in a
//! [`JournalRecord`](crate::record::JournalRecord); the record layer treats
//! the serialized bytes as opaque.

use crate::error::JournalError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Version tag of the entry encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProtocolVersion {
    #[default]
    V1,
}

/// Message carried by a START entry
///
/// `resource_id` names the resource manager the transaction belongs to;
/// `payload` is that manager's own encoding of the operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxMessage {
    pub tx_id: i64,
    pub resource_id: Uuid,
    pub version: u8,
    pub payload: Vec<u8>,
}

impl TxMessage {
    pub fn new(tx_id: i64, resource_id: Uuid, payload: Vec<u8>) -> Self {
        Self {
            tx_id,
            resource_id,
            version: 1,
            payload,
        }
    }
}

/// Lifecycle event with its operation-specific data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxOperation {
    Start { message: TxMessage },
    Commit,
    Rollback { error_code: Option<i32> },
}

/// Discriminant of [`TxOperation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxOp {
    Start,
    Commit,
    Rollback,
}

impl TxOp {
    /// True for the operations that end a transaction
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxOp::Commit | TxOp::Rollback)
    }
}

impl std::fmt::Display for TxOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TxOp::Start => "START",
            TxOp::Commit => "COMMIT",
            TxOp::Rollback => "ROLLBACK",
        };
        write!(f, "{}", name)
    }
}

/// A single transaction journal entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxJournalEntry {
    /// Milliseconds since Unix epoch
    pub timestamp_ms: i64,
    pub version: ProtocolVersion,
    pub tx_id: i64,
    #[serde(flatten)]
    pub operation: TxOperation,
    pub participants: BTreeSet<Uuid>,
}

impl TxJournalEntry {
    pub fn start(message: TxMessage, participants: BTreeSet<Uuid>) -> Self {
        Self::new(message.tx_id, TxOperation::Start { message }, participants)
    }

    pub fn commit(tx_id: i64, participants: BTreeSet<Uuid>) -> Self {
        Self::new(tx_id, TxOperation::Commit, participants)
    }

    pub fn rollback(tx_id: i64, error_code: Option<i32>, participants: BTreeSet<Uuid>) -> Self {
        Self::new(tx_id, TxOperation::Rollback { error_code }, participants)
    }

    fn new(tx_id: i64, operation: TxOperation, participants: BTreeSet<Uuid>) -> Self {
        Self {
            timestamp_ms: now_millis(),
            version: ProtocolVersion::V1,
            tx_id,
            operation,
            participants,
        }
    }

    pub fn op(&self) -> TxOp {
        match self.operation {
            TxOperation::Start { .. } => TxOp::Start,
            TxOperation::Commit => TxOp::Commit,
            TxOperation::Rollback { .. } => TxOp::Rollback,
        }
    }

    /// The transaction message, for START entries
    pub fn message(&self) -> Option<&TxMessage> {
        match &self.operation {
            TxOperation::Start { message } => Some(message),
            _ => None,
        }
    }

    /// The recorded error code, for ROLLBACK entries
    pub fn error_code(&self) -> Option<i32> {
        match self.operation {
            TxOperation::Rollback { error_code } => error_code,
            _ => None,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, JournalError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, JournalError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
#[path = "entry_tests.rs"]
mod tests;
