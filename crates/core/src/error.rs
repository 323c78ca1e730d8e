// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for distributed transaction participants

use crate::peer::StoreError;
use dtx_journal::JournalError;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// XA-compatible error codes written into ROLLBACK entries
pub mod xa {
    /// Rolled back for an unspecified reason
    pub const XA_RBROLLBACK: i32 = 100;
    /// Resource manager error
    pub const XAER_RMERR: i32 = -3;
    /// Unknown transaction id
    pub const XAER_NOTA: i32 = -4;
    /// Invalid arguments
    pub const XAER_INVAL: i32 = -5;
    /// Routine invoked in an improper context
    pub const XAER_PROTO: i32 = -6;
}

/// How a coordinator should treat a failed 2PC call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtxOutcome {
    /// Malformed input; retrying cannot succeed
    ProtocolError,
    /// A precondition failed; the transaction must roll back
    VoteRollback,
    /// Storage failure; the call may be retried
    RetryableIo,
}

#[derive(Debug, Error)]
pub enum DtxError {
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("illegal argument: {0}")]
    IllegalArgument(String),
    #[error("illegal state: {0}")]
    IllegalState(String),
    #[error("no resource manager registered for {0}")]
    UnknownResourceManager(Uuid),
    #[error("unknown transaction: {0}")]
    UnknownTransaction(i64),
    #[error("journal error: {0}")]
    Journal(#[from] JournalError),
    #[error("peer store error: {0}")]
    Store(#[from] StoreError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DtxError {
    pub fn outcome(&self) -> DtxOutcome {
        match self {
            DtxError::Protocol(_) | DtxError::UnknownResourceManager(_) => DtxOutcome::ProtocolError,
            DtxError::IllegalArgument(_)
            | DtxError::IllegalState(_)
            | DtxError::UnknownTransaction(_) => DtxOutcome::VoteRollback,
            DtxError::Journal(_) | DtxError::Store(_) | DtxError::Io(_) => DtxOutcome::RetryableIo,
        }
    }

    /// Error code recorded when this failure rolls a transaction back
    pub fn xa_code(&self) -> i32 {
        match self {
            DtxError::Protocol(_) => xa::XAER_PROTO,
            DtxError::UnknownResourceManager(_) => xa::XAER_INVAL,
            DtxError::UnknownTransaction(_) => xa::XAER_NOTA,
            DtxError::IllegalArgument(_) | DtxError::IllegalState(_) => xa::XA_RBROLLBACK,
            DtxError::Journal(_) | DtxError::Store(_) | DtxError::Io(_) => xa::XAER_RMERR,
        }
    }
}

/// Errors loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
