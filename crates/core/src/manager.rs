// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource manager contract for two-phase commit

use crate::context::DtxResourceManagerContext;
use crate::error::DtxError;
use uuid::Uuid;

/// A component that stages, commits, or undoes one kind of side effect
/// under coordinator control
///
/// The coordinator serializes calls for a given transaction. Per
/// transaction the calls follow `start`, then `prepare`, then exactly one
/// of `commit` or `rollback`; `rollback` may also follow `start` directly.
pub trait DtxResourceManager: Send + Sync {
    /// Discriminator routing transaction messages to this manager
    fn id(&self) -> Uuid;

    /// Decode a transaction payload
    ///
    /// Malformed payloads fail with [`DtxError::Protocol`].
    fn start(&self, tx_id: i64, payload: &[u8]) -> Result<DtxResourceManagerContext, DtxError>;

    /// Validate and durably stage the change
    ///
    /// Returns `true` to vote commit. Precondition failures are reported as
    /// `IllegalArgument` or `IllegalState` and count as a rollback vote.
    fn prepare(&self, ctx: &mut DtxResourceManagerContext) -> Result<bool, DtxError>;

    /// Make the staged change visible; must be safe to repeat
    fn commit(&self, ctx: &mut DtxResourceManagerContext) -> Result<(), DtxError>;

    /// Restore the state captured by `prepare`
    fn rollback(&self, ctx: &mut DtxResourceManagerContext) -> Result<(), DtxError>;

    /// Reconcile local state once the journal has caught up
    fn process_post_sync(&self) -> Result<(), DtxError>;
}
