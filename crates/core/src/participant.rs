// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local side of two-phase commit
//!
//! The participant routes each transaction to its resource manager, keeps
//! the per-transaction context between phases, and journals every
//! lifecycle event. Commit and rollback of the resource manager are best
//! effort: failures are logged and left for `post_sync` to reconcile, the
//! journal entry is still written.

use crate::context::{DtxResourceManagerContext, DtxTxState};
use crate::error::{xa, DtxError, DtxOutcome};
use crate::manager::DtxResourceManager;
use crate::registry::ResourceManagerRegistry;
use dtx_journal::{TxMessage, WritableTxJournal};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Result of the prepare phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Vote {
    Commit,
    Rollback { reason: String, error_code: i32 },
}

impl Vote {
    pub fn is_commit(&self) -> bool {
        matches!(self, Vote::Commit)
    }
}

struct InFlight {
    manager: Arc<dyn DtxResourceManager>,
    ctx: DtxResourceManagerContext,
}

/// `None` marks a transaction whose context is checked out by a call
type Slots = HashMap<i64, Option<InFlight>>;

pub struct DtxParticipant {
    journal: WritableTxJournal,
    registry: ResourceManagerRegistry,
    in_flight: Mutex<Slots>,
}

impl DtxParticipant {
    pub fn new(journal: WritableTxJournal, registry: ResourceManagerRegistry) -> Self {
        Self {
            journal,
            registry,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn journal(&self) -> &WritableTxJournal {
        &self.journal
    }

    pub fn registry(&self) -> &ResourceManagerRegistry {
        &self.registry
    }

    /// Decode the message with its resource manager and journal START
    ///
    /// Nothing is journaled when the payload is rejected.
    pub fn start(
        &self,
        message: TxMessage,
        participants: impl IntoIterator<Item = Uuid>,
    ) -> Result<(), DtxError> {
        let tx_id = message.tx_id;
        let span = tracing::info_span!("dtx.start", tx_id, rm = %message.resource_id);
        let _guard = span.enter();

        let manager = self.registry.get(message.resource_id)?;
        {
            let mut slots = self.slots();
            if slots.contains_key(&tx_id) {
                return Err(DtxError::IllegalState(format!(
                    "transaction {} is already in flight",
                    tx_id
                )));
            }
            slots.insert(tx_id, None);
        }

        match self.start_inner(&manager, message, participants) {
            Ok(ctx) => {
                self.slots().insert(tx_id, Some(InFlight { manager, ctx }));
                tracing::debug!("transaction started");
                Ok(())
            }
            Err(e) => {
                self.slots().remove(&tx_id);
                tracing::warn!(error = %e, "transaction start rejected");
                Err(e)
            }
        }
    }

    fn start_inner(
        &self,
        manager: &Arc<dyn DtxResourceManager>,
        message: TxMessage,
        participants: impl IntoIterator<Item = Uuid>,
    ) -> Result<DtxResourceManagerContext, DtxError> {
        let ctx = manager.start(message.tx_id, &message.payload)?;
        if ctx.tx_id() != message.tx_id {
            return Err(DtxError::Protocol(format!(
                "resource manager returned context for transaction {} instead of {}",
                ctx.tx_id(),
                message.tx_id
            )));
        }
        self.journal.write_start(message, participants)?;
        Ok(ctx)
    }

    /// Ask the resource manager to stage the change
    ///
    /// Rollback-class failures become a rollback vote; storage failures are
    /// returned so the coordinator can retry.
    pub fn prepare(&self, tx_id: i64) -> Result<Vote, DtxError> {
        let span = tracing::info_span!("dtx.prepare", tx_id);
        let _guard = span.enter();

        let mut tx = self.checkout(tx_id)?;
        let entry = tx.entry_mut()?;
        if entry.ctx.state() != DtxTxState::Started {
            return Err(DtxError::IllegalState(format!(
                "cannot prepare transaction {} in state {}",
                tx_id,
                entry.ctx.state()
            )));
        }

        let vote = match entry.manager.prepare(&mut entry.ctx) {
            Ok(true) => {
                entry.ctx.set_state(DtxTxState::Prepared);
                Vote::Commit
            }
            Ok(false) => Vote::Rollback {
                reason: "resource manager voted rollback".to_string(),
                error_code: xa::XA_RBROLLBACK,
            },
            Err(e) if e.outcome() == DtxOutcome::RetryableIo => {
                tracing::error!(error = %e, "prepare failed");
                return Err(e);
            }
            Err(e) => Vote::Rollback {
                reason: e.to_string(),
                error_code: e.xa_code(),
            },
        };
        tracing::info!(vote = ?vote, "prepared");
        Ok(vote)
    }

    /// Journal COMMIT, then apply the staged change
    pub fn commit(
        &self,
        tx_id: i64,
        participants: impl IntoIterator<Item = Uuid>,
    ) -> Result<(), DtxError> {
        let span = tracing::info_span!("dtx.commit", tx_id);
        let _guard = span.enter();

        let mut tx = self.checkout(tx_id)?;
        let entry = tx.entry_mut()?;
        if entry.ctx.state() != DtxTxState::Prepared {
            return Err(DtxError::IllegalState(format!(
                "cannot commit transaction {} in state {}",
                tx_id,
                entry.ctx.state()
            )));
        }

        self.journal.write_commit(tx_id, participants)?;
        if let Err(e) = entry.manager.commit(&mut entry.ctx) {
            tracing::error!(
                error = %e,
                "resource manager commit failed, left for post-sync reconciliation"
            );
        }
        entry.ctx.set_state(DtxTxState::Committed);
        tx.finish();
        tracing::info!("committed");
        Ok(())
    }

    /// Journal ROLLBACK, then restore the state captured by prepare
    pub fn rollback(
        &self,
        tx_id: i64,
        error_code: Option<i32>,
        participants: impl IntoIterator<Item = Uuid>,
    ) -> Result<(), DtxError> {
        let span = tracing::info_span!("dtx.rollback", tx_id);
        let _guard = span.enter();

        let mut tx = self.checkout(tx_id)?;
        let entry = tx.entry_mut()?;
        if entry.ctx.state().is_finished() {
            return Err(DtxError::IllegalState(format!(
                "cannot roll back transaction {} in state {}",
                tx_id,
                entry.ctx.state()
            )));
        }

        self.journal.write_rollback(tx_id, error_code, participants)?;
        if let Err(e) = entry.manager.rollback(&mut entry.ctx) {
            tracing::error!(
                error = %e,
                "resource manager rollback failed, left for post-sync reconciliation"
            );
        }
        entry.ctx.set_state(DtxTxState::RolledBack);
        tx.finish();
        tracing::info!(error_code = ?error_code, "rolled back");
        Ok(())
    }

    /// Run every resource manager's post-sync hook
    ///
    /// Returns the number of managers whose hook failed.
    pub fn post_sync(&self) -> usize {
        let mut failures = 0;
        for manager in self.registry.managers() {
            if let Err(e) = manager.process_post_sync() {
                tracing::warn!(rm = %manager.id(), error = %e, "post-sync failed");
                failures += 1;
            }
        }
        failures
    }

    /// Transactions started but not yet committed or rolled back, sorted
    pub fn in_flight(&self) -> Vec<i64> {
        let mut ids: Vec<_> = self.slots().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// State of an in-flight transaction
    ///
    /// `None` if the transaction is unknown or a call on it is running.
    pub fn state(&self, tx_id: i64) -> Option<DtxTxState> {
        self.slots()
            .get(&tx_id)
            .and_then(|slot| slot.as_ref())
            .map(|entry| entry.ctx.state())
    }

    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Take a transaction's context out of the map for the length of a call
    fn checkout(&self, tx_id: i64) -> Result<Checkout<'_>, DtxError> {
        let mut slots = self.slots();
        match slots.get_mut(&tx_id) {
            None => Err(DtxError::UnknownTransaction(tx_id)),
            Some(slot) => match slot.take() {
                Some(entry) => Ok(Checkout {
                    participant: self,
                    tx_id,
                    entry: Some(entry),
                    finished: false,
                }),
                None => Err(DtxError::IllegalState(format!(
                    "transaction {} is busy",
                    tx_id
                ))),
            },
        }
    }
}

/// Checked-out context; returned to the map on drop unless finished
struct Checkout<'a> {
    participant: &'a DtxParticipant,
    tx_id: i64,
    entry: Option<InFlight>,
    finished: bool,
}

impl Checkout<'_> {
    fn entry_mut(&mut self) -> Result<&mut InFlight, DtxError> {
        self.entry
            .as_mut()
            .ok_or(DtxError::UnknownTransaction(self.tx_id))
    }

    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for Checkout<'_> {
    fn drop(&mut self) {
        let mut slots = self.participant.slots();
        if self.finished {
            slots.remove(&self.tx_id);
        } else {
            slots.insert(self.tx_id, self.entry.take());
        }
    }
}

#[cfg(test)]
#[path = "participant_tests.rs"]
mod tests;
