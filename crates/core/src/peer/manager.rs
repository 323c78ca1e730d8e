// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Membership changes under two-phase commit
//!
//! `prepare` stages the new peer list in the store and remembers the old
//! one. `commit` updates the live routing table, or for the removal of the
//! local node schedules the process to exit after a grace period so the
//! commit acknowledgement can still go out. `rollback` puts the old list
//! back.

use super::operation::{PeerAction, PeerOperation};
use super::router::PeerRouter;
use super::store::PeerStore;
use super::Peer;
use crate::context::DtxResourceManagerContext;
use crate::error::DtxError;
use crate::manager::DtxResourceManager;
use crate::process::ProcessControl;
use crate::scheduler::{ScheduledTask, TaskScheduler};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// Discriminator of membership transactions
pub const PEER_MEMBERSHIP_RM_ID: Uuid = Uuid::from_u128(0x6d2c_1f4e_8a37_4b0e_9c55_3e7a_0d1b_52f8);

pub const DEFAULT_SELF_REMOVAL_GRACE: Duration = Duration::from_secs(120);

/// Collaborators of the membership resource manager
pub struct PeerMembershipDeps {
    pub store: Arc<dyn PeerStore>,
    pub router: Arc<dyn PeerRouter>,
    pub scheduler: Arc<dyn TaskScheduler>,
    pub process: Arc<dyn ProcessControl>,
}

/// What `prepare` changed
#[derive(Debug, Clone)]
struct PeerUndo {
    old_peers: Vec<Peer>,
    /// Peer taken out by a REMOVE
    removed: Option<Peer>,
    /// Self-add: nothing was staged
    noop: bool,
}

pub struct PeerMembershipResourceManager {
    local_node_id: Uuid,
    self_removal_grace: Duration,
    store: Arc<dyn PeerStore>,
    router: Arc<dyn PeerRouter>,
    scheduler: Arc<dyn TaskScheduler>,
    process: Arc<dyn ProcessControl>,
    pending_termination: Mutex<Option<ScheduledTask>>,
}

impl PeerMembershipResourceManager {
    pub fn new(local_node_id: Uuid, deps: PeerMembershipDeps) -> Self {
        Self {
            local_node_id,
            self_removal_grace: DEFAULT_SELF_REMOVAL_GRACE,
            store: deps.store,
            router: deps.router,
            scheduler: deps.scheduler,
            process: deps.process,
            pending_termination: Mutex::new(None),
        }
    }

    pub fn with_self_removal_grace(mut self, grace: Duration) -> Self {
        self.self_removal_grace = grace;
        self
    }

    pub fn local_node_id(&self) -> Uuid {
        self.local_node_id
    }

    /// Scheduled exit after this node was removed, if one is pending
    pub fn pending_termination(&self) -> Option<ScheduledTask> {
        self.pending_lock()
            .as_ref()
            .filter(|task| task.is_pending())
            .cloned()
    }

    /// Cancel a pending self-termination; true if one was cancelled
    pub fn cancel_pending_termination(&self) -> bool {
        self.pending_lock()
            .take()
            .is_some_and(|task| task.cancel())
    }

    fn pending_lock(&self) -> std::sync::MutexGuard<'_, Option<ScheduledTask>> {
        self.pending_termination
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn prepare_add(&self, op: &PeerOperation) -> Result<PeerUndo, DtxError> {
        if op.node_id == self.local_node_id {
            tracing::info!(node_id = %op.node_id, "adding the local node, nothing to stage");
            return Ok(PeerUndo {
                old_peers: Vec::new(),
                removed: None,
                noop: true,
            });
        }
        let peer = op.peer().ok_or_else(|| {
            DtxError::Protocol(format!("ADD of node {} has no address", op.node_id))
        })?;

        let old_peers = self.store.load()?;
        if old_peers.iter().any(|p| p.node_id == peer.node_id) {
            return Err(DtxError::IllegalArgument(format!(
                "node {} is already a peer",
                peer.node_id
            )));
        }

        let mut new_peers = old_peers.clone();
        new_peers.push(peer);
        self.store.store(&new_peers)?;
        Ok(PeerUndo {
            old_peers,
            removed: None,
            noop: false,
        })
    }

    fn prepare_remove(&self, op: &PeerOperation) -> Result<PeerUndo, DtxError> {
        let old_peers = self.store.load()?;
        let removed = old_peers.iter().find(|p| p.node_id == op.node_id).cloned();
        if removed.is_none() && op.node_id != self.local_node_id {
            return Err(DtxError::IllegalArgument(format!(
                "node {} is not a peer",
                op.node_id
            )));
        }

        let new_peers: Vec<Peer> = old_peers
            .iter()
            .filter(|p| p.node_id != op.node_id)
            .cloned()
            .collect();
        self.store.store(&new_peers)?;
        Ok(PeerUndo {
            old_peers,
            removed,
            noop: false,
        })
    }

    fn schedule_self_termination(&self) {
        let mut pending = self.pending_lock();
        if pending.as_ref().is_some_and(|task| task.is_pending()) {
            tracing::debug!("self-termination already scheduled");
            return;
        }

        let process = Arc::clone(&self.process);
        let node_id = self.local_node_id;
        let task = self.scheduler.schedule(
            "self-removal",
            self.self_removal_grace,
            Box::new(move || {
                process.terminate(&format!("node {} was removed from the cluster", node_id));
            }),
        );
        tracing::warn!(
            %node_id,
            grace_secs = self.self_removal_grace.as_secs(),
            "local node removed from cluster, terminating after grace period"
        );
        *pending = Some(task);
    }
}

impl DtxResourceManager for PeerMembershipResourceManager {
    fn id(&self) -> Uuid {
        PEER_MEMBERSHIP_RM_ID
    }

    fn start(&self, tx_id: i64, payload: &[u8]) -> Result<DtxResourceManagerContext, DtxError> {
        let op = PeerOperation::decode(payload)?;
        tracing::debug!(tx_id, action = ?op.action, node_id = %op.node_id, "membership change");
        Ok(DtxResourceManagerContext::new(PEER_MEMBERSHIP_RM_ID, tx_id, op))
    }

    fn prepare(&self, ctx: &mut DtxResourceManagerContext) -> Result<bool, DtxError> {
        let op = ctx.operation::<PeerOperation>()?.clone();
        let undo = match op.action {
            PeerAction::Add => self.prepare_add(&op)?,
            PeerAction::Remove => self.prepare_remove(&op)?,
        };
        ctx.set_undo(undo);
        Ok(true)
    }

    fn commit(&self, ctx: &mut DtxResourceManagerContext) -> Result<(), DtxError> {
        let op = ctx.operation::<PeerOperation>()?;
        let undo = ctx.undo::<PeerUndo>()?.ok_or_else(|| {
            DtxError::IllegalState(format!("transaction {} was not prepared", ctx.tx_id()))
        })?;

        match op.action {
            PeerAction::Add => {
                if undo.noop {
                    return Ok(());
                }
                if let Some(peer) = op.peer() {
                    self.router.register(&peer);
                    tracing::info!(peer = %peer, "peer added");
                }
            }
            PeerAction::Remove => {
                if op.node_id == self.local_node_id {
                    self.schedule_self_termination();
                } else if let Some(removed) = &undo.removed {
                    self.router.unregister(removed.node_id, removed.address);
                    tracing::info!(peer = %removed, "peer removed");
                }
            }
        }
        Ok(())
    }

    fn rollback(&self, ctx: &mut DtxResourceManagerContext) -> Result<(), DtxError> {
        let Some(undo) = ctx.undo::<PeerUndo>()? else {
            // prepare never staged anything
            return Ok(());
        };
        if undo.noop {
            return Ok(());
        }
        self.store.store(&undo.old_peers)?;
        tracing::info!(tx_id = ctx.tx_id(), peers = undo.old_peers.len(), "peer list restored");
        Ok(())
    }

    fn process_post_sync(&self) -> Result<(), DtxError> {
        let peers: Vec<Peer> = self
            .store
            .load()?
            .into_iter()
            .filter(|p| p.node_id != self.local_node_id)
            .collect();

        let mut added = 0;
        for peer in &peers {
            if self.router.register(peer) {
                added += 1;
            }
        }

        let mut removed = 0;
        for route in self.router.routes() {
            if !peers.contains(&route) && self.router.unregister(route.node_id, route.address) {
                removed += 1;
            }
        }

        tracing::info!(peers = peers.len(), added, removed, "routing table reconciled");
        Ok(())
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
