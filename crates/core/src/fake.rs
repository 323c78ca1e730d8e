// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake resource manager for testing

use crate::context::DtxResourceManagerContext;
use crate::error::DtxError;
use crate::manager::DtxResourceManager;
use std::sync::Mutex;
use uuid::Uuid;

/// Recorded call to a fake resource manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerCall {
    Start { tx_id: i64, payload: String },
    Prepare { tx_id: i64 },
    Commit { tx_id: i64 },
    Rollback { tx_id: i64 },
    PostSync,
}

/// Scripted result of a fake call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FakeBehavior {
    #[default]
    Succeed,
    /// `prepare` returns `Ok(false)`
    VoteNo,
    IllegalArgument,
    Io,
}

impl FakeBehavior {
    fn check(self, what: &str) -> Result<(), DtxError> {
        match self {
            FakeBehavior::Succeed | FakeBehavior::VoteNo => Ok(()),
            FakeBehavior::IllegalArgument => {
                Err(DtxError::IllegalArgument(format!("{} rejected", what)))
            }
            FakeBehavior::Io => Err(DtxError::Io(std::io::Error::other(format!(
                "{} failed",
                what
            )))),
        }
    }
}

#[derive(Default)]
struct FakeState {
    calls: Vec<ManagerCall>,
    prepare: FakeBehavior,
    commit: FakeBehavior,
    rollback: FakeBehavior,
    post_sync: FakeBehavior,
}

/// Resource manager whose operation is the payload as UTF-8 text
///
/// Non-UTF-8 payloads are rejected as protocol errors.
pub struct FakeResourceManager {
    id: Uuid,
    state: Mutex<FakeState>,
}

impl FakeResourceManager {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            state: Mutex::new(FakeState::default()),
        }
    }

    pub fn calls(&self) -> Vec<ManagerCall> {
        self.lock().calls.clone()
    }

    pub fn set_prepare(&self, behavior: FakeBehavior) {
        self.lock().prepare = behavior;
    }

    pub fn set_commit(&self, behavior: FakeBehavior) {
        self.lock().commit = behavior;
    }

    pub fn set_rollback(&self, behavior: FakeBehavior) {
        self.lock().rollback = behavior;
    }

    pub fn set_post_sync(&self, behavior: FakeBehavior) {
        self.lock().post_sync = behavior;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DtxResourceManager for FakeResourceManager {
    fn id(&self) -> Uuid {
        self.id
    }

    fn start(&self, tx_id: i64, payload: &[u8]) -> Result<DtxResourceManagerContext, DtxError> {
        let text = String::from_utf8(payload.to_vec())
            .map_err(|e| DtxError::Protocol(format!("payload is not UTF-8: {}", e)))?;
        self.lock().calls.push(ManagerCall::Start {
            tx_id,
            payload: text.clone(),
        });
        Ok(DtxResourceManagerContext::new(self.id, tx_id, text))
    }

    fn prepare(&self, ctx: &mut DtxResourceManagerContext) -> Result<bool, DtxError> {
        let behavior = {
            let mut state = self.lock();
            state.calls.push(ManagerCall::Prepare { tx_id: ctx.tx_id() });
            state.prepare
        };
        behavior.check("prepare")?;
        ctx.set_undo(ctx.tx_id());
        Ok(behavior != FakeBehavior::VoteNo)
    }

    fn commit(&self, ctx: &mut DtxResourceManagerContext) -> Result<(), DtxError> {
        let behavior = {
            let mut state = self.lock();
            state.calls.push(ManagerCall::Commit { tx_id: ctx.tx_id() });
            state.commit
        };
        behavior.check("commit")
    }

    fn rollback(&self, ctx: &mut DtxResourceManagerContext) -> Result<(), DtxError> {
        let behavior = {
            let mut state = self.lock();
            state.calls.push(ManagerCall::Rollback { tx_id: ctx.tx_id() });
            state.rollback
        };
        behavior.check("rollback")
    }

    fn process_post_sync(&self) -> Result<(), DtxError> {
        let behavior = {
            let mut state = self.lock();
            state.calls.push(ManagerCall::PostSync);
            state.post_sync
        };
        behavior.check("post-sync")
    }
}
