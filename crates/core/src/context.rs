// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-transaction state handed between 2PC phases
//!
//! A resource manager decodes its operation once in `start` and stores it
//! in the context. `prepare` records whatever is needed to undo the staged
//! change; `commit` and `rollback` read it back.

use crate::error::DtxError;
use std::any::Any;
use uuid::Uuid;

/// Where a transaction is in the 2PC state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DtxTxState {
    Started,
    Prepared,
    Committed,
    RolledBack,
}

impl DtxTxState {
    pub fn is_finished(&self) -> bool {
        matches!(self, DtxTxState::Committed | DtxTxState::RolledBack)
    }
}

impl std::fmt::Display for DtxTxState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DtxTxState::Started => "started",
            DtxTxState::Prepared => "prepared",
            DtxTxState::Committed => "committed",
            DtxTxState::RolledBack => "rolled back",
        };
        write!(f, "{}", name)
    }
}

pub struct DtxResourceManagerContext {
    resource_manager_id: Uuid,
    tx_id: i64,
    state: DtxTxState,
    operation: Box<dyn Any + Send>,
    undo: Option<Box<dyn Any + Send>>,
}

impl DtxResourceManagerContext {
    pub fn new<T: Any + Send>(resource_manager_id: Uuid, tx_id: i64, operation: T) -> Self {
        Self {
            resource_manager_id,
            tx_id,
            state: DtxTxState::Started,
            operation: Box::new(operation),
            undo: None,
        }
    }

    pub fn resource_manager_id(&self) -> Uuid {
        self.resource_manager_id
    }

    pub fn tx_id(&self) -> i64 {
        self.tx_id
    }

    pub fn state(&self) -> DtxTxState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: DtxTxState) {
        self.state = state;
    }

    /// The decoded operation, which must be of type `T`
    pub fn operation<T: Any>(&self) -> Result<&T, DtxError> {
        self.operation.downcast_ref::<T>().ok_or_else(|| {
            DtxError::IllegalState(format!(
                "transaction {} carries an operation of another resource manager",
                self.tx_id
            ))
        })
    }

    /// Remember how to undo the staged change
    pub fn set_undo<T: Any + Send>(&mut self, undo: T) {
        self.undo = Some(Box::new(undo));
    }

    /// Undo state recorded by `prepare`, if any
    pub fn undo<T: Any>(&self) -> Result<Option<&T>, DtxError> {
        match &self.undo {
            None => Ok(None),
            Some(undo) => undo.downcast_ref::<T>().map(Some).ok_or_else(|| {
                DtxError::IllegalState(format!(
                    "transaction {} carries undo state of another type",
                    self.tx_id
                ))
            }),
        }
    }

    pub fn has_undo(&self) -> bool {
        self.undo.is_some()
    }
}

impl std::fmt::Debug for DtxResourceManagerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DtxResourceManagerContext")
            .field("resource_manager_id", &self.resource_manager_id)
            .field("tx_id", &self.tx_id)
            .field("state", &self.state)
            .field("has_undo", &self.undo.is_some())
            .finish()
    }
}
