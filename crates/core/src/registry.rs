// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Routing of transaction messages to resource managers

use crate::error::DtxError;
use crate::manager::DtxResourceManager;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Resource managers keyed by their discriminator
#[derive(Default, Clone)]
pub struct ResourceManagerRegistry {
    managers: HashMap<Uuid, Arc<dyn DtxResourceManager>>,
}

impl ResourceManagerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, manager: Arc<dyn DtxResourceManager>) -> Result<(), DtxError> {
        let id = manager.id();
        if self.managers.contains_key(&id) {
            return Err(DtxError::IllegalArgument(format!(
                "resource manager {} is already registered",
                id
            )));
        }
        tracing::debug!(%id, "resource manager registered");
        self.managers.insert(id, manager);
        Ok(())
    }

    pub fn unregister(&mut self, id: Uuid) -> Option<Arc<dyn DtxResourceManager>> {
        self.managers.remove(&id)
    }

    pub fn get(&self, id: Uuid) -> Result<Arc<dyn DtxResourceManager>, DtxError> {
        self.managers
            .get(&id)
            .cloned()
            .ok_or(DtxError::UnknownResourceManager(id))
    }

    /// Registered ids, sorted
    pub fn ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<_> = self.managers.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Registered managers in id order
    pub fn managers(&self) -> Vec<Arc<dyn DtxResourceManager>> {
        self.ids()
            .into_iter()
            .filter_map(|id| self.managers.get(&id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.managers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }
}

impl std::fmt::Debug for ResourceManagerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceManagerRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
