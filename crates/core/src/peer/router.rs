// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live routing table

use super::Peer;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::RwLock;
use uuid::Uuid;

/// Where traffic for each peer is sent right now
pub trait PeerRouter: Send + Sync {
    /// Add or update a route; true if it changed
    fn register(&self, peer: &Peer) -> bool;

    /// Drop the route to `node_id` at `address`; true if one was removed
    fn unregister(&self, node_id: Uuid, address: SocketAddr) -> bool;

    /// All routes, ordered by node id
    fn routes(&self) -> Vec<Peer>;
}

#[derive(Debug, Default)]
pub struct RoutingTable {
    routes: RwLock<BTreeMap<Uuid, SocketAddr>>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn address_of(&self, node_id: Uuid) -> Option<SocketAddr> {
        self.routes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&node_id)
            .copied()
    }
}

impl PeerRouter for RoutingTable {
    fn register(&self, peer: &Peer) -> bool {
        let mut routes = self.routes.write().unwrap_or_else(|e| e.into_inner());
        let previous = routes.insert(peer.node_id, peer.address);
        previous != Some(peer.address)
    }

    fn unregister(&self, node_id: Uuid, address: SocketAddr) -> bool {
        let mut routes = self.routes.write().unwrap_or_else(|e| e.into_inner());
        match routes.get(&node_id) {
            Some(current) if *current == address => {
                routes.remove(&node_id);
                true
            }
            Some(current) => {
                tracing::warn!(
                    %node_id,
                    %address,
                    %current,
                    "route points elsewhere, leaving it in place"
                );
                false
            }
            None => false,
        }
    }

    fn routes(&self) -> Vec<Peer> {
        self.routes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(node_id, address)| Peer::new(*node_id, *address))
            .collect()
    }
}
