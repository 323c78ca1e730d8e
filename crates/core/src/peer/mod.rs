// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cluster membership as a transactional resource

mod manager;
mod operation;
mod router;
mod store;

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use uuid::Uuid;

pub use manager::{
    PeerMembershipDeps, PeerMembershipResourceManager, DEFAULT_SELF_REMOVAL_GRACE,
    PEER_MEMBERSHIP_RM_ID,
};
pub use operation::{PeerAction, PeerOperation};
pub use router::{PeerRouter, RoutingTable};
pub use store::{FilePeerStore, MemoryPeerStore, PeerStore, StoreError};

/// A cluster node and where to reach it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Peer {
    pub node_id: Uuid,
    pub address: SocketAddr,
}

impl Peer {
    pub fn new(node_id: Uuid, address: SocketAddr) -> Self {
        Self { node_id, address }
    }
}

impl std::fmt::Display for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.node_id, self.address)
    }
}
