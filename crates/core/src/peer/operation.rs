// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Membership change payload

use super::manager::PEER_MEMBERSHIP_RM_ID;
use super::Peer;
use crate::error::DtxError;
use dtx_journal::TxMessage;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PeerAction {
    Add,
    Remove,
}

/// One membership change, carried as JSON in a transaction payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerOperation {
    pub action: PeerAction,
    pub node_id: Uuid,
    /// Required for ADD
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<SocketAddr>,
}

impl PeerOperation {
    pub fn add(peer: &Peer) -> Self {
        Self {
            action: PeerAction::Add,
            node_id: peer.node_id,
            address: Some(peer.address),
        }
    }

    pub fn remove(node_id: Uuid) -> Self {
        Self {
            action: PeerAction::Remove,
            node_id,
            address: None,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, DtxError> {
        serde_json::to_vec(self).map_err(|e| DtxError::Protocol(e.to_string()))
    }

    /// Decode and validate a payload
    pub fn decode(payload: &[u8]) -> Result<Self, DtxError> {
        let op: PeerOperation = serde_json::from_slice(payload)
            .map_err(|e| DtxError::Protocol(format!("malformed peer operation: {}", e)))?;
        if op.action == PeerAction::Add && op.address.is_none() {
            return Err(DtxError::Protocol(format!(
                "ADD of node {} has no address",
                op.node_id
            )));
        }
        Ok(op)
    }

    /// Wrap this operation in a message for the membership resource manager
    pub fn to_message(&self, tx_id: i64) -> Result<TxMessage, DtxError> {
        Ok(TxMessage::new(tx_id, PEER_MEMBERSHIP_RM_ID, self.encode()?))
    }

    /// The peer being added
    pub fn peer(&self) -> Option<Peer> {
        self.address.map(|address| Peer::new(self.node_id, address))
    }
}
