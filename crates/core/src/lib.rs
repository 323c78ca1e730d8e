// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dtx-core: distributed transaction participant
//!
//! This crate provides:
//! - The resource manager contract for two-phase commit
//! - A participant that journals every transaction before acting on it
//! - Cluster membership as a resource manager
//! - Schedulers and process control behind traits, with fakes for tests

pub mod config;
pub mod context;
pub mod error;
pub mod fake;
pub mod manager;
pub mod participant;
pub mod peer;
pub mod process;
pub mod registry;
pub mod scheduler;

pub use config::{DtxConfig, PeersConfig, RotationConfig};
pub use context::{DtxResourceManagerContext, DtxTxState};
pub use error::{ConfigError, DtxError, DtxOutcome};
pub use fake::{FakeBehavior, FakeResourceManager, ManagerCall};
pub use manager::DtxResourceManager;
pub use participant::{DtxParticipant, Vote};
pub use peer::{
    FilePeerStore, MemoryPeerStore, Peer, PeerAction, PeerMembershipDeps,
    PeerMembershipResourceManager, PeerOperation, PeerRouter, PeerStore, RoutingTable,
    PEER_MEMBERSHIP_RM_ID,
};
pub use process::{ExitProcess, ProcessControl, RecordingProcessControl};
pub use registry::ResourceManagerRegistry;
pub use scheduler::{FakeScheduler, ScheduledTask, TaskScheduler, TokioScheduler};

// Re-export journal types used across the participant API
pub use dtx_journal::{JournalConfig, JournalError, JournalRotationManager, WritableTxJournal};
