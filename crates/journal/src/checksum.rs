// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pluggable integrity functions for journal records
//!
//! The record trailer is always 8 bytes wide. Narrower digests are
//! zero-extended so that the on-disk layout does not depend on the
//! algorithm chosen.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Computes the fixed-width integrity value stored after each record
pub trait Checksum: Send + Sync {
    fn checksum(&self, data: &[u8]) -> u64;
}

/// First eight bytes of a SHA-256 digest, read big-endian
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Checksum;

impl Checksum for Sha256Checksum {
    fn checksum(&self, data: &[u8]) -> u64 {
        let digest = Sha256::digest(data);
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(head)
    }
}

/// CRC32, zero-extended to 64 bits
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc32Checksum;

impl Checksum for Crc32Checksum {
    fn checksum(&self, data: &[u8]) -> u64 {
        u64::from(crc32fast::hash(data))
    }
}

/// Checksum algorithm selectable from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumKind {
    #[default]
    Sha256,
    Crc32,
}

impl ChecksumKind {
    pub fn checksum(&self) -> Arc<dyn Checksum> {
        match self {
            ChecksumKind::Sha256 => Arc::new(Sha256Checksum),
            ChecksumKind::Crc32 => Arc::new(Crc32Checksum),
        }
    }
}

impl std::str::FromStr for ChecksumKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" => Ok(ChecksumKind::Sha256),
            "crc32" => Ok(ChecksumKind::Crc32),
            other => Err(format!("unknown checksum algorithm: {}", other)),
        }
    }
}

impl<C: Checksum + ?Sized> Checksum for Arc<C> {
    fn checksum(&self, data: &[u8]) -> u64 {
        (**self).checksum(data)
    }
}

#[cfg(test)]
#[path = "checksum_tests.rs"]
mod tests;
