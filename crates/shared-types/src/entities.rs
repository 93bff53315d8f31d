//! # Entities
//!
//! Records owned by the replication table and the block index, plus the
//! health envelope reported by storage daemons. These are plain data:
//! each service owns its own copy of the truth and nothing here holds
//! references into another service's state.

use crate::block::BlockHash;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Seconds since the Unix epoch.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Lifecycle state of a volume.
///
/// Volumes are created `Open`, stop accepting writes once `Closed`, and may
/// be converted to `ErasureCoded` afterwards. There are no other
/// transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeState {
    /// Accepting new blocks.
    #[serde(rename = "open")]
    Open,
    /// Append-frozen, still fully replicated.
    #[serde(rename = "closed")]
    Closed,
    /// Converted to data + parity shards.
    #[serde(rename = "ec")]
    ErasureCoded,
}

impl VolumeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            VolumeState::Open => "open",
            VolumeState::Closed => "closed",
            VolumeState::ErasureCoded => "ec",
        }
    }
}

impl fmt::Display for VolumeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A volume as recorded in the replication table.
///
/// `osd_addresses` is ordered: for replicated volumes it is the read
/// preference order, for erasure-coded volumes position `i` holds shard `i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeInfo {
    pub volume_id: Uuid,
    pub cell_id: String,
    /// Monotonic membership generation, starts at 1.
    pub generation: u64,
    pub state: VolumeState,
    pub osd_addresses: Vec<String>,
}

/// A block index entry: where the bytes for a hash live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEntry {
    pub hash: BlockHash,
    pub cell_id: String,
    pub bucket_id: Uuid,
    pub checksum: BlockHash,
    pub created_at: u64,
}

impl BlockEntry {
    pub fn new(hash: BlockHash, cell_id: impl Into<String>, bucket_id: Uuid) -> Self {
        BlockEntry {
            hash,
            cell_id: cell_id.into(),
            bucket_id,
            // The content hash doubles as the stored checksum.
            checksum: hash,
            created_at: unix_now(),
        }
    }
}

/// A bucket as recorded in the replication table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketInfo {
    pub bucket_id: Uuid,
    pub volume_id: Uuid,
    pub size_bytes: u64,
    /// Sealed buckets are append-frozen.
    pub sealed: bool,
}

/// Result of placing a block into a volume's open bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketAssignment {
    pub bucket_id: Uuid,
    /// Whether this placement sealed a bucket of the volume: the assigned
    /// one by filling it, or its predecessor by rolling over.
    pub sealed: bool,
}

/// Health envelope reported by a storage daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub status: String,
}

impl HealthStatus {
    pub fn healthy() -> Self {
        HealthStatus {
            healthy: true,
            status: "healthy".to_string(),
        }
    }

    pub fn unhealthy(status: impl Into<String>) -> Self {
        HealthStatus {
            healthy: false,
            status: status.into(),
        }
    }
}
