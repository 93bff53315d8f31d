//! # OSD API
//!
//! The operations a storage daemon offers to the rest of the cell. In a
//! deployed cell these calls cross the wire; in-process they are trait
//! calls on a shared handle.

use async_trait::async_trait;
use shared_types::{BlockHash, HealthStatus};
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by storage daemon operations.
#[derive(Debug, Clone, Error)]
pub enum OsdError {
    /// The daemon has self-demoted and refuses data operations.
    #[error("osd {0} is not healthy")]
    Unhealthy(String),

    /// No bytes stored under this key.
    #[error("block {0} not found")]
    NotFound(String),

    /// The key already holds different bytes.
    #[error("conflicting write: key {0} already holds different bytes")]
    Conflict(String),

    /// Stored bytes no longer match their content hash; the copy has been
    /// quarantined.
    #[error("corrupt block {0}: stored bytes do not match the hash")]
    Corrupt(String),

    /// Any lower-level storage failure.
    #[error("osd i/o error: {0}")]
    Io(String),
}

impl From<std::io::Error> for OsdError {
    fn from(e: std::io::Error) -> Self {
        OsdError::Io(e.to_string())
    }
}

/// Storage daemon operations.
#[async_trait]
pub trait ObjectStorageApi: Send + Sync {
    /// Store a block durably under `(bucket_id, hash)`.
    ///
    /// Idempotent: a repeated put of identical bytes is a no-op success; a
    /// put of different bytes under an existing key is a [`OsdError::Conflict`].
    async fn put_block(
        &self,
        hash: &BlockHash,
        bucket_id: Uuid,
        volume_id: Uuid,
        data: &[u8],
    ) -> Result<(), OsdError>;

    /// Read a block back, verifying its content hash first.
    ///
    /// A copy whose bytes no longer match the hash is quarantined and
    /// reported as [`OsdError::Corrupt`].
    async fn get_block(
        &self,
        hash: &BlockHash,
        bucket_id: Uuid,
        volume_id: Uuid,
    ) -> Result<Vec<u8>, OsdError>;

    /// Store erasure shard `shard_index` of a block.
    ///
    /// Shard bytes are codec output, so the content-hash check does not
    /// apply; parity verification at decode time covers their integrity.
    async fn put_shard(
        &self,
        hash: &BlockHash,
        bucket_id: Uuid,
        shard_index: usize,
        data: &[u8],
    ) -> Result<(), OsdError>;

    /// Read erasure shard `shard_index` of a block.
    async fn get_shard(
        &self,
        hash: &BlockHash,
        bucket_id: Uuid,
        shard_index: usize,
    ) -> Result<Vec<u8>, OsdError>;

    /// Current health, applying the heartbeat-window self-demotion.
    async fn health_check(&self) -> HealthStatus;

    /// Free bytes on the data volume.
    async fn available_space(&self) -> Result<u64, OsdError>;

    /// The daemon's advertised address.
    fn address(&self) -> &str;
}
