//! Replication table operations and errors.

use async_trait::async_trait;
use shared_types::{BlockHash, BucketAssignment, BucketInfo, KvError, VolumeInfo, VolumeState};
use thiserror::Error;
use uuid::Uuid;

/// Errors from replication table operations.
#[derive(Debug, Clone, Error)]
pub enum TableError {
    #[error("volume {0} already exists")]
    Exists(Uuid),

    #[error("volume {0} not found")]
    NotFound(Uuid),

    #[error("volume {0} is not open")]
    NotOpen(Uuid),

    #[error("replication table storage error: {0}")]
    Io(String),
}

impl From<KvError> for TableError {
    fn from(e: KvError) -> Self {
        TableError::Io(e.to_string())
    }
}

impl From<bincode::Error> for TableError {
    fn from(e: bincode::Error) -> Self {
        TableError::Io(e.to_string())
    }
}

/// The replication table service surface.
#[async_trait]
pub trait ReplicationTableApi: Send + Sync {
    /// Record a new volume: generation 1, state OPEN, the given members.
    async fn create_volume(
        &self,
        volume_id: Uuid,
        osd_addresses: Vec<String>,
        cell_id: &str,
    ) -> Result<(), TableError>;

    /// Look up a volume and its ordered member list.
    async fn get_volume(&self, volume_id: Uuid) -> Result<Option<VolumeInfo>, TableError>;

    /// Atomically replace a volume's members, generation, and state.
    ///
    /// The caller supplies the new generation (usually `old + 1` after a
    /// membership change, unchanged for a pure state transition).
    async fn update_volume(
        &self,
        volume_id: Uuid,
        osd_addresses: Vec<String>,
        generation: u64,
        state: VolumeState,
    ) -> Result<(), TableError>;

    /// All volume ids, optionally restricted to one cell.
    async fn list_volumes(&self, cell_id: Option<&str>) -> Result<Vec<Uuid>, TableError>;

    /// Place a block into the volume's open bucket, creating or sealing
    /// buckets as the fill level dictates. Idempotent for a hash already
    /// present in the bucket.
    async fn assign_block(
        &self,
        volume_id: Uuid,
        hash: &BlockHash,
        size: u64,
    ) -> Result<BucketAssignment, TableError>;

    /// All buckets of a volume.
    async fn list_buckets(&self, volume_id: Uuid) -> Result<Vec<BucketInfo>, TableError>;

    /// The block manifest of a bucket: `(hash, payload size)` pairs.
    async fn list_bucket_blocks(
        &self,
        bucket_id: Uuid,
    ) -> Result<Vec<(BlockHash, u64)>, TableError>;

    /// Resolve a bucket to the volume containing it.
    async fn find_volume_for_bucket(&self, bucket_id: Uuid) -> Result<Option<Uuid>, TableError>;
}
