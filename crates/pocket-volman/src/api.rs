//! Volume manager operations and errors.

use async_trait::async_trait;
use pocket_erasure::CodecError;
use pocket_osd::OsdError;
use pocket_replication::TableError;
use shared_types::BlockHash;
use thiserror::Error;
use uuid::Uuid;

/// Errors from volume transitions and reconstruction.
#[derive(Debug, Error)]
pub enum VolumeManagerError {
    /// Fewer than `data_shards` shards could be read.
    #[error("not enough shards for block {hash}: have {available}, need {needed}")]
    InsufficientShards {
        hash: String,
        available: usize,
        needed: usize,
    },

    /// Erasure coding needs at least `D + P` target daemons.
    #[error("not enough target osds for erasure coding: need {needed}, have {got}")]
    NotEnoughTargets { needed: usize, got: usize },

    /// Every source daemon failed to produce the block.
    #[error("no source osd could provide block {0}")]
    SourceUnavailable(String),

    /// The block is not in the bucket manifest.
    #[error("block {0} is not recorded in the bucket manifest")]
    UnknownBlock(String),

    /// Reconstructed bytes failed the content-hash check.
    #[error("reconstructed bytes for block {0} do not match its hash")]
    Corrupt(String),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Osd(#[from] OsdError),
}

/// The volume manager service surface.
#[async_trait]
pub trait VolumeManagerApi: Send + Sync {
    /// Copy every block of `bucket_id` from the surviving `source_osds`
    /// onto `target_osd`, verifying each copy by hash after the write.
    async fn copy_volume(
        &self,
        volume_id: Uuid,
        bucket_id: Uuid,
        source_osds: &[String],
        target_osd: &str,
    ) -> Result<(), VolumeManagerError>;

    /// Erasure-encode every block of `bucket_id` onto `target_osds`
    /// (shard `i` to `target_osds[i]`), then commit the volume as
    /// erasure-coded at the next generation. Non-destructive until the
    /// final table commit.
    async fn erasure_encode_volume(
        &self,
        volume_id: Uuid,
        bucket_id: Uuid,
        source_osds: &[String],
        target_osds: &[String],
    ) -> Result<(), VolumeManagerError>;

    /// Rebuild one block from its shards, reading the listed daemons in
    /// parallel and decoding as soon as `data_shards` shards are in hand.
    async fn reconstruct_block(
        &self,
        hash: &BlockHash,
        bucket_id: Uuid,
        volume_id: Uuid,
        osd_addresses: &[String],
    ) -> Result<Vec<u8>, VolumeManagerError>;
}
