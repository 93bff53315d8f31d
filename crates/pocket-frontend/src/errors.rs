//! Client-visible errors of the Put/Get pipeline.

use pocket_index::IndexError;
use pocket_master::MasterError;
use pocket_replication::TableError;
use shared_types::BlockError;
use thiserror::Error;
use uuid::Uuid;

/// Errors from `put`.
#[derive(Debug, Error)]
pub enum PutError {
    #[error(transparent)]
    Block(#[from] BlockError),

    /// Fewer replicas acknowledged than the replication factor requires.
    /// Partial replicas may remain on disk for a later cleanup pass.
    #[error("not enough replicas acknowledged: need {needed}, got {got}")]
    InsufficientReplicas { needed: usize, got: usize },

    /// Every replica is durable, but the block index could not be updated;
    /// the block is unreachable until a retry succeeds.
    #[error("replicas are durable but the index update failed: {0}")]
    IndexWriteFailed(String),

    /// The chosen volume disappeared between selection and placement.
    #[error("volume {0} vanished during placement")]
    VolumeVanished(Uuid),

    #[error("deadline exceeded during {0}")]
    DeadlineExceeded(&'static str),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Master(#[from] MasterError),
}

/// Errors from `get`.
#[derive(Debug, Error)]
pub enum GetError {
    /// The index has no entry for this hash.
    #[error("block {0} not found")]
    NotFound(String),

    /// The index has an entry but no daemon could produce the bytes.
    #[error("block {0} is indexed but unavailable on every osd")]
    BlockUnavailable(String),

    #[error("deadline exceeded during {0}")]
    DeadlineExceeded(&'static str),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Table(#[from] TableError),
}
