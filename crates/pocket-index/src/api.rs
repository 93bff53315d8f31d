//! Block index operations and errors.

use async_trait::async_trait;
use shared_types::{BlockEntry, BlockHash, KvError};
use thiserror::Error;

/// Errors from index operations.
#[derive(Debug, Clone, Error)]
pub enum IndexError {
    #[error("block index storage error: {0}")]
    Io(String),
}

impl From<KvError> for IndexError {
    fn from(e: KvError) -> Self {
        IndexError::Io(e.to_string())
    }
}

impl From<bincode::Error> for IndexError {
    fn from(e: bincode::Error) -> Self {
        IndexError::Io(e.to_string())
    }
}

/// The block index service surface.
#[async_trait]
pub trait BlockIndexApi: Send + Sync {
    /// Insert or replace the entry for `entry.hash` (last writer wins on
    /// the non-key fields).
    async fn put_entry(&self, entry: BlockEntry) -> Result<(), IndexError>;

    /// Look up the entry for a hash.
    async fn get_entry(&self, hash: &BlockHash) -> Result<Option<BlockEntry>, IndexError>;

    /// Whether an entry exists for a hash.
    async fn exists(&self, hash: &BlockHash) -> Result<bool, IndexError>;
}
