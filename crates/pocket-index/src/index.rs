//! KV-backed index implementation.

use crate::api::{BlockIndexApi, IndexError};
use async_trait::async_trait;
use shared_types::{BatchOperation, BlockEntry, BlockHash, KeyValueStore};
use std::sync::Arc;

const ENTRY_PREFIX: &[u8] = b"e:";

fn entry_key(hash: &BlockHash) -> Vec<u8> {
    let mut key = Vec::with_capacity(ENTRY_PREFIX.len() + 32);
    key.extend_from_slice(ENTRY_PREFIX);
    key.extend_from_slice(hash.as_bytes());
    key
}

/// Durable block index over a [`KeyValueStore`].
pub struct BlockIndex {
    kv: Arc<dyn KeyValueStore>,
}

impl BlockIndex {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        BlockIndex { kv }
    }
}

#[async_trait]
impl BlockIndexApi for BlockIndex {
    async fn put_entry(&self, entry: BlockEntry) -> Result<(), IndexError> {
        let key = entry_key(&entry.hash);
        let value = bincode::serialize(&entry)?;
        self.kv
            .atomic_batch_write(vec![BatchOperation::put(key, value)])?;
        tracing::debug!(
            "[index] indexed {} -> (cell {}, bucket {})",
            entry.hash,
            entry.cell_id,
            entry.bucket_id
        );
        Ok(())
    }

    async fn get_entry(&self, hash: &BlockHash) -> Result<Option<BlockEntry>, IndexError> {
        match self.kv.get(&entry_key(hash))? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn exists(&self, hash: &BlockHash) -> Result<bool, IndexError> {
        Ok(self.kv.exists(&entry_key(hash))?)
    }
}
