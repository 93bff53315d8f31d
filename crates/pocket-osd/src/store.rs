//! # On-Disk Block Store
//!
//! Blocks live at `data_dir/cell_id/bucket_id/hash`, erasure shards at
//! `data_dir/cell_id/bucket_id/hash.s{index}`. Writes are fsynced before
//! they are acknowledged and serialized per key; reads of full blocks
//! recompute the content hash and quarantine mismatching copies.

use crate::api::OsdError;
use parking_lot::Mutex;
use shared_types::BlockHash;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Suffix appended to a block file when its bytes fail verification.
const QUARANTINE_SUFFIX: &str = "quarantine";

/// Per-key exclusive locks for in-flight writes.
#[derive(Default)]
struct KeyLocks {
    locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyLocks {
    fn for_key(&self, key: &Path) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock();
        locks
            .entry(key.to_path_buf())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

/// Disk-backed block storage for one daemon.
pub struct DiskStore {
    data_dir: PathBuf,
    locks: KeyLocks,
}

impl DiskStore {
    /// Open (and create if needed) a store rooted at `data_dir`.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, OsdError> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;
        Ok(DiskStore {
            data_dir,
            locks: KeyLocks::default(),
        })
    }

    fn block_path(&self, cell_id: &str, bucket_id: Uuid, hash: &BlockHash) -> PathBuf {
        self.data_dir
            .join(cell_id)
            .join(bucket_id.to_string())
            .join(hash.to_hex())
    }

    fn shard_path(
        &self,
        cell_id: &str,
        bucket_id: Uuid,
        hash: &BlockHash,
        shard_index: usize,
    ) -> PathBuf {
        self.data_dir
            .join(cell_id)
            .join(bucket_id.to_string())
            .join(format!("{}.s{shard_index}", hash.to_hex()))
    }

    async fn write_durable(path: &Path, data: &[u8]) -> Result<(), OsdError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::File::create(path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        Ok(())
    }

    /// Store a block, durable before return.
    ///
    /// Re-putting identical bytes is a no-op; different bytes under an
    /// existing key is a conflict.
    pub async fn store_block(
        &self,
        cell_id: &str,
        bucket_id: Uuid,
        hash: &BlockHash,
        data: &[u8],
    ) -> Result<(), OsdError> {
        let path = self.block_path(cell_id, bucket_id, hash);
        let lock = self.locks.for_key(&path);
        let _guard = lock.lock().await;

        match fs::read(&path).await {
            Ok(existing) => {
                if BlockHash::digest(&existing) == *hash && existing.len() == data.len() {
                    return Ok(());
                }
                return Err(OsdError::Conflict(hash.to_hex()));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        Self::write_durable(&path, data).await
    }

    /// Read a block back, verifying its hash.
    pub async fn load_block(
        &self,
        cell_id: &str,
        bucket_id: Uuid,
        hash: &BlockHash,
    ) -> Result<Vec<u8>, OsdError> {
        let path = self.block_path(cell_id, bucket_id, hash);
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(OsdError::NotFound(hash.to_hex()))
            }
            Err(e) => return Err(e.into()),
        };

        if BlockHash::digest(&data) != *hash {
            self.quarantine(&path).await;
            return Err(OsdError::Corrupt(hash.to_hex()));
        }

        Ok(data)
    }

    /// Whether a block is present (no verification).
    pub async fn has_block(&self, cell_id: &str, bucket_id: Uuid, hash: &BlockHash) -> bool {
        fs::try_exists(self.block_path(cell_id, bucket_id, hash))
            .await
            .unwrap_or(false)
    }

    /// Store one erasure shard, durable before return.
    pub async fn store_shard(
        &self,
        cell_id: &str,
        bucket_id: Uuid,
        hash: &BlockHash,
        shard_index: usize,
        data: &[u8],
    ) -> Result<(), OsdError> {
        let path = self.shard_path(cell_id, bucket_id, hash, shard_index);
        let lock = self.locks.for_key(&path);
        let _guard = lock.lock().await;
        Self::write_durable(&path, data).await
    }

    /// Read one erasure shard.
    pub async fn load_shard(
        &self,
        cell_id: &str,
        bucket_id: Uuid,
        hash: &BlockHash,
        shard_index: usize,
    ) -> Result<Vec<u8>, OsdError> {
        let path = self.shard_path(cell_id, bucket_id, hash, shard_index);
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(OsdError::NotFound(format!("{}.s{shard_index}", hash.to_hex())))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Free bytes on the filesystem backing the data directory.
    pub fn available_space(&self) -> Result<u64, OsdError> {
        fs2::available_space(&self.data_dir).map_err(OsdError::from)
    }

    /// Move a failed-verification copy aside so later reads see `NotFound`.
    async fn quarantine(&self, path: &Path) {
        let target = path.with_extension(QUARANTINE_SUFFIX);
        if let Err(e) = fs::rename(path, &target).await {
            tracing::warn!(
                "[osd] failed to quarantine {}: {e}",
                path.display()
            );
        } else {
            tracing::warn!("[osd] quarantined corrupt copy {}", path.display());
        }
    }
}
