//! KV-backed replication table implementation.
//!
//! Key layout (all binary, prefix + uuid bytes):
//!
//! ```text
//! v:<volume>            -> VolumeRow
//! vo:<volume>:<idx>     -> osd address (idx keeps member order stable)
//! b:<bucket>            -> BucketInfo
//! vb:<volume>:<bucket>  -> ()            (volume -> bucket membership)
//! ob:<volume>           -> bucket uuid   (the volume's unsealed bucket)
//! bb:<bucket>:<hash>    -> payload size  (bucket block manifest)
//! ```

use crate::api::{ReplicationTableApi, TableError};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use shared_types::{
    unix_now, BatchOperation, BlockHash, BucketAssignment, BucketInfo, KeyValueStore, VolumeInfo,
    VolumeState,
};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VolumeRow {
    cell_id: String,
    generation: u64,
    state: VolumeState,
    created_at: u64,
    updated_at: u64,
}

fn volume_key(volume_id: Uuid) -> Vec<u8> {
    [b"v:".as_slice(), volume_id.as_bytes()].concat()
}

fn member_prefix(volume_id: Uuid) -> Vec<u8> {
    [b"vo:".as_slice(), volume_id.as_bytes(), b":"].concat()
}

fn member_key(volume_id: Uuid, index: usize) -> Vec<u8> {
    [member_prefix(volume_id).as_slice(), format!("{index:03}").as_bytes()].concat()
}

fn bucket_key(bucket_id: Uuid) -> Vec<u8> {
    [b"b:".as_slice(), bucket_id.as_bytes()].concat()
}

fn volume_bucket_key(volume_id: Uuid, bucket_id: Uuid) -> Vec<u8> {
    [
        b"vb:".as_slice(),
        volume_id.as_bytes(),
        b":",
        bucket_id.as_bytes(),
    ]
    .concat()
}

fn volume_bucket_prefix(volume_id: Uuid) -> Vec<u8> {
    [b"vb:".as_slice(), volume_id.as_bytes(), b":"].concat()
}

fn open_bucket_key(volume_id: Uuid) -> Vec<u8> {
    [b"ob:".as_slice(), volume_id.as_bytes()].concat()
}

fn manifest_key(bucket_id: Uuid, hash: &BlockHash) -> Vec<u8> {
    [
        b"bb:".as_slice(),
        bucket_id.as_bytes(),
        b":",
        hash.to_hex().as_bytes(),
    ]
    .concat()
}

fn manifest_prefix(bucket_id: Uuid) -> Vec<u8> {
    [b"bb:".as_slice(), bucket_id.as_bytes(), b":"].concat()
}

fn uuid_from_suffix(key: &[u8], prefix_len: usize) -> Option<Uuid> {
    key.get(prefix_len..prefix_len + 16)
        .and_then(|b| Uuid::from_slice(b).ok())
}

/// Durable replication table over a [`KeyValueStore`].
pub struct ReplicationTable {
    kv: Arc<dyn KeyValueStore>,
    /// Bucket capacity; a bucket seals at this fill level.
    bucket_size: u64,
    /// Serializes read-modify-write cycles. Readers go straight to the store.
    writer: Mutex<()>,
}

impl ReplicationTable {
    pub fn new(kv: Arc<dyn KeyValueStore>, bucket_size: u64) -> Self {
        ReplicationTable {
            kv,
            bucket_size,
            writer: Mutex::new(()),
        }
    }

    fn read_row(&self, volume_id: Uuid) -> Result<Option<VolumeRow>, TableError> {
        match self.kv.get(&volume_key(volume_id))? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn read_members(&self, volume_id: Uuid) -> Result<Vec<String>, TableError> {
        let rows = self.kv.prefix_scan(&member_prefix(volume_id))?;
        Ok(rows
            .into_iter()
            .map(|(_, v)| String::from_utf8_lossy(&v).into_owned())
            .collect())
    }

    fn read_bucket(&self, bucket_id: Uuid) -> Result<Option<BucketInfo>, TableError> {
        match self.kv.get(&bucket_key(bucket_id))? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn open_bucket_of(&self, volume_id: Uuid) -> Result<Option<Uuid>, TableError> {
        match self.kv.get(&open_bucket_key(volume_id))? {
            Some(bytes) => Ok(Uuid::from_slice(&bytes).ok()),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ReplicationTableApi for ReplicationTable {
    async fn create_volume(
        &self,
        volume_id: Uuid,
        osd_addresses: Vec<String>,
        cell_id: &str,
    ) -> Result<(), TableError> {
        let _guard = self.writer.lock();

        if self.kv.exists(&volume_key(volume_id))? {
            return Err(TableError::Exists(volume_id));
        }

        let now = unix_now();
        let row = VolumeRow {
            cell_id: cell_id.to_string(),
            generation: 1,
            state: VolumeState::Open,
            created_at: now,
            updated_at: now,
        };

        let mut batch = vec![BatchOperation::put(
            volume_key(volume_id),
            bincode::serialize(&row)?,
        )];
        for (i, addr) in osd_addresses.iter().enumerate() {
            batch.push(BatchOperation::put(
                member_key(volume_id, i),
                addr.as_bytes().to_vec(),
            ));
        }
        self.kv.atomic_batch_write(batch)?;

        tracing::info!(
            "[table] created volume {volume_id} in {cell_id} on {osd_addresses:?}"
        );
        Ok(())
    }

    async fn get_volume(&self, volume_id: Uuid) -> Result<Option<VolumeInfo>, TableError> {
        let Some(row) = self.read_row(volume_id)? else {
            return Ok(None);
        };
        Ok(Some(VolumeInfo {
            volume_id,
            cell_id: row.cell_id,
            generation: row.generation,
            state: row.state,
            osd_addresses: self.read_members(volume_id)?,
        }))
    }

    async fn update_volume(
        &self,
        volume_id: Uuid,
        osd_addresses: Vec<String>,
        generation: u64,
        state: VolumeState,
    ) -> Result<(), TableError> {
        let _guard = self.writer.lock();

        let Some(mut row) = self.read_row(volume_id)? else {
            return Err(TableError::NotFound(volume_id));
        };
        row.generation = generation;
        row.state = state;
        row.updated_at = unix_now();

        let mut batch = vec![BatchOperation::put(
            volume_key(volume_id),
            bincode::serialize(&row)?,
        )];
        // Replace the whole member set; stale rows must not survive.
        for (key, _) in self.kv.prefix_scan(&member_prefix(volume_id))? {
            batch.push(BatchOperation::delete(key));
        }
        for (i, addr) in osd_addresses.iter().enumerate() {
            batch.push(BatchOperation::put(
                member_key(volume_id, i),
                addr.as_bytes().to_vec(),
            ));
        }
        self.kv.atomic_batch_write(batch)?;

        tracing::info!(
            "[table] volume {volume_id} -> gen {generation}, state {state}, members {osd_addresses:?}"
        );
        Ok(())
    }

    async fn list_volumes(&self, cell_id: Option<&str>) -> Result<Vec<Uuid>, TableError> {
        let rows = self.kv.prefix_scan(b"v:")?;
        let mut volumes = Vec::with_capacity(rows.len());
        for (key, value) in rows {
            let Some(volume_id) = uuid_from_suffix(&key, 2) else {
                continue;
            };
            if let Some(cell) = cell_id {
                let row: VolumeRow = bincode::deserialize(&value)?;
                if row.cell_id != cell {
                    continue;
                }
            }
            volumes.push(volume_id);
        }
        Ok(volumes)
    }

    async fn assign_block(
        &self,
        volume_id: Uuid,
        hash: &BlockHash,
        size: u64,
    ) -> Result<BucketAssignment, TableError> {
        let _guard = self.writer.lock();

        let Some(row) = self.read_row(volume_id)? else {
            return Err(TableError::NotFound(volume_id));
        };
        if row.state != VolumeState::Open {
            return Err(TableError::NotOpen(volume_id));
        }

        let mut batch = Vec::new();
        let mut sealed_one = false;

        // Pick the volume's unsealed bucket, or roll over to a fresh one.
        let mut bucket = match self.open_bucket_of(volume_id)? {
            Some(bucket_id) => {
                let info = self
                    .read_bucket(bucket_id)?
                    .ok_or(TableError::Io(format!("bucket {bucket_id} record missing")))?;

                // A duplicate of a hash already in this bucket is a no-op.
                if self.kv.exists(&manifest_key(bucket_id, hash))? {
                    return Ok(BucketAssignment {
                        bucket_id,
                        sealed: false,
                    });
                }

                if info.size_bytes > 0 && info.size_bytes + size > self.bucket_size {
                    // No room: seal it and open a successor for this block.
                    let sealed = BucketInfo {
                        sealed: true,
                        ..info
                    };
                    batch.push(BatchOperation::put(
                        bucket_key(bucket_id),
                        bincode::serialize(&sealed)?,
                    ));
                    sealed_one = true;
                    self.new_bucket(volume_id, &mut batch)?
                } else {
                    info
                }
            }
            None => self.new_bucket(volume_id, &mut batch)?,
        };

        bucket.size_bytes += size;
        bucket.sealed = bucket.size_bytes >= self.bucket_size;
        sealed_one |= bucket.sealed;

        batch.push(BatchOperation::put(
            manifest_key(bucket.bucket_id, hash),
            bincode::serialize(&size)?,
        ));
        batch.push(BatchOperation::put(
            bucket_key(bucket.bucket_id),
            bincode::serialize(&bucket)?,
        ));
        if bucket.sealed {
            batch.push(BatchOperation::delete(open_bucket_key(volume_id)));
        } else {
            batch.push(BatchOperation::put(
                open_bucket_key(volume_id),
                bucket.bucket_id.as_bytes().to_vec(),
            ));
        }
        self.kv.atomic_batch_write(batch)?;

        Ok(BucketAssignment {
            bucket_id: bucket.bucket_id,
            sealed: sealed_one,
        })
    }

    async fn list_buckets(&self, volume_id: Uuid) -> Result<Vec<BucketInfo>, TableError> {
        let prefix = volume_bucket_prefix(volume_id);
        let rows = self.kv.prefix_scan(&prefix)?;
        let mut buckets = Vec::with_capacity(rows.len());
        for (key, _) in rows {
            let Some(bucket_id) = uuid_from_suffix(&key, prefix.len()) else {
                continue;
            };
            if let Some(info) = self.read_bucket(bucket_id)? {
                buckets.push(info);
            }
        }
        Ok(buckets)
    }

    async fn list_bucket_blocks(
        &self,
        bucket_id: Uuid,
    ) -> Result<Vec<(BlockHash, u64)>, TableError> {
        let prefix = manifest_prefix(bucket_id);
        let rows = self.kv.prefix_scan(&prefix)?;
        let mut blocks = Vec::with_capacity(rows.len());
        for (key, value) in rows {
            let Some(hex) = key.get(prefix.len()..) else {
                continue;
            };
            let Ok(hash) = BlockHash::from_hex(&String::from_utf8_lossy(hex)) else {
                continue;
            };
            let size: u64 = bincode::deserialize(&value)?;
            blocks.push((hash, size));
        }
        Ok(blocks)
    }

    async fn find_volume_for_bucket(&self, bucket_id: Uuid) -> Result<Option<Uuid>, TableError> {
        Ok(self.read_bucket(bucket_id)?.map(|b| b.volume_id))
    }
}

impl ReplicationTable {
    /// Stage a fresh unsealed bucket for `volume_id` into `batch`.
    fn new_bucket(
        &self,
        volume_id: Uuid,
        batch: &mut Vec<BatchOperation>,
    ) -> Result<BucketInfo, TableError> {
        let info = BucketInfo {
            bucket_id: Uuid::new_v4(),
            volume_id,
            size_bytes: 0,
            sealed: false,
        };
        batch.push(BatchOperation::put(
            volume_bucket_key(volume_id, info.bucket_id),
            Vec::new(),
        ));
        tracing::debug!("[table] opened bucket {} in volume {volume_id}", info.bucket_id);
        Ok(info)
    }
}
