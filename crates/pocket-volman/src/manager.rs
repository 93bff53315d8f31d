//! Volume manager implementation.

use crate::api::{VolumeManagerApi, VolumeManagerError};
use async_trait::async_trait;
use pocket_erasure::Codec;
use pocket_osd::{ObjectStorageApi, OsdClientCache};
use pocket_replication::{ReplicationTableApi, TableError};
use shared_types::{BlockHash, CellConfig, VolumeState};
use std::sync::Arc;
use tokio::task::JoinSet;
use uuid::Uuid;

/// Executes volume copies, erasure encoding, and block reconstruction.
pub struct VolumeManager {
    codec: Codec,
    table: Arc<dyn ReplicationTableApi>,
    osds: Arc<OsdClientCache>,
}

impl VolumeManager {
    pub fn new(
        config: &CellConfig,
        table: Arc<dyn ReplicationTableApi>,
        osds: Arc<OsdClientCache>,
    ) -> Result<Self, VolumeManagerError> {
        Ok(VolumeManager {
            codec: Codec::new(config.data_shards, config.parity_shards)?,
            table,
            osds,
        })
    }

    /// Read one block from the first source daemon that can produce it.
    async fn read_from_any(
        &self,
        hash: &BlockHash,
        bucket_id: Uuid,
        volume_id: Uuid,
        source_osds: &[String],
    ) -> Result<Vec<u8>, VolumeManagerError> {
        for addr in source_osds {
            let client = match self.osds.get(addr).await {
                Ok(client) => client,
                Err(e) => {
                    tracing::debug!("[volman] source {addr} unreachable: {e}");
                    continue;
                }
            };
            match client.get_block(hash, bucket_id, volume_id).await {
                Ok(data) => return Ok(data),
                Err(e) => tracing::debug!("[volman] source {addr} failed for {hash}: {e}"),
            }
        }
        Err(VolumeManagerError::SourceUnavailable(hash.to_hex()))
    }
}

#[async_trait]
impl VolumeManagerApi for VolumeManager {
    async fn copy_volume(
        &self,
        volume_id: Uuid,
        bucket_id: Uuid,
        source_osds: &[String],
        target_osd: &str,
    ) -> Result<(), VolumeManagerError> {
        let blocks = self.table.list_bucket_blocks(bucket_id).await?;
        let target = self.osds.get(target_osd).await?;

        for (hash, _size) in &blocks {
            let data = self
                .read_from_any(hash, bucket_id, volume_id, source_osds)
                .await?;
            target.put_block(hash, bucket_id, volume_id, &data).await?;
            // Post-write verification: the read path recomputes the hash.
            target.get_block(hash, bucket_id, volume_id).await?;
        }

        tracing::info!(
            "[volman] copied {} blocks of bucket {bucket_id} (volume {volume_id}) to {target_osd}",
            blocks.len()
        );
        Ok(())
    }

    async fn erasure_encode_volume(
        &self,
        volume_id: Uuid,
        bucket_id: Uuid,
        source_osds: &[String],
        target_osds: &[String],
    ) -> Result<(), VolumeManagerError> {
        let needed = self.codec.total_shards();
        if target_osds.len() < needed {
            return Err(VolumeManagerError::NotEnoughTargets {
                needed,
                got: target_osds.len(),
            });
        }

        let blocks = self.table.list_bucket_blocks(bucket_id).await?;
        for (hash, _size) in &blocks {
            let data = self
                .read_from_any(hash, bucket_id, volume_id, source_osds)
                .await?;
            let shards = self.codec.encode(&data)?;
            for (i, shard) in shards.iter().enumerate() {
                let client = self.osds.get(&target_osds[i]).await?;
                client.put_shard(hash, bucket_id, i, shard).await?;
            }
        }

        // The whole bucket is sharded; commit the new membership in one
        // table write. Until this point the replicated volume is untouched.
        let info = self
            .table
            .get_volume(volume_id)
            .await?
            .ok_or(TableError::NotFound(volume_id))?;
        self.table
            .update_volume(
                volume_id,
                target_osds[..needed].to_vec(),
                info.generation + 1,
                VolumeState::ErasureCoded,
            )
            .await?;

        tracing::info!(
            "[volman] volume {volume_id} erasure-coded: {} blocks over {needed} shards",
            blocks.len()
        );
        Ok(())
    }

    async fn reconstruct_block(
        &self,
        hash: &BlockHash,
        bucket_id: Uuid,
        volume_id: Uuid,
        osd_addresses: &[String],
    ) -> Result<Vec<u8>, VolumeManagerError> {
        let needed = self.codec.data_shard_count();
        let total = self.codec.total_shards();

        let original_size = self
            .table
            .list_bucket_blocks(bucket_id)
            .await?
            .into_iter()
            .find(|(h, _)| h == hash)
            .map(|(_, size)| size)
            .ok_or_else(|| VolumeManagerError::UnknownBlock(hash.to_hex()))?;

        let mut reads: JoinSet<(usize, Option<Vec<u8>>)> = JoinSet::new();
        for (i, addr) in osd_addresses.iter().take(total).enumerate() {
            let osds = self.osds.clone();
            let addr = addr.clone();
            let hash = *hash;
            reads.spawn(async move {
                let shard = match osds.get(&addr).await {
                    Ok(client) => client.get_shard(&hash, bucket_id, i).await.ok(),
                    Err(_) => None,
                };
                (i, shard)
            });
        }

        let mut shards: Vec<Option<Vec<u8>>> = vec![None; total];
        let mut available = 0;
        while let Some(joined) = reads.join_next().await {
            let Ok((i, shard)) = joined else { continue };
            if let Some(bytes) = shard {
                shards[i] = Some(bytes);
                available += 1;
                // Decode threshold reached; leave the stragglers behind.
                if available >= needed {
                    break;
                }
            }
        }
        reads.abort_all();

        if available < needed {
            return Err(VolumeManagerError::InsufficientShards {
                hash: hash.to_hex(),
                available,
                needed,
            });
        }

        let mut data = self.codec.decode(shards)?;
        data.truncate(original_size as usize);

        if BlockHash::digest(&data) != *hash {
            return Err(VolumeManagerError::Corrupt(hash.to_hex()));
        }
        Ok(data)
    }
}
