//! The write path.
//!
//! Ordering is the durability argument: replicas first, index last. Two
//! concurrent puts of the same bytes may both fan out to the daemons;
//! that is safe because daemon writes are idempotent per `(bucket, hash)`
//! and the index upsert converges on the same entry.

use crate::errors::PutError;
use crate::frontend::Frontend;
use pocket_index::BlockIndexApi;
use pocket_master::MasterApi;
use pocket_osd::ObjectStorageApi;
use pocket_replication::ReplicationTableApi;
use shared_types::{Block, BlockEntry, BlockHash};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::timeout;
use uuid::Uuid;

impl Frontend {
    /// Store a block, returning its content hash.
    ///
    /// Succeeds only once *every* replica of the chosen volume has durably
    /// acknowledged the bytes and the block index records the location.
    pub async fn put(&self, data: Vec<u8>) -> Result<BlockHash, PutError> {
        let block = Block::bounded(data, self.config.max_block_size)?;
        let hash = *block.hash();

        // Dedup short-circuit: an indexed hash is already durable.
        let exists = timeout(self.config.control_rpc_timeout, self.index.exists(&hash))
            .await
            .map_err(|_| PutError::DeadlineExceeded("index exists check"))??;
        if exists {
            tracing::debug!("[frontend] dedup hit for {hash}");
            return Ok(hash);
        }

        let volume_id = self.choose_volume().await?;
        let info = self
            .table
            .get_volume(volume_id)
            .await?
            .ok_or(PutError::VolumeVanished(volume_id))?;
        let assignment = self
            .table
            .assign_block(volume_id, &hash, block.size())
            .await?;
        let bucket_id = assignment.bucket_id;

        // Fan out to every member; all of them must ack. The index is made
        // authoritative next, so a quorum is not enough.
        let payload: Arc<Vec<u8>> = Arc::new(block.into_data());
        let mut writes: JoinSet<(String, Result<(), String>)> = JoinSet::new();
        for address in info.osd_addresses.clone() {
            let osds = self.osds.clone();
            let payload = payload.clone();
            let deadline = self.config.osd_rpc_timeout;
            writes.spawn(async move {
                let attempt = timeout(deadline, async {
                    let client = osds.get(&address).await?;
                    client.put_block(&hash, bucket_id, volume_id, &payload).await
                })
                .await;
                let outcome = match attempt {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(_) => Err("deadline exceeded".to_string()),
                };
                (address, outcome)
            });
        }

        let mut acks = 0;
        while let Some(joined) = writes.join_next().await {
            let Ok((address, outcome)) = joined else {
                continue;
            };
            match outcome {
                Ok(()) => acks += 1,
                Err(e) => {
                    tracing::warn!("[frontend] replica write to {address} failed: {e}")
                }
            }
        }

        if acks < self.config.replication_factor {
            return Err(PutError::InsufficientReplicas {
                needed: self.config.replication_factor,
                got: acks,
            });
        }

        // Index last: its success defines the success of the put. If it
        // fails here the bytes are durable but unreachable until a retry.
        let entry = BlockEntry::new(hash, &self.config.cell_id, bucket_id);
        match timeout(self.config.control_rpc_timeout, self.index.put_entry(entry)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(PutError::IndexWriteFailed(e.to_string())),
            Err(_) => {
                return Err(PutError::IndexWriteFailed(
                    "deadline exceeded".to_string(),
                ))
            }
        }

        if assignment.sealed {
            self.maybe_close_volume(volume_id).await;
        }

        tracing::info!(
            "[frontend] stored {hash} in volume {volume_id}, bucket {bucket_id} ({acks} replicas)"
        );
        Ok(hash)
    }

    /// First-fit over the open-volume pool; allocate a fresh volume on the
    /// healthiest daemons when the pool is empty.
    async fn choose_volume(&self) -> Result<Uuid, PutError> {
        let open = timeout(
            self.config.control_rpc_timeout,
            self.master.get_open_volumes(&self.config.cell_id),
        )
        .await
        .map_err(|_| PutError::DeadlineExceeded("open volume query"))??;
        if let Some(volume_id) = open.first() {
            return Ok(*volume_id);
        }

        let healthy = timeout(
            self.config.control_rpc_timeout,
            self.master.get_healthy_osds(),
        )
        .await
        .map_err(|_| PutError::DeadlineExceeded("healthy osd query"))?;
        if healthy.len() < self.config.replication_factor {
            return Err(PutError::InsufficientReplicas {
                needed: self.config.replication_factor,
                got: healthy.len(),
            });
        }

        let volume_id = Uuid::new_v4();
        let members = healthy[..self.config.replication_factor].to_vec();
        self.table
            .create_volume(volume_id, members, &self.config.cell_id)
            .await?;
        tracing::info!("[frontend] allocated volume {volume_id}");
        Ok(volume_id)
    }

    /// After a bucket seals, close the volume once it carries its fill of
    /// sealed buckets. Best-effort housekeeping; the put already succeeded.
    async fn maybe_close_volume(&self, volume_id: Uuid) {
        let sealed = match self.table.list_buckets(volume_id).await {
            Ok(buckets) => buckets.iter().filter(|b| b.sealed).count(),
            Err(e) => {
                tracing::warn!("[frontend] bucket count for {volume_id} failed: {e}");
                return;
            }
        };
        if sealed < self.config.max_buckets_per_volume {
            return;
        }
        if let Err(e) = self.master.close_volume(volume_id).await {
            tracing::warn!("[frontend] closing full volume {volume_id} failed: {e}");
        }
    }
}
