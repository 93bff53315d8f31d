//! The read path.
//!
//! The index names `(cell, bucket)`; the bucket resolves straight to its
//! volume when the table still has it, with a full volume scan of the cell
//! as the fallback. Within a replicated volume, members are tried in table
//! order and any error falls through to the next copy; erasure-coded
//! volumes go through shard reconstruction instead.

use crate::errors::GetError;
use crate::frontend::Frontend;
use pocket_index::BlockIndexApi;
use pocket_osd::ObjectStorageApi;
use pocket_replication::ReplicationTableApi;
use pocket_volman::VolumeManagerApi;
use shared_types::{BlockEntry, BlockHash, VolumeState};
use tokio::time::timeout;
use uuid::Uuid;

impl Frontend {
    /// Fetch the bytes for a hash.
    pub async fn get(&self, hash: &BlockHash) -> Result<Vec<u8>, GetError> {
        let entry = timeout(self.config.control_rpc_timeout, self.index.get_entry(hash))
            .await
            .map_err(|_| GetError::DeadlineExceeded("index lookup"))??
            .ok_or_else(|| GetError::NotFound(hash.to_hex()))?;

        // Fast path: the bucket still maps to its volume.
        let direct = self.table.find_volume_for_bucket(entry.bucket_id).await?;
        if let Some(volume_id) = direct {
            if let Some(data) = self.try_volume(volume_id, &entry).await? {
                return Ok(data);
            }
        }

        // Fallback: walk every volume of the cell.
        for volume_id in self.table.list_volumes(Some(&entry.cell_id)).await? {
            if direct == Some(volume_id) {
                continue;
            }
            if let Some(data) = self.try_volume(volume_id, &entry).await? {
                return Ok(data);
            }
        }

        Err(GetError::BlockUnavailable(hash.to_hex()))
    }

    /// Try to produce the block from one volume; `None` means "keep looking".
    async fn try_volume(
        &self,
        volume_id: Uuid,
        entry: &BlockEntry,
    ) -> Result<Option<Vec<u8>>, GetError> {
        let Some(info) = self.table.get_volume(volume_id).await? else {
            return Ok(None);
        };
        if info.cell_id != entry.cell_id {
            return Ok(None);
        }

        if info.state == VolumeState::ErasureCoded {
            let rebuilt = timeout(
                self.config.osd_rpc_timeout,
                self.volman.reconstruct_block(
                    &entry.hash,
                    entry.bucket_id,
                    volume_id,
                    &info.osd_addresses,
                ),
            )
            .await;
            return match rebuilt {
                Ok(Ok(data)) => Ok(Some(data)),
                Ok(Err(e)) => {
                    tracing::debug!(
                        "[frontend] reconstruct of {} from volume {volume_id} failed: {e}",
                        entry.hash
                    );
                    Ok(None)
                }
                Err(_) => Ok(None),
            };
        }

        for address in &info.osd_addresses {
            let attempt = timeout(self.config.osd_rpc_timeout, async {
                let client = self.osds.get(address).await?;
                client
                    .get_block(&entry.hash, entry.bucket_id, volume_id)
                    .await
            })
            .await;
            match attempt {
                Ok(Ok(data)) => return Ok(Some(data)),
                Ok(Err(e)) => {
                    tracing::debug!(
                        "[frontend] read of {} from {address} failed: {e}",
                        entry.hash
                    );
                }
                Err(_) => {
                    tracing::debug!(
                        "[frontend] read of {} from {address} timed out",
                        entry.hash
                    );
                }
            }
        }
        Ok(None)
    }
}
