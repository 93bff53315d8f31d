//! # OSD Service
//!
//! Health bookkeeping around the disk store. Data operations are refused
//! while the daemon considers itself unhealthy; liveness is refreshed by
//! administrative heartbeats and lapses after `heartbeat_timeout` without
//! one.

use crate::api::{ObjectStorageApi, OsdError};
use crate::store::DiskStore;
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{BlockHash, CellConfig, HealthStatus};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

struct Liveness {
    healthy: bool,
    last_heartbeat: Instant,
}

/// An object storage daemon.
pub struct Osd {
    address: String,
    cell_id: String,
    store: DiskStore,
    heartbeat_timeout: Duration,
    liveness: Mutex<Liveness>,
}

impl Osd {
    /// Create a daemon storing under `data_dir`.
    pub fn new(
        config: &CellConfig,
        address: impl Into<String>,
        cell_id: impl Into<String>,
        data_dir: impl Into<PathBuf>,
    ) -> Result<Self, OsdError> {
        Ok(Osd {
            address: address.into(),
            cell_id: cell_id.into(),
            store: DiskStore::open(data_dir)?,
            heartbeat_timeout: config.heartbeat_timeout,
            liveness: Mutex::new(Liveness {
                healthy: true,
                last_heartbeat: Instant::now(),
            }),
        })
    }

    /// The cell this daemon belongs to.
    pub fn cell_id(&self) -> &str {
        &self.cell_id
    }

    /// Administrative heartbeat: refresh liveness without changing the
    /// healthy flag.
    pub fn heartbeat(&self) {
        self.liveness.lock().last_heartbeat = Instant::now();
    }

    /// Administratively set the health flag (also refreshes liveness).
    pub fn set_healthy(&self, healthy: bool) {
        let mut liveness = self.liveness.lock();
        liveness.healthy = healthy;
        liveness.last_heartbeat = Instant::now();
    }

    /// Current health, self-demoting when the heartbeat window lapsed.
    pub fn is_healthy(&self) -> bool {
        let mut liveness = self.liveness.lock();
        if liveness.healthy && liveness.last_heartbeat.elapsed() > self.heartbeat_timeout {
            tracing::warn!(
                "[osd] {} self-demoting: no heartbeat for {:?}",
                self.address,
                liveness.last_heartbeat.elapsed()
            );
            liveness.healthy = false;
        }
        liveness.healthy
    }

    fn ensure_healthy(&self) -> Result<(), OsdError> {
        if self.is_healthy() {
            Ok(())
        } else {
            Err(OsdError::Unhealthy(self.address.clone()))
        }
    }
}

#[async_trait]
impl ObjectStorageApi for Osd {
    async fn put_block(
        &self,
        hash: &BlockHash,
        bucket_id: Uuid,
        volume_id: Uuid,
        data: &[u8],
    ) -> Result<(), OsdError> {
        self.ensure_healthy()?;
        self.store
            .store_block(&self.cell_id, bucket_id, hash, data)
            .await?;
        tracing::debug!(
            "[osd] {} stored block {} ({} bytes) for volume {volume_id}",
            self.address,
            hash,
            data.len()
        );
        Ok(())
    }

    async fn get_block(
        &self,
        hash: &BlockHash,
        bucket_id: Uuid,
        _volume_id: Uuid,
    ) -> Result<Vec<u8>, OsdError> {
        self.ensure_healthy()?;
        self.store.load_block(&self.cell_id, bucket_id, hash).await
    }

    async fn put_shard(
        &self,
        hash: &BlockHash,
        bucket_id: Uuid,
        shard_index: usize,
        data: &[u8],
    ) -> Result<(), OsdError> {
        self.ensure_healthy()?;
        self.store
            .store_shard(&self.cell_id, bucket_id, hash, shard_index, data)
            .await
    }

    async fn get_shard(
        &self,
        hash: &BlockHash,
        bucket_id: Uuid,
        shard_index: usize,
    ) -> Result<Vec<u8>, OsdError> {
        self.ensure_healthy()?;
        self.store
            .load_shard(&self.cell_id, bucket_id, hash, shard_index)
            .await
    }

    async fn health_check(&self) -> HealthStatus {
        if self.is_healthy() {
            HealthStatus::healthy()
        } else {
            HealthStatus::unhealthy("no administrative heartbeat within the liveness window")
        }
    }

    async fn available_space(&self) -> Result<u64, OsdError> {
        self.store.available_space()
    }

    fn address(&self) -> &str {
        &self.address
    }
}
