//! # Cell Configuration
//!
//! Cell-wide tunables with production defaults. All sizes are bytes, all
//! windows are [`Duration`]s. Deployment concerns (ports, data paths) live
//! with the runtime, not here.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration shared by every service in a cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellConfig {
    /// Maximum accepted block payload (default: 4 MiB).
    pub max_block_size: usize,
    /// Bucket capacity; a bucket seals once it reaches this (default: 1 GiB).
    pub bucket_size: u64,
    /// Data shards for erasure coding (default: 10).
    pub data_shards: usize,
    /// Parity shards for erasure coding (default: 4).
    pub parity_shards: usize,
    /// Replica count for open volumes (default: 3).
    pub replication_factor: usize,
    /// Sealed buckets a volume accumulates before it is closed (default: 8).
    pub max_buckets_per_volume: usize,
    /// Failure-isolation cell this configuration belongs to.
    pub cell_id: String,
    /// Placement zone within the cell.
    pub zone_id: String,
    /// An OSD silent for longer than this is considered dead (default: 2 min).
    pub heartbeat_timeout: Duration,
    /// Master health-monitor wake interval (default: 30 s).
    pub monitor_interval: Duration,
    /// Per-call deadline for OSD data operations (default: 5 s).
    pub osd_rpc_timeout: Duration,
    /// Per-call deadline for index/table/master operations (default: 2 s).
    pub control_rpc_timeout: Duration,
}

impl Default for CellConfig {
    fn default() -> Self {
        CellConfig {
            max_block_size: 4 * 1024 * 1024,
            bucket_size: 1024 * 1024 * 1024,
            data_shards: 10,
            parity_shards: 4,
            replication_factor: 3,
            max_buckets_per_volume: 8,
            cell_id: "cell1".to_string(),
            zone_id: "zone1".to_string(),
            heartbeat_timeout: Duration::from_secs(120),
            monitor_interval: Duration::from_secs(30),
            osd_rpc_timeout: Duration::from_secs(5),
            control_rpc_timeout: Duration::from_secs(2),
        }
    }
}

impl CellConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, with `CELL_ID` / `ZONE_ID` taken from the environment when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(cell_id) = std::env::var("CELL_ID") {
            if !cell_id.is_empty() {
                config.cell_id = cell_id;
            }
        }
        if let Ok(zone_id) = std::env::var("ZONE_ID") {
            if !zone_id.is_empty() {
                config.zone_id = zone_id;
            }
        }
        config
    }

    pub fn with_cell_id(mut self, cell_id: impl Into<String>) -> Self {
        self.cell_id = cell_id.into();
        self
    }

    pub fn with_max_block_size(mut self, bytes: usize) -> Self {
        self.max_block_size = bytes;
        self
    }

    pub fn with_bucket_size(mut self, bytes: u64) -> Self {
        self.bucket_size = bytes;
        self
    }

    pub fn with_replication_factor(mut self, replicas: usize) -> Self {
        self.replication_factor = replicas;
        self
    }

    pub fn with_shards(mut self, data: usize, parity: usize) -> Self {
        self.data_shards = data;
        self.parity_shards = parity;
        self
    }

    pub fn with_max_buckets_per_volume(mut self, buckets: usize) -> Self {
        self.max_buckets_per_volume = buckets;
        self
    }

    pub fn with_heartbeat_timeout(mut self, window: Duration) -> Self {
        self.heartbeat_timeout = window;
        self
    }

    pub fn with_monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval = interval;
        self
    }

    pub fn with_rpc_timeouts(mut self, osd: Duration, control: Duration) -> Self {
        self.osd_rpc_timeout = osd;
        self.control_rpc_timeout = control;
        self
    }

    /// Total shard count for erasure-coded volumes.
    pub fn total_shards(&self) -> usize {
        self.data_shards + self.parity_shards
    }
}
