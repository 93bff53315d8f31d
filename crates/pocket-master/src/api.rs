//! Master operations and errors.

use async_trait::async_trait;
use pocket_replication::TableError;
use thiserror::Error;
use uuid::Uuid;

/// Errors from control-plane operations.
#[derive(Debug, Error)]
pub enum MasterError {
    #[error("volume {0} not found")]
    VolumeNotFound(Uuid),

    #[error("no healthy osds available for repair")]
    NoHealthyOsds,

    #[error("volume rebuild failed: {0}")]
    Rebuild(String),

    #[error(transparent)]
    Table(#[from] TableError),
}

/// The master service surface.
#[async_trait]
pub trait MasterApi: Send + Sync {
    /// Add or refresh a daemon in the registry; records a heartbeat.
    async fn register_osd(
        &self,
        address: &str,
        cell_id: &str,
        available_space: u64,
    ) -> Result<(), MasterError>;

    /// Process a daemon heartbeat. Unknown daemons are auto-registered.
    async fn heartbeat(
        &self,
        address: &str,
        healthy: bool,
        available_space: u64,
    ) -> Result<(), MasterError>;

    /// Volumes in state OPEN belonging to `cell_id`, read fresh from the
    /// replication table.
    async fn get_open_volumes(&self, cell_id: &str) -> Result<Vec<Uuid>, MasterError>;

    /// Transition a volume to CLOSED (generation unchanged).
    async fn close_volume(&self, volume_id: Uuid) -> Result<(), MasterError>;

    /// Queue a repair for the given daemon; returns once accepted.
    async fn trigger_repair(&self, osd_address: &str);

    /// Addresses of currently-healthy daemons, lexicographically sorted so
    /// placement decisions are deterministic.
    async fn get_healthy_osds(&self) -> Vec<String>;
}
