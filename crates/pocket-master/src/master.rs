//! Master service: daemon registry, open-volume pool, monitor loop.

use crate::api::{MasterApi, MasterError};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use pocket_replication::ReplicationTableApi;
use pocket_volman::VolumeManagerApi;
use shared_types::{CellConfig, VolumeState};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use uuid::Uuid;

/// What the master knows about one storage daemon.
#[derive(Debug, Clone)]
pub struct OsdInfo {
    pub address: String,
    pub cell_id: String,
    pub available_space: u64,
    pub last_heartbeat: Instant,
    pub healthy: bool,
}

/// The cell's control plane.
pub struct Master {
    pub(crate) cell_id: String,
    heartbeat_timeout: Duration,
    monitor_interval: Duration,
    osds: RwLock<HashMap<String, OsdInfo>>,
    pub(crate) table: Arc<dyn ReplicationTableApi>,
    pub(crate) volman: Arc<dyn VolumeManagerApi>,
    repair_tx: mpsc::UnboundedSender<String>,
    repair_rx: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
}

impl Master {
    pub fn new(
        config: &CellConfig,
        table: Arc<dyn ReplicationTableApi>,
        volman: Arc<dyn VolumeManagerApi>,
    ) -> Arc<Self> {
        let (repair_tx, repair_rx) = mpsc::unbounded_channel();
        Arc::new(Master {
            cell_id: config.cell_id.clone(),
            heartbeat_timeout: config.heartbeat_timeout,
            monitor_interval: config.monitor_interval,
            osds: RwLock::new(HashMap::new()),
            table,
            volman,
            repair_tx,
            repair_rx: Mutex::new(Some(repair_rx)),
        })
    }

    /// The cell this master controls.
    pub fn cell_id(&self) -> &str {
        &self.cell_id
    }

    /// Snapshot of a daemon's registry entry.
    pub fn osd_info(&self, address: &str) -> Option<OsdInfo> {
        self.osds.read().get(address).cloned()
    }

    /// Lexicographically sorted healthy addresses.
    pub(crate) fn healthy_snapshot(&self) -> Vec<String> {
        let mut healthy: Vec<String> = self
            .osds
            .read()
            .values()
            .filter(|info| info.healthy)
            .map(|info| info.address.clone())
            .collect();
        healthy.sort();
        healthy
    }

    /// One monitor pass: demote daemons whose heartbeat window lapsed and
    /// queue them for repair. Returns the newly-demoted addresses.
    pub fn check_osd_health(&self) -> Vec<String> {
        let mut stale = Vec::new();
        {
            let mut osds = self.osds.write();
            for (address, info) in osds.iter_mut() {
                if info.healthy && info.last_heartbeat.elapsed() > self.heartbeat_timeout {
                    info.healthy = false;
                    stale.push(address.clone());
                }
            }
        }
        for address in &stale {
            tracing::warn!(
                "[master] osd {address} silent for more than {:?}, queueing repair",
                self.heartbeat_timeout
            );
            let _ = self.repair_tx.send(address.clone());
        }
        stale
    }

    /// Run the health monitor and repair worker until `shutdown` flips.
    ///
    /// The monitor wakes every `monitor_interval`; repairs execute on this
    /// task as they are queued, each volume failure logged and skipped.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut repair_rx = self
            .repair_rx
            .lock()
            .take()
            .expect("master monitor started twice");
        let mut ticker = tokio::time::interval(self.monitor_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        tracing::info!(
            "[master] monitor running for cell {} (interval {:?})",
            self.cell_id,
            self.monitor_interval
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_osd_health();
                }
                Some(address) = repair_rx.recv() => {
                    match self.repair_osd(&address).await {
                        Ok(report) => tracing::info!(
                            "[master] repair of {address} done: {} volumes rebuilt, {} failed",
                            report.repaired.len(),
                            report.failed.len()
                        ),
                        Err(e) => tracing::error!("[master] repair of {address} failed: {e}"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("[master] monitor for cell {} stopped", self.cell_id);
    }
}

#[async_trait]
impl MasterApi for Master {
    async fn register_osd(
        &self,
        address: &str,
        cell_id: &str,
        available_space: u64,
    ) -> Result<(), MasterError> {
        let mut osds = self.osds.write();
        osds.insert(
            address.to_string(),
            OsdInfo {
                address: address.to_string(),
                cell_id: cell_id.to_string(),
                available_space,
                last_heartbeat: Instant::now(),
                healthy: true,
            },
        );
        tracing::info!("[master] registered osd {address} in {cell_id}");
        Ok(())
    }

    async fn heartbeat(
        &self,
        address: &str,
        healthy: bool,
        available_space: u64,
    ) -> Result<(), MasterError> {
        let mut osds = self.osds.write();
        match osds.get_mut(address) {
            Some(info) => {
                info.last_heartbeat = Instant::now();
                info.healthy = healthy;
                info.available_space = available_space;
            }
            None => {
                osds.insert(
                    address.to_string(),
                    OsdInfo {
                        address: address.to_string(),
                        cell_id: self.cell_id.clone(),
                        available_space,
                        last_heartbeat: Instant::now(),
                        healthy,
                    },
                );
                tracing::info!("[master] auto-registered osd {address} from heartbeat");
            }
        }
        Ok(())
    }

    async fn get_open_volumes(&self, cell_id: &str) -> Result<Vec<Uuid>, MasterError> {
        // Filter here as well as in the table: an answer for another cell
        // is always empty.
        if cell_id != self.cell_id {
            return Ok(Vec::new());
        }

        let mut open = Vec::new();
        for volume_id in self.table.list_volumes(Some(cell_id)).await? {
            let Some(info) = self.table.get_volume(volume_id).await? else {
                continue;
            };
            if info.state == VolumeState::Open && info.cell_id == cell_id {
                open.push(volume_id);
            }
        }
        Ok(open)
    }

    async fn close_volume(&self, volume_id: Uuid) -> Result<(), MasterError> {
        let info = self
            .table
            .get_volume(volume_id)
            .await?
            .ok_or(MasterError::VolumeNotFound(volume_id))?;
        self.table
            .update_volume(
                volume_id,
                info.osd_addresses,
                info.generation,
                VolumeState::Closed,
            )
            .await?;
        tracing::info!("[master] closed volume {volume_id}");
        Ok(())
    }

    async fn trigger_repair(&self, osd_address: &str) {
        {
            let mut osds = self.osds.write();
            if let Some(info) = osds.get_mut(osd_address) {
                info.healthy = false;
            }
        }
        let _ = self.repair_tx.send(osd_address.to_string());
    }

    async fn get_healthy_osds(&self) -> Vec<String> {
        self.healthy_snapshot()
    }
}
