//! In-process assembly of a full storage cell.

use crate::adapters::{RocksDbConfig, RocksDbStore};
use anyhow::Context;
use pocket_frontend::Frontend;
use pocket_index::{BlockIndex, BlockIndexApi};
use pocket_master::{Master, MasterApi};
use pocket_osd::{ObjectStorageApi, Osd, OsdClientCache, StaticConnector};
use pocket_replication::{ReplicationTable, ReplicationTableApi};
use pocket_volman::{VolumeManager, VolumeManagerApi};
use shared_types::CellConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// A running cell: every service wired together, background loops spawned.
pub struct Cell {
    pub config: CellConfig,
    pub frontend: Arc<Frontend>,
    pub master: Arc<Master>,
    pub index: Arc<dyn BlockIndexApi>,
    pub table: Arc<dyn ReplicationTableApi>,
    pub volman: Arc<dyn VolumeManagerApi>,
    pub osds: Vec<Arc<Osd>>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Cell {
    /// Bring up a cell under `data_dir` with `osd_count` local daemons.
    ///
    /// Layout: `data_dir/index` and `data_dir/table` hold the RocksDB
    /// instances, `data_dir/osd-N` the daemons' block trees.
    pub async fn start(
        config: CellConfig,
        data_dir: impl Into<PathBuf>,
        osd_count: usize,
        db_config: RocksDbConfig,
    ) -> anyhow::Result<Cell> {
        let data_dir = data_dir.into();

        let index_kv = Arc::new(
            RocksDbStore::open(data_dir.join("index"), db_config.clone())
                .context("opening block index database")?,
        );
        let table_kv = Arc::new(
            RocksDbStore::open(data_dir.join("table"), db_config)
                .context("opening replication table database")?,
        );
        let index: Arc<dyn BlockIndexApi> = Arc::new(BlockIndex::new(index_kv));
        let table: Arc<dyn ReplicationTableApi> =
            Arc::new(ReplicationTable::new(table_kv, config.bucket_size));

        let connector = Arc::new(StaticConnector::new());
        let mut osds = Vec::with_capacity(osd_count);
        for i in 0..osd_count {
            let address = format!("osd-{i}.{}:9090", config.cell_id);
            let osd = Arc::new(
                Osd::new(
                    &config,
                    &address,
                    &config.cell_id,
                    data_dir.join(format!("osd-{i}")),
                )
                .context("starting osd")?,
            );
            connector.register(&address, osd.clone() as Arc<dyn ObjectStorageApi>);
            osds.push(osd);
        }
        let cache = Arc::new(OsdClientCache::new(connector));

        let volman: Arc<dyn VolumeManagerApi> = Arc::new(
            VolumeManager::new(&config, table.clone(), cache.clone())
                .context("building volume manager")?,
        );
        let master = Master::new(&config, table.clone(), volman.clone());
        let frontend = Arc::new(Frontend::new(
            config.clone(),
            index.clone(),
            table.clone(),
            master.clone(),
            cache,
            volman.clone(),
        ));

        let (shutdown, _) = watch::channel(false);
        let mut tasks = Vec::new();

        // Register the local daemons up front, then keep them heartbeating.
        for osd in &osds {
            let space = osd.available_space().await.unwrap_or(0);
            master
                .register_osd(osd.address(), &config.cell_id, space)
                .await
                .ok();
            tasks.push(tokio::spawn(heartbeat_loop(
                osd.clone(),
                master.clone(),
                config.monitor_interval / 3,
                shutdown.subscribe(),
            )));
        }
        tasks.push(tokio::spawn(master.clone().run(shutdown.subscribe())));

        tracing::info!(
            "[runtime] cell {} up: {osd_count} osds under {}",
            config.cell_id,
            data_dir.display()
        );

        Ok(Cell {
            config,
            frontend,
            master,
            index,
            table,
            volman,
            osds,
            shutdown,
            tasks,
        })
    }

    /// Stop background loops and wait for them to drain.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
        tracing::info!("[runtime] cell {} stopped", self.config.cell_id);
    }
}

/// Refresh one daemon's liveness and report it to the master.
async fn heartbeat_loop(
    osd: Arc<Osd>,
    master: Arc<Master>,
    interval: std::time::Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                osd.heartbeat();
                let space = osd.available_space().await.unwrap_or(0);
                let _ = master
                    .heartbeat(osd.address(), osd.is_healthy(), space)
                    .await;
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
