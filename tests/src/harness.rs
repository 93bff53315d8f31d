//! In-memory cell assembly for integration tests.
//!
//! Real services end to end: disk-backed daemons on temp dirs, in-memory
//! stores behind the index and the table, with background loops under
//! explicit test control rather than spawned implicitly.

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

/// A cell assembled for one test.
pub struct TestCell {
    dirs: Vec<tempfile::TempDir>,
    pub config: CellConfig,
    pub frontend: Frontend,
    pub master: Arc<Master>,
    pub index: Arc<dyn BlockIndexApi>,
    pub table: Arc<dyn ReplicationTableApi>,
    pub volman: Arc<dyn VolumeManagerApi>,
    pub osds: Vec<Arc<Osd>>,
    pub cache: Arc<OsdClientCache>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl TestCell {
    /// Assemble a cell of `osd_count` daemons, all registered healthy with
    /// the master. No background loops run yet.
    pub async fn new(osd_count: usize, config: CellConfig) -> TestCell {
        let connector = Arc::new(StaticConnector::new());
        let mut dirs = Vec::new();
        let mut osds = Vec::new();
        for i in 0..osd_count {
            let dir = tempfile::tempdir().unwrap();
            let address = format!("osd-{i}:9090");
            let osd =
                Arc::new(Osd::new(&config, &address, &config.cell_id, dir.path()).unwrap());
            connector.register(&address, osd.clone() as Arc<dyn ObjectStorageApi>);
            dirs.push(dir);
            osds.push(osd);
        }
        let cache = Arc::new(OsdClientCache::new(connector));

        let index: Arc<dyn BlockIndexApi> = Arc::new(BlockIndex::new(Arc::new(
            shared_types::InMemoryKvStore::new(),
        )));
        let table: Arc<dyn ReplicationTableApi> = Arc::new(ReplicationTable::new(
            Arc::new(shared_types::InMemoryKvStore::new()),
            config.bucket_size,
        ));
        let volman: Arc<dyn VolumeManagerApi> = Arc::new(
            VolumeManager::new(&config, table.clone(), cache.clone()).unwrap(),
        );
        let master = Master::new(&config, table.clone(), volman.clone());
        for osd in &osds {
            master
                .register_osd(osd.address(), &config.cell_id, 1 << 30)
                .await
                .unwrap();
        }

        let frontend = Frontend::new(
            config.clone(),
            index.clone(),
            table.clone(),
            master.clone(),
            cache.clone(),
            volman.clone(),
        );

        let (shutdown, _) = watch::channel(false);
        TestCell {
            dirs,
            config,
            frontend,
            master,
            index,
            table,
            volman,
            osds,
            cache,
            shutdown,
            tasks: Vec::new(),
        }
    }

    /// Data directory of daemon `i` (for corrupting files behind its back).
    pub fn osd_dir(&self, i: usize) -> PathBuf {
        self.dirs[i].path().to_path_buf()
    }

    /// Start the master's monitor/repair loop.
    pub fn spawn_monitor(&mut self) {
        let task = tokio::spawn(self.master.clone().run(self.shutdown.subscribe()));
        self.tasks.push(task);
    }

    /// Keep daemon `i` heartbeating (itself and to the master) at `every`.
    pub fn spawn_heartbeat(&mut self, i: usize, every: std::time::Duration) {
        let osd = self.osds[i].clone();
        let master = self.master.clone();
        let mut shutdown = self.shutdown.subscribe();
        self.tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        osd.heartbeat();
                        let _ = master.heartbeat(osd.address(), osd.is_healthy(), 1 << 30).await;
                    }
                    _ = shutdown.changed() => break,
                }
            }
        }));
    }

    /// Stop background loops.
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
    }
}

/// Default test configuration: small and fast.
pub fn small_config() -> CellConfig {
    CellConfig::default()
        .with_cell_id("cell-test")
        .with_bucket_size(1024 * 1024)
}
