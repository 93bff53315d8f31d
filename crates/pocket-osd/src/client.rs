//! # OSD Client Cache
//!
//! Frontends, the master, and the volume manager all reach storage daemons
//! by address. Handles are dialed lazily and cached; concurrent requests
//! for the same address collapse into a single connect (single-flight).
//! The cache holds handles, not ownership; the lifecycle of a daemon belongs
//! to its host process.

use crate::api::{ObjectStorageApi, OsdError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Dials a storage daemon by address.
#[async_trait]
pub trait OsdConnector: Send + Sync {
    async fn connect(&self, address: &str) -> Result<Arc<dyn ObjectStorageApi>, OsdError>;
}

type ClientCell = Arc<OnceCell<Arc<dyn ObjectStorageApi>>>;

/// By-address cache of daemon handles with single-flight dialing.
pub struct OsdClientCache {
    connector: Arc<dyn OsdConnector>,
    clients: Mutex<HashMap<String, ClientCell>>,
}

impl OsdClientCache {
    pub fn new(connector: Arc<dyn OsdConnector>) -> Self {
        OsdClientCache {
            connector,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Get the handle for `address`, dialing at most once concurrently.
    ///
    /// A failed dial is not cached; the next caller retries.
    pub async fn get(&self, address: &str) -> Result<Arc<dyn ObjectStorageApi>, OsdError> {
        let cell = {
            let mut clients = self.clients.lock();
            clients
                .entry(address.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        cell.get_or_try_init(|| self.connector.connect(address))
            .await
            .cloned()
    }

    /// Drop the cached handle for `address` (next use re-dials).
    pub fn evict(&self, address: &str) {
        self.clients.lock().remove(address);
    }
}

/// Connector over a fixed registry of in-process daemons.
///
/// The runtime registers every daemon it hosts; tests register their
/// fixtures. Unknown addresses fail like a refused dial.
#[derive(Default)]
pub struct StaticConnector {
    handles: parking_lot::RwLock<HashMap<String, Arc<dyn ObjectStorageApi>>>,
}

impl StaticConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, address: impl Into<String>, handle: Arc<dyn ObjectStorageApi>) {
        self.handles.write().insert(address.into(), handle);
    }
}

#[async_trait]
impl OsdConnector for StaticConnector {
    async fn connect(&self, address: &str) -> Result<Arc<dyn ObjectStorageApi>, OsdError> {
        self.handles
            .read()
            .get(address)
            .cloned()
            .ok_or_else(|| OsdError::Io(format!("no osd reachable at {address}")))
    }
}
