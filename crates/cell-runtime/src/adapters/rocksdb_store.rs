//! # RocksDB Storage Adapter
//!
//! Production implementation of the [`KeyValueStore`] port. One database
//! per owning service: the block index and the replication table each get
//! their own path, so neither can touch the other's keys.
//!
//! Batch writes go through `WriteBatch`, which RocksDB applies atomically
//! through its write-ahead log.

use rocksdb::{Direction, IteratorMode, Options, WriteBatch, WriteOptions, DB};
use shared_types::{BatchOperation, KeyValueStore, KvError};
use std::path::Path;

/// Tuning for one database instance.
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Write buffer size in bytes (default: 64 MiB).
    pub write_buffer_size: usize,
    /// Fsync each write before acknowledging (default: true).
    pub sync_writes: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        RocksDbConfig {
            write_buffer_size: 64 * 1024 * 1024,
            sync_writes: true,
        }
    }
}

impl RocksDbConfig {
    /// Smaller buffers and no sync, for tests.
    pub fn for_testing() -> Self {
        RocksDbConfig {
            write_buffer_size: 4 * 1024 * 1024,
            sync_writes: false,
        }
    }
}

/// A RocksDB-backed key-value store.
pub struct RocksDbStore {
    db: DB,
    write_opts_sync: bool,
}

impl RocksDbStore {
    /// Open (creating if missing) a database at `path`.
    pub fn open(path: impl AsRef<Path>, config: RocksDbConfig) -> Result<Self, KvError> {
        let mut options = Options::default();
        options.create_if_missing(true);
        options.set_write_buffer_size(config.write_buffer_size);

        let db = DB::open(&options, path).map_err(|e| KvError::Io(e.to_string()))?;
        Ok(RocksDbStore {
            db,
            write_opts_sync: config.sync_writes,
        })
    }

    fn write_options(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.write_opts_sync);
        opts
    }
}

impl KeyValueStore for RocksDbStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError> {
        self.db.get(key).map_err(|e| KvError::Io(e.to_string()))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KvError> {
        self.db
            .put_opt(key, value, &self.write_options())
            .map_err(|e| KvError::Io(e.to_string()))
    }

    fn delete(&self, key: &[u8]) -> Result<(), KvError> {
        self.db
            .delete_opt(key, &self.write_options())
            .map_err(|e| KvError::Io(e.to_string()))
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KvError> {
        let mut batch = WriteBatch::default();
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => batch.put(key, value),
                BatchOperation::Delete { key } => batch.delete(key),
            }
        }
        self.db
            .write_opt(batch, &self.write_options())
            .map_err(|e| KvError::Io(e.to_string()))
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KvError> {
        let mut rows = Vec::new();
        let iter = self
            .db
            .iterator(IteratorMode::From(prefix, Direction::Forward));
        for item in iter {
            let (key, value) = item.map_err(|e| KvError::Io(e.to_string()))?;
            if !key.starts_with(prefix) {
                break;
            }
            rows.push((key.into_vec(), value.into_vec()));
        }
        Ok(rows)
    }
}
