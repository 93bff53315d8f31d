//! Storage adapters owned by the runtime.

mod rocksdb_store;

pub use rocksdb_store::{RocksDbConfig, RocksDbStore};
