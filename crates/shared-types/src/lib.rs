//! # Shared Types
//!
//! Value objects, entities, and ports shared across the storage cell:
//!
//! - [`Block`] / [`BlockHash`]: the content-addressed payload and its
//!   SHA-256 identity.
//! - [`VolumeInfo`], [`BlockEntry`], [`BucketInfo`]: the records owned by
//!   the replication table and the block index.
//! - [`CellConfig`]: cell-wide tunables with production defaults.
//! - [`KeyValueStore`]: the outbound persistence port consumed by the
//!   block index and the replication table (in-memory adapter here,
//!   RocksDB adapter in `cell-runtime`).

pub mod block;
pub mod config;
pub mod entities;
pub mod kv;

pub use block::{Block, BlockError, BlockHash};
pub use config::CellConfig;
pub use entities::{
    unix_now, BlockEntry, BucketAssignment, BucketInfo, HealthStatus, VolumeInfo, VolumeState,
};
pub use kv::{BatchOperation, InMemoryKvStore, KeyValueStore, KvError};
