//! # Object Storage Daemon
//!
//! The bytes-on-disk service of a cell. An OSD stores each block as a file
//! at `data_dir/cell_id/bucket_id/hash`, fsyncs before acknowledging,
//! verifies content hashes on every read, and self-demotes to unhealthy
//! when the administrative heartbeat goes silent.
//!
//! The OSD knows nothing about volumes: callers (frontend, volume manager)
//! are trusted to name blocks correctly.
//!
//! - `api`: the [`ObjectStorageApi`] trait and [`OsdError`].
//! - `osd`: the [`Osd`] service (health + store glue).
//! - `store`: the on-disk block store with per-key write locking.
//! - `client`: by-address handle cache with single-flight connects.

pub mod api;
pub mod client;
pub mod osd;
pub mod store;

pub use api::{ObjectStorageApi, OsdError};
pub use client::{OsdClientCache, OsdConnector, StaticConnector};
pub use osd::Osd;
pub use store::DiskStore;
