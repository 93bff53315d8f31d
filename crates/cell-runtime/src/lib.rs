//! # Cell Runtime
//!
//! Production wiring for a storage cell: the RocksDB adapter behind the
//! block index and the replication table, tracing setup, and the assembly
//! of every service (daemons, index, table, master, volume manager,
//! frontend) into one running process with its heartbeat and monitor
//! loops.
//!
//! The services themselves are transport-agnostic; this crate is the host
//! that owns their lifecycles.

pub mod adapters;
pub mod cell;
pub mod telemetry;

pub use adapters::{RocksDbConfig, RocksDbStore};
pub use cell::Cell;
pub use telemetry::init_tracing;
