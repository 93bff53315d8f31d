//! # Pocket Test Suite
//!
//! Cross-component integration scenarios for the storage cell, driven
//! through the public service surfaces:
//!
//! ```text
//! tests/src/
//! ├── harness.rs        # in-memory cell assembly for tests
//! └── integration/
//!     ├── pipeline.rs   # put/get round trips, dedup, replication floor
//!     ├── corruption.rs # on-disk rot detection and failover
//!     ├── erasure.rs    # closed-volume encoding and shard-loss reads
//!     ├── lifecycle.rs  # bucket sealing and volume close
//!     └── repair.rs     # failure detection and volume rebuild
//! ```
//!
//! Run with `cargo test -p pocket-tests`.

pub mod harness;

#[cfg(test)]
mod integration;
