//! # Volume Manager
//!
//! Executes volume transitions:
//!
//! - **copy**: rebuild a replica of a bucket on a replacement OSD from the
//!   surviving members;
//! - **erasure-encode**: convert a closed, replicated volume into data +
//!   parity shards spread over `D + P` daemons;
//! - **reconstruct**: rebuild one block from any `D` of its shards.
//!
//! Transitions are non-destructive: the replicated volume stays
//! authoritative until the replication table is updated in one commit at
//! the end of a successful encode.

pub mod api;
pub mod manager;

pub use api::{VolumeManagerApi, VolumeManagerError};
pub use manager::VolumeManager;
