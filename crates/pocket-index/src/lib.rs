//! # Block Index
//!
//! The authoritative mapping from block hash to storage location:
//! `hash → (cell_id, bucket_id, checksum, created_at)`. One logical table,
//! keyed by hash, upsert semantics. The index never holds block bytes, and
//! it is only written after every replica of a block is durable: an entry
//! here is the system's promise that the bytes are retrievable.

pub mod api;
pub mod index;

pub use api::{BlockIndexApi, IndexError};
pub use index::BlockIndex;
