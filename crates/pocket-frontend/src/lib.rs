//! # Frontend
//!
//! The client-facing Put/Get surface, and the place where the durability
//! invariants are enforced end to end:
//!
//! - a successful `put` means every replica acknowledged a durable write
//!   *before* the block index was updated; an index entry is a promise
//!   that the bytes are retrievable;
//! - `get` never trusts a single daemon: it walks the volume's members in
//!   table order (or reconstructs from shards for erasure-coded volumes)
//!   until one produces hash-verified bytes.
//!
//! The frontend itself is stateless apart from cached client handles.

pub mod errors;
pub mod frontend;
mod get;
mod put;

pub use errors::{GetError, PutError};
pub use frontend::Frontend;
