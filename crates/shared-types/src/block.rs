//! # Block Value Objects
//!
//! An immutable, content-addressed byte payload. The hash is the identity:
//! two blocks are equal iff their SHA-256 digests are equal, and a block can
//! only be built through [`Block::new`] / [`Block::bounded`], which compute
//! the digest from the bytes they are given.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from block construction and hash parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockError {
    /// Blocks must carry at least one byte.
    #[error("block data cannot be empty")]
    EmptyData,

    /// Block exceeds the configured maximum size.
    #[error("block of {size} bytes exceeds the maximum of {max_size} bytes")]
    TooLarge { size: usize, max_size: usize },

    /// A hash string that is not 64 lowercase hex characters.
    #[error("invalid block hash: {0:?}")]
    InvalidHash(String),
}

/// SHA-256 content hash, rendered as 64 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockHash([u8; 32]);

impl BlockHash {
    /// Number of characters in the canonical hex rendering.
    pub const HEX_LEN: usize = 64;

    /// Hash the given bytes.
    pub fn digest(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        BlockHash(digest.into())
    }

    /// Wrap a raw 32-byte digest.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        BlockHash(bytes)
    }

    /// Parse the canonical lowercase hex rendering.
    pub fn from_hex(s: &str) -> Result<Self, BlockError> {
        if s.len() != Self::HEX_LEN || s.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(BlockError::InvalidHash(s.to_string()));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| BlockError::InvalidHash(s.to_string()))?;
        Ok(BlockHash(bytes))
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Canonical lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHash({})", self.to_hex())
    }
}

impl FromStr for BlockHash {
    type Err = BlockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for BlockHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for BlockHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        BlockHash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// An immutable block of data together with its content hash.
#[derive(Debug, Clone)]
pub struct Block {
    hash: BlockHash,
    data: Vec<u8>,
}

impl Block {
    /// Create a block from raw bytes, computing its hash.
    ///
    /// Rejects empty payloads; size limits are the caller's concern
    /// (see [`Block::bounded`]).
    pub fn new(data: Vec<u8>) -> Result<Self, BlockError> {
        if data.is_empty() {
            return Err(BlockError::EmptyData);
        }
        let hash = BlockHash::digest(&data);
        Ok(Block { hash, data })
    }

    /// Create a block, additionally enforcing a maximum payload size.
    pub fn bounded(data: Vec<u8>, max_size: usize) -> Result<Self, BlockError> {
        if data.len() > max_size {
            return Err(BlockError::TooLarge {
                size: data.len(),
                max_size,
            });
        }
        Self::new(data)
    }

    /// The content hash.
    pub fn hash(&self) -> &BlockHash {
        &self.hash
    }

    /// The payload bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Payload size in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Recompute the hash and compare it with the stored one.
    pub fn verify(&self) -> bool {
        BlockHash::digest(&self.data) == self.hash
    }

    /// Consume the block, yielding its payload.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for Block {}
