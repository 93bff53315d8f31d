//! # Erasure Codec
//!
//! Reed-Solomon coding behind a byte-oriented contract: `encode` splits a
//! payload into `D` equal data shards (zero-padded to `ceil(len / D)`) plus
//! `P` parity shards; `decode` rebuilds the payload from any `D` of the
//! `D + P` shards and verifies parity before returning. Callers track the
//! original payload length themselves; decode returns the padded
//! concatenation of the data shards.

use reed_solomon_erasure::galois_8::ReedSolomon;
use thiserror::Error;

/// Errors from codec construction, encoding, and decoding.
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// Invalid shard configuration (zero data shards, too many total, ...).
    #[error("invalid shard configuration: {0}")]
    Config(String),

    /// Decode was given fewer than `data_shards` shards.
    #[error("not enough shards to reconstruct: have {available}, need {needed}")]
    InsufficientShards { available: usize, needed: usize },

    /// Reconstructed shards failed parity verification.
    #[error("shard parity verification failed")]
    VerificationFailed,

    /// Backend coder error (mismatched shard sizes and the like).
    #[error("reed-solomon error: {0}")]
    Backend(String),
}

/// A `D + P` Reed-Solomon codec over byte shards.
pub struct Codec {
    data_shards: usize,
    parity_shards: usize,
    coder: ReedSolomon,
}

impl Codec {
    /// Build a codec for `data_shards` data and `parity_shards` parity shards.
    pub fn new(data_shards: usize, parity_shards: usize) -> Result<Self, CodecError> {
        let coder = ReedSolomon::new(data_shards, parity_shards)
            .map_err(|e| CodecError::Config(format!("{e:?}")))?;
        Ok(Codec {
            data_shards,
            parity_shards,
            coder,
        })
    }

    /// Split `data` into data shards and compute parity.
    ///
    /// Every returned shard has length `ceil(data.len() / D)`; the last data
    /// shard is zero-padded. Empty input is rejected (there is nothing to
    /// shard).
    pub fn encode(&self, data: &[u8]) -> Result<Vec<Vec<u8>>, CodecError> {
        if data.is_empty() {
            return Err(CodecError::Config("cannot encode empty payload".to_string()));
        }

        let shard_size = data.len().div_ceil(self.data_shards);
        let mut shards = Vec::with_capacity(self.total_shards());
        for i in 0..self.data_shards {
            let start = (i * shard_size).min(data.len());
            let end = ((i + 1) * shard_size).min(data.len());
            let mut shard = vec![0u8; shard_size];
            shard[..end - start].copy_from_slice(&data[start..end]);
            shards.push(shard);
        }
        for _ in 0..self.parity_shards {
            shards.push(vec![0u8; shard_size]);
        }

        self.coder
            .encode(&mut shards)
            .map_err(|e| CodecError::Backend(format!("{e:?}")))?;

        Ok(shards)
    }

    /// Rebuild the payload from surviving shards.
    ///
    /// `shards[i]` is shard `i` or `None` if it was lost. Succeeds iff at
    /// least `D` shards are present; missing shards are reconstructed,
    /// parity is verified, and the concatenated data shards are returned
    /// (still padded; truncate to the original length).
    pub fn decode(&self, mut shards: Vec<Option<Vec<u8>>>) -> Result<Vec<u8>, CodecError> {
        shards.resize(self.total_shards(), None);

        let available = shards.iter().filter(|s| s.is_some()).count();
        if available < self.data_shards {
            return Err(CodecError::InsufficientShards {
                available,
                needed: self.data_shards,
            });
        }

        self.coder
            .reconstruct(&mut shards)
            .map_err(|e| CodecError::Backend(format!("{e:?}")))?;

        // Reconstruct filled every slot.
        let full: Vec<Vec<u8>> = shards.into_iter().map(|s| s.unwrap_or_default()).collect();

        let ok = self
            .coder
            .verify(&full)
            .map_err(|e| CodecError::Backend(format!("{e:?}")))?;
        if !ok {
            return Err(CodecError::VerificationFailed);
        }

        let mut data = Vec::with_capacity(self.data_shards * full[0].len());
        for shard in full.iter().take(self.data_shards) {
            data.extend_from_slice(shard);
        }
        Ok(data)
    }

    /// Total shard count (data + parity).
    pub fn total_shards(&self) -> usize {
        self.data_shards + self.parity_shards
    }

    /// Data shard count.
    pub fn data_shard_count(&self) -> usize {
        self.data_shards
    }

    /// Parity shard count.
    pub fn parity_shard_count(&self) -> usize {
        self.parity_shards
    }
}
