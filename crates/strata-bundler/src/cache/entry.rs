//! Cached chunk records.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::key::CacheKey;
use crate::hash::ChunkIdentity;

/// Current cache format version. Increment when the record layout changes.
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// A cached entry failed its integrity check. Recoverable: the entry is
/// evicted and the chunk recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cache entry {key} is corrupted: {reason}")]
pub struct CacheCorruptionError {
    pub key: CacheKey,
    pub reason: String,
}

/// Serialized chunk output and identity from an earlier build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedChunk {
    pub format_version: u32,
    /// Hex key the record was stored under.
    pub key: String,
    pub identity: ChunkIdentity,
    pub bytes: Vec<u8>,
    /// blake3 of `bytes`.
    pub checksum: [u8; 32],
}

impl CachedChunk {
    pub fn new(key: &CacheKey, identity: ChunkIdentity, bytes: Vec<u8>) -> Self {
        let checksum = *blake3::hash(&bytes).as_bytes();
        Self {
            format_version: CACHE_FORMAT_VERSION,
            key: key.as_hex().to_string(),
            identity,
            bytes,
            checksum,
        }
    }

    /// Check that this record belongs to `key` and its bytes are intact.
    pub fn verify(&self, key: &CacheKey) -> Result<(), CacheCorruptionError> {
        let corrupted = |reason: String| CacheCorruptionError {
            key: key.clone(),
            reason,
        };

        if self.format_version != CACHE_FORMAT_VERSION {
            return Err(corrupted(format!(
                "format version {} (expected {CACHE_FORMAT_VERSION})",
                self.format_version
            )));
        }
        if self.key != key.as_hex() {
            return Err(corrupted(format!("stored under key {}", self.key)));
        }
        if blake3::hash(&self.bytes).as_bytes() != &self.checksum {
            return Err(corrupted("checksum mismatch".to_string()));
        }
        Ok(())
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> CacheKey {
        CacheKey::from_hex("ab".repeat(32))
    }

    #[test]
    fn test_fresh_entry_verifies() {
        let entry = CachedChunk::new(&key(), ChunkIdentity::from_bytes([1; 32]), b"chunk".to_vec());
        assert!(entry.verify(&key()).is_ok());
        assert_eq!(entry.size(), 5);
    }

    #[test]
    fn test_tampered_bytes_fail_verification() {
        let mut entry = CachedChunk::new(&key(), ChunkIdentity::from_bytes([1; 32]), b"chunk".to_vec());
        entry.bytes[0] = b'C';
        let err = entry.verify(&key()).unwrap_err();
        assert!(err.reason.contains("checksum"));
    }

    #[test]
    fn test_wrong_key_fails_verification() {
        let entry = CachedChunk::new(&key(), ChunkIdentity::from_bytes([1; 32]), b"chunk".to_vec());
        assert!(entry.verify(&CacheKey::from_hex("cd".repeat(32))).is_err());
    }

    #[test]
    fn test_bincode_round_trip_preserves_checksum() {
        let entry = CachedChunk::new(&key(), ChunkIdentity::from_bytes([9; 32]), b"x".to_vec());
        let bytes = bincode::serialize(&entry).unwrap();
        let back: CachedChunk = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, entry);
        assert!(back.verify(&key()).is_ok());
    }
}
