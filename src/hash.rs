//! Stable content fingerprints for change detection.
//!
//! The default algorithm is xxh64 (fast, non-cryptographic); sha256 is the
//! 256-bit alternative. Output is prefixed with the algorithm tag
//! (`xxh64:` / `sha256:`) so the store can detect an algorithm switch: a
//! tag difference reads as a content change and forces re-embedding.

use sha2::{Digest, Sha256};
use xxhash_rust::xxh64::xxh64;

/// Hash algorithm selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// 64-bit xxHash, the default.
    Xxh64,
    /// SHA-256 fallback.
    Sha256,
}

/// Fingerprint `content` with the default algorithm.
///
/// Deterministic for equal byte sequences and whitespace-sensitive.
pub fn hash_content(content: &str) -> String {
    hash_with(content, HashAlgorithm::Xxh64)
}

/// Fingerprint `content` with an explicit algorithm.
pub fn hash_with(content: &str, algorithm: HashAlgorithm) -> String {
    match algorithm {
        HashAlgorithm::Xxh64 => format!("xxh64:{:016x}", xxh64(content.as_bytes(), 0)),
        HashAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(content.as_bytes());
            format!("sha256:{:x}", hasher.finalize())
        }
    }
}
