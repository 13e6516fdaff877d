//! # Hashing Helpers
//!
//! Keccak-256 and selector derivation, used for operation identifiers and
//! the shared-storage slot constant.

use crate::values::{Hash, Selector};
use sha3::{Digest, Keccak256};

/// Computes Keccak-256 hash of input data.
#[must_use]
pub fn keccak256(data: &[u8]) -> Hash {
    let hash = Keccak256::digest(data);
    Hash::new(hash.into())
}

/// Derives the 4-byte selector for an operation signature string.
///
/// The selector is the first four bytes of `keccak256(signature)`, the same
/// convention the EVM ABI uses for function dispatch.
#[must_use]
pub fn selector(signature: &str) -> Selector {
    let hash = keccak256(signature.as_bytes());
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&hash.as_bytes()[..4]);
    Selector::new(bytes)
}

// =============================================================================
// TESTS
// =============================================================================
