//! Keccak256 hashing of canonical ABI signatures.

use tiny_keccak::{Hasher, Keccak};

/// Compute keccak256 of a canonical signature string.
pub fn keccak256_signature(signature: &str) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(signature.as_bytes());
    hasher.finalize(&mut output);
    output
}

/// The 4-byte function selector.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256_signature(signature);
    [hash[0], hash[1], hash[2], hash[3]]
}
