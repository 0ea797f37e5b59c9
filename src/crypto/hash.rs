//! Keccak hashing and secret commitments

use sha3::{Digest, Keccak256};

use crate::types::Hash;

/// keccak256 of `data`
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    Hash::from_slice(&hasher.finalize())
}

/// First four bytes of keccak256 over a canonical function signature,
/// e.g. `"getNonce(address)"`.
pub fn function_selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&hash.as_bytes()[..4]);
    selector
}

/// Commitment published before funds are locked; revealing `secret` opens it.
pub fn commitment(secret: &Hash) -> Hash {
    keccak256(secret.as_bytes())
}

/// Whether `secret` opens `commitment`
pub fn verify_secret(secret: &Hash, commitment: &Hash) -> bool {
    self::commitment(secret) == *commitment
}

/// Fresh random 32-byte secret
pub fn generate_secret() -> Hash {
    Hash::from(rand::random::<[u8; 32]>())
}
