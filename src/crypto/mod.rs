//! Cryptographic operations for the swap engine
//!
//! This module provides keccak hashing, secret commitments, and secp256k1
//! signing/recovery for Ethereum-side authorization.

pub mod hash;
pub mod signing;

// Re-export for convenience
pub use hash::{commitment, function_selector, generate_secret, keccak256, verify_secret};
pub use signing::{recover_address, EthKey};
