//! secp256k1 signing for Ethereum-side authorization
//!
//! Signatures are 65 bytes `r || s || v` with `v` in Ethereum format (27 or 28),
//! produced over 32-byte prehashed digests (EIP-712 or EIP-191).

use anyhow::{Context, Result};
use ethereum_types::Address;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use std::fmt;

use crate::crypto::hash::keccak256;
use crate::types::Hash;

/// An Ethereum signing identity
#[derive(Clone)]
pub struct EthKey {
    signing_key: SigningKey,
}

impl fmt::Debug for EthKey {
    // Never print key material.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EthKey")
            .field("address", &self.address())
            .finish()
    }
}

impl EthKey {
    /// Creates a key from 32 secret bytes
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self> {
        let signing_key = SigningKey::from_bytes(&(*bytes).into())
            .map_err(|e| anyhow::anyhow!("Failed to create ECDSA signing key: {}", e))?;
        Ok(Self { signing_key })
    }

    /// Parses a hex private key, with or without `0x` prefix
    pub fn from_hex(key: &str) -> Result<Self> {
        let key_hex = key.trim().strip_prefix("0x").unwrap_or(key.trim());
        let key_bytes = hex::decode(key_hex).context("Failed to decode private key from hex")?;
        if key_bytes.len() != 32 {
            anyhow::bail!(
                "Invalid private key length: expected 32 bytes, got {}",
                key_bytes.len()
            );
        }
        let mut key_array = [0u8; 32];
        key_array.copy_from_slice(&key_bytes);
        Self::from_bytes(&key_array)
    }

    /// Loads a hex private key from the named environment variable
    pub fn from_env(var: &str) -> Result<Self> {
        let key = std::env::var(var).map_err(|_| {
            anyhow::anyhow!(
                "Environment variable '{}' not set. Please set it with your Ethereum private key (hex encoded).",
                var
            )
        })?;
        Self::from_hex(&key)
    }

    /// Random key, for ephemeral identities and tests
    pub fn random() -> Result<Self> {
        Self::from_bytes(&rand::random::<[u8; 32]>())
    }

    /// Ethereum address: last 20 bytes of keccak256 over the uncompressed public key
    pub fn address(&self) -> Address {
        public_key_to_address(self.signing_key.verifying_key())
    }

    /// Signs a 32-byte digest, returning `r || s || v`
    pub fn sign_digest(&self, digest: &Hash) -> Result<Vec<u8>> {
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(digest.as_bytes())
            .map_err(|e| anyhow::anyhow!("Failed to sign precomputed hash: {}", e))?;

        let mut sig = Vec::with_capacity(65);
        sig.extend_from_slice(&signature.to_bytes());
        sig.push(recovery_id.to_byte() + 27);
        Ok(sig)
    }
}

/// Recovers the signer address of a 65-byte `r || s || v` signature over `digest`
pub fn recover_address(digest: &Hash, signature: &[u8]) -> Result<Address> {
    if signature.len() != 65 {
        anyhow::bail!(
            "Invalid signature length: expected 65 bytes, got {}",
            signature.len()
        );
    }

    let v = signature[64];
    let v = if v >= 27 { v - 27 } else { v };
    let recovery_id =
        RecoveryId::from_byte(v).ok_or_else(|| anyhow::anyhow!("Invalid recovery id {}", v))?;
    let sig = Signature::from_slice(&signature[..64])
        .map_err(|e| anyhow::anyhow!("Invalid signature: {}", e))?;

    let key = VerifyingKey::recover_from_prehash(digest.as_bytes(), &sig, recovery_id)
        .map_err(|e| anyhow::anyhow!("Failed to recover public key: {}", e))?;
    Ok(public_key_to_address(&key))
}

fn public_key_to_address(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    // Uncompressed: 0x04 || x || y, hash the coordinates only
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&hash.as_bytes()[12..])
}
