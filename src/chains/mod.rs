//! Chain clients
//!
//! [`ChainClient`] is the capability trait the engine depends on; [`EvmRpcClient`]
//! implements it over Ethereum JSON-RPC.

pub mod client;
pub mod evm;

pub use client::{
    with_deadline, ChainClient, RevealedSecret, SecretKind, Stage, TxReceipt, TxRequest,
};
pub use evm::EvmRpcClient;

/// Serde helper for `0x`-prefixed hex byte strings
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(serde::de::Error::custom)
    }
}
