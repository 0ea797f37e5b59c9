//! Chain access capability
//!
//! Everything the swap engine needs from an Ethereum-compatible chain. Calls return
//! `anyhow::Result`; callers bound them with [`with_deadline`], which maps expiry to
//! `SwapError::Timeout` and transport failures to `SwapError::Chain`.

use async_trait::async_trait;
use ethereum_types::{Address, U256};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::error::{Result, SwapError};
use crate::types::Hash;

/// Stage of a swap in the swap creator contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// Unknown to the contract
    Invalid,
    /// Funds locked, claimable before timeout0
    Pending,
    /// Funds locked and marked ready by the owner
    Ready,
    /// Claimed or refunded
    Completed,
}

impl Stage {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Stage::Invalid),
            1 => Some(Stage::Pending),
            2 => Some(Stage::Ready),
            3 => Some(Stage::Completed),
            _ => None,
        }
    }

    pub fn is_claimable(&self) -> bool {
        matches!(self, Stage::Pending | Stage::Ready)
    }
}

/// An unsigned transaction, signed and sent by whichever sender handles it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRequest {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    #[serde(with = "crate::chains::hex_bytes")]
    pub data: Vec<u8>,
    pub gas: Option<u64>,
    /// Wei per gas; the node's suggestion is used when unset
    pub gas_price: Option<u64>,
}

impl TxRequest {
    pub fn new(from: Address, to: Address, value: U256, data: Vec<u8>) -> Self {
        Self {
            from,
            to,
            value,
            data,
            gas: None,
            gas_price: None,
        }
    }

    pub fn with_gas_price(mut self, gas_price: Option<u64>) -> Self {
        self.gas_price = gas_price;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: Hash,
    pub block_number: u64,
    /// Whether the transaction executed without reverting
    pub success: bool,
}

/// Which secret a completed swap revealed on-chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    Claim,
    Refund,
}

/// Secret revealed by a `Claimed` or `Refunded` event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealedSecret {
    pub kind: SecretKind,
    pub secret: Hash,
    pub tx_hash: Hash,
}

/// Chain queries and submission used by the relay claim builder and the state machine
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn chain_id(&self) -> anyhow::Result<u64>;

    /// Timestamp of the latest block; the authoritative clock for swap timeouts
    async fn latest_block_timestamp(&self) -> anyhow::Result<u64>;

    /// Replay-protection nonce of `from` in the forwarder contract
    async fn forwarder_nonce(&self, forwarder: Address, from: Address) -> anyhow::Result<U256>;

    async fn swap_stage(&self, swap_creator: Address, swap_id: Hash) -> anyhow::Result<Stage>;

    /// Simulates `tx` and returns its gas usage; a revert is an error
    async fn estimate_gas(&self, tx: &TxRequest) -> anyhow::Result<u64>;

    /// Sends `tx` from a node-managed account
    async fn send_transaction(&self, tx: &TxRequest) -> anyhow::Result<Hash>;

    /// `None` while the transaction is not yet mined
    async fn transaction_receipt(&self, tx_hash: Hash) -> anyhow::Result<Option<TxReceipt>>;

    /// Secret revealed by a completed swap, if any
    async fn revealed_secret(
        &self,
        swap_creator: Address,
        swap_id: Hash,
    ) -> anyhow::Result<Option<RevealedSecret>>;
}

/// Runs a chain call under an I/O deadline
///
/// # Arguments
///
/// * `timeout` - Deadline for the whole call
/// * `operation` - Name used in the timeout error
/// * `fut` - The chain call
///
/// # Returns
///
/// * `Ok(T)` - Call completed in time
/// * `Err(SwapError::Timeout)` - Deadline expired
/// * `Err(SwapError::Chain)` - Call failed
pub async fn with_deadline<T, F>(timeout: Duration, operation: &str, fut: F) -> Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result.map_err(SwapError::Chain),
        Err(_) => Err(SwapError::Timeout {
            operation: operation.to_string(),
            timeout,
        }),
    }
}
