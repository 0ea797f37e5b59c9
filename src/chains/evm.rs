//! EVM JSON-RPC Chain Client
//!
//! Implements [`ChainClient`] against an Ethereum node: block time, forwarder nonces,
//! swap creator stage and events, gas estimation and node-signed submission.

use anyhow::{Context, Result};
use async_trait::async_trait;
use ethereum_types::{Address, U256};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::abi::{self, Token};
use crate::chains::client::{ChainClient, RevealedSecret, SecretKind, Stage, TxReceipt, TxRequest};
use crate::crypto::keccak256;
use crate::types::Hash;

const CLAIMED_EVENT: &str = "Claimed(bytes32,bytes32)";
const REFUNDED_EVENT: &str = "Refunded(bytes32,bytes32)";

/// EVM JSON-RPC request wrapper
#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Vec<serde_json::Value>,
    id: u64,
}

/// EVM JSON-RPC response wrapper
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    #[allow(dead_code)]
    jsonrpc: String,
    result: Option<T>,
    error: Option<JsonRpcError>,
    #[allow(dead_code)]
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Debug, Deserialize)]
struct EvmBlock {
    timestamp: String,
}

#[derive(Debug, Deserialize)]
struct EvmReceipt {
    #[serde(rename = "transactionHash")]
    transaction_hash: String,
    #[serde(rename = "blockNumber")]
    block_number: String,
    /// `0x1` on success, `0x0` on revert
    status: Option<String>,
}

/// EVM event log entry
#[derive(Debug, Clone, Deserialize)]
struct EvmLog {
    topics: Vec<String>,
    #[serde(rename = "transactionHash")]
    transaction_hash: String,
}

/// Client for an Ethereum-compatible chain over JSON-RPC
pub struct EvmRpcClient {
    /// HTTP client for JSON-RPC calls
    client: Client,
    /// Base RPC URL
    base_url: String,
    next_id: AtomicU64,
}

impl EvmRpcClient {
    /// Creates a new JSON-RPC client
    ///
    /// # Arguments
    ///
    /// * `rpc_url` - Node RPC endpoint
    ///
    /// # Returns
    ///
    /// * `Ok(EvmRpcClient)` - Successfully created client
    /// * `Err(anyhow::Error)` - Failed to create HTTP client
    pub fn new(rpc_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .no_proxy() // Avoid macOS system-configuration issues in tests
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: rpc_url.to_string(),
            next_id: AtomicU64::new(1),
        })
    }

    async fn rpc_call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<Option<T>> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        let response: JsonRpcResponse<T> = self
            .client
            .post(&self.base_url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", method))?
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", method))?;

        if let Some(error) = response.error {
            anyhow::bail!("{} failed: {} ({})", method, error.message, error.code);
        }

        Ok(response.result)
    }

    async fn rpc_call_required<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<T> {
        self.rpc_call(method, params)
            .await?
            .with_context(|| format!("{} returned no result", method))
    }

    async fn eth_call(&self, to: Address, data: Vec<u8>) -> Result<Vec<u8>> {
        let call = serde_json::json!({
            "to": format!("{:#x}", to),
            "data": format!("0x{}", hex::encode(data)),
        });
        let result: String = self
            .rpc_call_required("eth_call", vec![call, serde_json::json!("latest")])
            .await?;
        decode_hex(&result)
    }
}

#[async_trait]
impl ChainClient for EvmRpcClient {
    async fn chain_id(&self) -> Result<u64> {
        let result: String = self.rpc_call_required("eth_chainId", vec![]).await?;
        parse_hex_u64(&result).context("Failed to parse chain id")
    }

    async fn latest_block_timestamp(&self) -> Result<u64> {
        let block: EvmBlock = self
            .rpc_call_required(
                "eth_getBlockByNumber",
                vec![serde_json::json!("latest"), serde_json::json!(false)],
            )
            .await?;
        let timestamp = parse_hex_u64(&block.timestamp).context("Failed to parse block timestamp")?;
        debug!("Latest block timestamp: {}", timestamp);
        Ok(timestamp)
    }

    async fn forwarder_nonce(&self, forwarder: Address, from: Address) -> Result<U256> {
        let data = abi::encode_call("getNonce(address)", &[Token::Address(from)]);
        let result = self
            .eth_call(forwarder, data)
            .await
            .context("Failed to query forwarder nonce")?;
        abi::decode_uint(&result)
    }

    async fn swap_stage(&self, swap_creator: Address, swap_id: Hash) -> Result<Stage> {
        let data = abi::encode_call("swaps(bytes32)", &[Token::FixedBytes(swap_id)]);
        let result = self
            .eth_call(swap_creator, data)
            .await
            .context("Failed to query swap stage")?;
        let raw = abi::decode_uint(&result)?;
        if raw > U256::from(u8::MAX) {
            anyhow::bail!("Swap stage out of range: {}", raw);
        }
        Stage::from_u8(raw.low_u32() as u8).with_context(|| format!("Unknown swap stage {}", raw))
    }

    async fn estimate_gas(&self, tx: &TxRequest) -> Result<u64> {
        let result: String = self
            .rpc_call_required("eth_estimateGas", vec![tx_to_json(tx)])
            .await?;
        parse_hex_u64(&result).context("Failed to parse gas estimate")
    }

    async fn send_transaction(&self, tx: &TxRequest) -> Result<Hash> {
        let result: String = self
            .rpc_call_required("eth_sendTransaction", vec![tx_to_json(tx)])
            .await?;
        let tx_hash = parse_hash(&result)?;
        info!("Sent transaction {:#x} from {:#x} to {:#x}", tx_hash, tx.from, tx.to);
        Ok(tx_hash)
    }

    async fn transaction_receipt(&self, tx_hash: Hash) -> Result<Option<TxReceipt>> {
        let receipt: Option<EvmReceipt> = self
            .rpc_call(
                "eth_getTransactionReceipt",
                vec![serde_json::json!(format!("{:#x}", tx_hash))],
            )
            .await?;

        receipt
            .map(|r| -> Result<TxReceipt> {
                Ok(TxReceipt {
                    tx_hash: parse_hash(&r.transaction_hash)?,
                    block_number: parse_hex_u64(&r.block_number)?,
                    success: r.status.as_deref().map(parse_hex_u64).transpose()? != Some(0),
                })
            })
            .transpose()
    }

    async fn revealed_secret(
        &self,
        swap_creator: Address,
        swap_id: Hash,
    ) -> Result<Option<RevealedSecret>> {
        let claimed_topic = keccak256(CLAIMED_EVENT.as_bytes());
        let refunded_topic = keccak256(REFUNDED_EVENT.as_bytes());
        let filter = serde_json::json!({
            "address": format!("{:#x}", swap_creator),
            "fromBlock": "earliest",
            "toBlock": "latest",
            "topics": [
                [format!("{:#x}", claimed_topic), format!("{:#x}", refunded_topic)],
                format!("{:#x}", swap_id),
            ],
        });

        let logs: Vec<EvmLog> = self
            .rpc_call("eth_getLogs", vec![filter])
            .await?
            .unwrap_or_default();

        for log in logs {
            if log.topics.len() < 3 {
                warn!("Skipping malformed swap event log with {} topics", log.topics.len());
                continue;
            }
            let topic = parse_hash(&log.topics[0])?;
            let kind = if topic == claimed_topic {
                SecretKind::Claim
            } else if topic == refunded_topic {
                SecretKind::Refund
            } else {
                continue;
            };
            return Ok(Some(RevealedSecret {
                kind,
                secret: parse_hash(&log.topics[2])?,
                tx_hash: parse_hash(&log.transaction_hash)?,
            }));
        }
        Ok(None)
    }
}

fn tx_to_json(tx: &TxRequest) -> serde_json::Value {
    let mut value = serde_json::json!({
        "from": format!("{:#x}", tx.from),
        "to": format!("{:#x}", tx.to),
        "value": format!("{:#x}", tx.value),
        "data": format!("0x{}", hex::encode(&tx.data)),
    });
    if let Some(gas) = tx.gas {
        value["gas"] = serde_json::json!(format!("{:#x}", gas));
    }
    if let Some(gas_price) = tx.gas_price {
        value["gasPrice"] = serde_json::json!(format!("{:#x}", gas_price));
    }
    value
}

fn decode_hex(value: &str) -> Result<Vec<u8>> {
    hex::decode(value.strip_prefix("0x").unwrap_or(value))
        .with_context(|| format!("Invalid hex data: {}", value))
}

fn parse_hex_u64(value: &str) -> Result<u64> {
    u64::from_str_radix(value.strip_prefix("0x").unwrap_or(value), 16)
        .with_context(|| format!("Invalid hex quantity: {}", value))
}

fn parse_hash(value: &str) -> Result<Hash> {
    let bytes = decode_hex(value)?;
    if bytes.len() != 32 {
        anyhow::bail!("Expected 32-byte hash, got {} bytes", bytes.len());
    }
    Ok(Hash::from_slice(&bytes))
}
