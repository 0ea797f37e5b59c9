//! Configuration Management Module
//!
//! Loads the swap daemon configuration from TOML. Configuration covers the service
//! timing parameters and the Ethereum connection (RPC endpoint and contracts).
//! Private keys are never stored in the file; the file names the environment
//! variable that holds them.

use anyhow::Context;
use ethereum_types::Address;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::protocol::{ContractAddresses, Timeouts};
use crate::swap::{JsonFileDb, Manager};
use crate::types::Environment;

/// Environment variable overriding the config file location
pub const CONFIG_PATH_ENV: &str = "SWAPD_CONFIG_PATH";
/// Config file location used when neither an explicit path nor the env var is given
pub const DEFAULT_CONFIG_PATH: &str = "config/swapd.toml";

// ============================================================================
// CONFIGURATION STRUCTURES
// ============================================================================

/// Main configuration structure containing all swap daemon settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapdConfig {
    /// Service configuration (timeouts, polling, data directory)
    pub service: ServiceConfig,
    /// Ethereum connection and contract addresses
    pub ethereum: EthereumConfig,
}

/// Service-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub environment: Environment,
    /// Claim window of new swaps in seconds; the refund window has the same length
    pub swap_timeout_secs: u64,
    /// Deadline for each chain query in seconds
    #[serde(default = "default_io_timeout_secs")]
    pub io_timeout_secs: u64,
    /// Deadline for a submitted transaction to be mined, in seconds
    #[serde(default = "default_tx_timeout_secs")]
    pub tx_timeout_secs: u64,
    /// Interval between swap polls in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Directory where completed swaps are persisted; persistence is off when unset
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

/// Configuration for the Ethereum side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EthereumConfig {
    /// JSON-RPC endpoint URL
    pub rpc_url: String,
    /// Expected chain id; checked against the node on startup
    pub chain_id: u64,
    /// Address of the SwapCreator contract
    pub swap_creator: String,
    /// Address of the trusted forwarder used for relayed claims
    pub forwarder: String,
    /// Node-managed account that locks and refunds; defaults to the signing key's address
    #[serde(default)]
    pub sender_address: Option<String>,
    /// Environment variable name containing the Ethereum private key (hex)
    pub private_key_env: String,
}

fn default_io_timeout_secs() -> u64 {
    30
}

fn default_tx_timeout_secs() -> u64 {
    300
}

fn default_poll_interval_ms() -> u64 {
    5000
}

impl Default for SwapdConfig {
    /// Development defaults: a local node on port 8545 with one-hour swap windows
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                environment: Environment::Development,
                swap_timeout_secs: 3600,
                io_timeout_secs: default_io_timeout_secs(),
                tx_timeout_secs: default_tx_timeout_secs(),
                poll_interval_ms: default_poll_interval_ms(),
                data_dir: None,
            },
            ethereum: EthereumConfig {
                rpc_url: "http://127.0.0.1:8545".to_string(),
                chain_id: 1337,
                swap_creator: "0x5fbdb2315678afecb367f032d93f642f64180aa3".to_string(),
                forwarder: "0xe7f1725e7734ce288f8367e1bb143e90bb3f0512".to_string(),
                sender_address: None,
                private_key_env: "SWAPD_ETH_PRIVATE_KEY".to_string(),
            },
        }
    }
}

impl SwapdConfig {
    /// Loads configuration from a TOML file.
    ///
    /// The path is `path` if given, else `SWAPD_CONFIG_PATH`, else `config/swapd.toml`.
    ///
    /// # Arguments
    ///
    /// * `path` - Optional path to config file
    ///
    /// # Returns
    ///
    /// * `Ok(SwapdConfig)` - Successfully loaded and validated configuration
    /// * `Err(anyhow::Error)` - File missing, unparseable, or invalid
    pub fn load_from_path(path: Option<&str>) -> anyhow::Result<Self> {
        let config_path = path
            .map(|p| p.to_string())
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

        if !std::path::Path::new(&config_path).exists() {
            return Err(anyhow::anyhow!(
                "Configuration file '{}' not found. Please copy the template:\n\
                cp config/swapd.template.toml config/swapd.toml\n\
                Then edit config/swapd.toml with your actual values.",
                config_path
            ));
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path))?;
        let config: SwapdConfig =
            toml::from_str(&content).with_context(|| format!("Failed to parse {}", config_path))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from the default location.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from_path(None)
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// Checks:
    /// - Swap timeout and I/O timeout are positive
    /// - RPC URL is non-empty
    /// - Contract and sender addresses parse
    /// - Swap creator and forwarder are distinct
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.service.swap_timeout_secs == 0 {
            anyhow::bail!("Configuration error: swap_timeout_secs must be positive");
        }
        if self.service.io_timeout_secs == 0 || self.service.tx_timeout_secs == 0 {
            anyhow::bail!("Configuration error: io_timeout_secs and tx_timeout_secs must be positive");
        }
        if self.ethereum.rpc_url.trim().is_empty() {
            anyhow::bail!("Configuration error: ethereum.rpc_url is empty");
        }

        let contracts = self.contract_addresses()?;
        if contracts.swap_creator == contracts.forwarder {
            anyhow::bail!(
                "Configuration error: swap_creator and forwarder must be different contracts ({:#x})",
                contracts.swap_creator
            );
        }
        self.sender_address()?;
        Ok(())
    }

    pub fn contract_addresses(&self) -> anyhow::Result<ContractAddresses> {
        Ok(ContractAddresses {
            swap_creator: parse_address("swap_creator", &self.ethereum.swap_creator)?,
            forwarder: parse_address("forwarder", &self.ethereum.forwarder)?,
        })
    }

    pub fn sender_address(&self) -> anyhow::Result<Option<Address>> {
        self.ethereum
            .sender_address
            .as_deref()
            .map(|a| parse_address("sender_address", a))
            .transpose()
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            io: Duration::from_secs(self.service.io_timeout_secs),
            tx: Duration::from_secs(self.service.tx_timeout_secs),
            poll_interval: Duration::from_millis(self.service.poll_interval_ms),
        }
    }

    pub fn swap_timeout(&self) -> Duration {
        Duration::from_secs(self.service.swap_timeout_secs)
    }

    /// Builds the swap registry, persisting completed swaps under `data_dir` when set
    pub fn swap_manager(&self) -> anyhow::Result<Manager> {
        match &self.service.data_dir {
            Some(dir) => {
                let db = JsonFileDb::new(dir.join("swaps"))?;
                Manager::with_db(Arc::new(db))
            }
            None => Ok(Manager::new()),
        }
    }
}

fn parse_address(field: &str, value: &str) -> anyhow::Result<Address> {
    let trimmed = value.trim();
    let hex_part = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(hex_part)
        .map_err(|e| anyhow::anyhow!("Configuration error: invalid {} '{}': {}", field, value, e))?;
    if bytes.len() != 20 {
        anyhow::bail!(
            "Configuration error: {} '{}' is not a 20-byte hex address",
            field,
            value
        );
    }
    Ok(Address::from_slice(&bytes))
}
