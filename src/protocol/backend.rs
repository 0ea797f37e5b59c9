//! Protocol backend
//!
//! Environment and collaborators shared by every swap this node runs, plus the
//! operator-adjustable settings (gas price, swap timeout, deposit addresses).

use ethereum_types::Address;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::chains::ChainClient;
use crate::crypto::EthKey;
use crate::monero::MoneroClient;
use crate::net::Net;
use crate::relayer::RelaySubmitter;
use crate::swap::SwapManager;
use crate::types::{Environment, Hash};

/// Deployed contract addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractAddresses {
    pub swap_creator: Address,
    pub forwarder: Address,
}

/// Deadlines and polling cadence for chain interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Bound on each chain query
    pub io: Duration,
    /// Bound on waiting for a submitted transaction to be mined
    pub tx: Duration,
    /// Interval between receipt polls and state machine polls
    pub poll_interval: Duration,
}

/// Shared environment consumed by the protocol roles and swap state machines
pub trait ProtocolBackend: Send + Sync {
    fn env(&self) -> Environment;

    fn set_gas_price(&self, gas_price: u64);
    fn gas_price(&self) -> Option<u64>;

    /// Duration of the claim window of newly created swaps
    fn set_swap_timeout(&self, timeout: Duration);
    fn swap_timeout(&self) -> Duration;

    fn swap_manager(&self) -> Arc<dyn SwapManager>;

    /// Address that owns (locks and refunds) swaps this node provides ETH for
    fn set_eth_address(&self, address: Address);
    fn eth_address(&self) -> Address;

    /// Where XMR swept for swap `id` is sent
    fn set_xmr_deposit_address(&self, address: String, id: Hash);
    fn clear_xmr_deposit_address(&self, id: Hash);
    fn xmr_deposit_address(&self, id: &Hash) -> Option<String>;

    fn chain(&self) -> Arc<dyn ChainClient>;
    fn monero(&self) -> Arc<dyn MoneroClient>;
    fn net(&self) -> Arc<dyn Net>;
    fn relayer(&self) -> Arc<dyn RelaySubmitter>;

    /// Key that signs relay claims for swaps this node is claimer of
    fn eth_key(&self) -> &EthKey;

    fn contracts(&self) -> ContractAddresses;
    fn timeouts(&self) -> Timeouts;
}

/// Collaborators and initial settings for [`Backend`]
pub struct BackendConfig {
    pub env: Environment,
    pub chain: Arc<dyn ChainClient>,
    pub monero: Arc<dyn MoneroClient>,
    pub net: Arc<dyn Net>,
    pub swap_manager: Arc<dyn SwapManager>,
    pub relayer: Arc<dyn RelaySubmitter>,
    pub eth_key: EthKey,
    pub contracts: ContractAddresses,
    pub timeouts: Timeouts,
    pub swap_timeout: Duration,
}

struct Settings {
    gas_price: Option<u64>,
    swap_timeout: Duration,
    eth_address: Address,
    xmr_deposit_addresses: HashMap<Hash, String>,
}

pub struct Backend {
    env: Environment,
    chain: Arc<dyn ChainClient>,
    monero: Arc<dyn MoneroClient>,
    net: Arc<dyn Net>,
    swap_manager: Arc<dyn SwapManager>,
    relayer: Arc<dyn RelaySubmitter>,
    eth_key: EthKey,
    contracts: ContractAddresses,
    timeouts: Timeouts,
    settings: RwLock<Settings>,
}

impl Backend {
    pub fn new(config: BackendConfig) -> Self {
        let settings = Settings {
            gas_price: None,
            swap_timeout: config.swap_timeout,
            eth_address: config.eth_key.address(),
            xmr_deposit_addresses: HashMap::new(),
        };
        Self {
            env: config.env,
            chain: config.chain,
            monero: config.monero,
            net: config.net,
            swap_manager: config.swap_manager,
            relayer: config.relayer,
            eth_key: config.eth_key,
            contracts: config.contracts,
            timeouts: config.timeouts,
            settings: RwLock::new(settings),
        }
    }

    fn read<T>(&self, f: impl FnOnce(&Settings) -> T) -> T {
        match self.settings.read() {
            Ok(settings) => f(&settings),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }

    fn write(&self, f: impl FnOnce(&mut Settings)) {
        match self.settings.write() {
            Ok(mut settings) => f(&mut settings),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

impl ProtocolBackend for Backend {
    fn env(&self) -> Environment {
        self.env
    }

    fn set_gas_price(&self, gas_price: u64) {
        self.write(|s| s.gas_price = Some(gas_price));
    }

    fn gas_price(&self) -> Option<u64> {
        self.read(|s| s.gas_price)
    }

    fn set_swap_timeout(&self, timeout: Duration) {
        self.write(|s| s.swap_timeout = timeout);
    }

    fn swap_timeout(&self) -> Duration {
        self.read(|s| s.swap_timeout)
    }

    fn swap_manager(&self) -> Arc<dyn SwapManager> {
        self.swap_manager.clone()
    }

    fn set_eth_address(&self, address: Address) {
        self.write(|s| s.eth_address = address);
    }

    fn eth_address(&self) -> Address {
        self.read(|s| s.eth_address)
    }

    fn set_xmr_deposit_address(&self, address: String, id: Hash) {
        self.write(|s| {
            s.xmr_deposit_addresses.insert(id, address);
        });
    }

    fn clear_xmr_deposit_address(&self, id: Hash) {
        self.write(|s| {
            s.xmr_deposit_addresses.remove(&id);
        });
    }

    fn xmr_deposit_address(&self, id: &Hash) -> Option<String> {
        self.read(|s| s.xmr_deposit_addresses.get(id).cloned())
    }

    fn chain(&self) -> Arc<dyn ChainClient> {
        self.chain.clone()
    }

    fn monero(&self) -> Arc<dyn MoneroClient> {
        self.monero.clone()
    }

    fn net(&self) -> Arc<dyn Net> {
        self.net.clone()
    }

    fn relayer(&self) -> Arc<dyn RelaySubmitter> {
        self.relayer.clone()
    }

    fn eth_key(&self) -> &EthKey {
        &self.eth_key
    }

    fn contracts(&self) -> ContractAddresses {
        self.contracts
    }

    fn timeouts(&self) -> Timeouts {
        self.timeouts
    }
}
