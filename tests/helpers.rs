//! Shared test helpers for swapd tests
//!
//! This module provides constants, builders and test doubles for the capability
//! traits: an in-memory chain that simulates the swap creator contract, a recording
//! network, a fake Monero wallet and a relayer that executes claims directly.

#![allow(dead_code)]

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use ethereum_types::{Address, U256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use swapd::chains::{ChainClient, RevealedSecret, SecretKind, Stage, TxReceipt, TxRequest};
use swapd::crypto::{function_selector, generate_secret, keccak256, EthKey};
use swapd::error::Result;
use swapd::monero::{MoneroClient, XmrKeys, XmrLock, XmrPublicKeys};
use swapd::net::{Net, PeerId, QueryResponse};
use swapd::protocol::{
    Backend, BackendConfig, ContractAddresses, Message, SendKeysMessage, SwapStateNet, Timeouts,
};
use swapd::relayer::{validate_relay_claim_request, RelayClaimRequest, RelaySubmitter};
use swapd::swap::record::SWAP_TUPLE_TYPE;
use swapd::swap::{Manager, SwapRecord};
use swapd::types::{EthAsset, Environment, Hash, ProvidesCoin};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Chain time every test chain starts at
pub const START_TIME: u64 = 1_700_000_000;

/// Claim window used by test backends (30 minutes)
pub const SWAP_TIMEOUT_SECS: u64 = 1800;

pub const TEST_CHAIN_ID: u64 = 1337;

/// Claimer (XMR maker) private key
pub const MAKER_KEY_HEX: &str =
    "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

/// Owner (XMR taker) private key
pub const TAKER_KEY_HEX: &str =
    "0x0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

/// Swap owner address used by standalone records
pub const DUMMY_OWNER: Address = Address::repeat_byte(0x01);

pub const DUMMY_SWAP_CREATOR: Address = Address::repeat_byte(0x0c);

pub const DUMMY_FORWARDER: Address = Address::repeat_byte(0x0f);

pub const DUMMY_RELAYER: Address = Address::repeat_byte(0x0e);

pub const DUMMY_PEER: &str = "peer-1";

/// `0x01..01`
pub fn dummy_secret() -> Hash {
    Hash::repeat_byte(0x01)
}

pub fn contracts() -> ContractAddresses {
    ContractAddresses {
        swap_creator: DUMMY_SWAP_CREATOR,
        forwarder: DUMMY_FORWARDER,
    }
}

pub fn maker_key() -> EthKey {
    EthKey::from_hex(MAKER_KEY_HEX).unwrap()
}

pub fn taker_key() -> EthKey {
    EthKey::from_hex(TAKER_KEY_HEX).unwrap()
}

/// Record of 1 ETH owned by `DUMMY_OWNER`, claimable by `claimer` with `dummy_secret()`,
/// with `timeout0` 30 minutes and `timeout1` 60 minutes after `START_TIME`
pub fn create_test_swap(claimer: Address) -> SwapRecord {
    SwapRecord::new(
        DUMMY_OWNER,
        claimer,
        swapd::crypto::commitment(&dummy_secret()),
        swapd::crypto::commitment(&Hash::repeat_byte(0x02)),
        START_TIME + 30 * 60,
        START_TIME + 60 * 60,
        EthAsset::ETH,
        U256::exp10(18),
        U256::one(),
    )
    .unwrap()
}

// ============================================================================
// MOCK CHAIN
// ============================================================================

struct ChainState {
    chain_id: u64,
    timestamp: u64,
    nonces: HashMap<Address, U256>,
    stages: HashMap<Hash, Stage>,
    revealed: HashMap<Hash, RevealedSecret>,
    receipts: HashMap<Hash, TxReceipt>,
    sent: Vec<TxRequest>,
    gas_estimate: u64,
    estimate_error: Option<String>,
    latency: Option<Duration>,
    /// Receipts are withheld, as for transactions not yet mined
    hold_receipts: bool,
    tx_count: u64,
}

/// In-memory chain that simulates the swap creator contract.
///
/// `newSwap`, `setReady`, `claim` and `refund` call data are decoded and applied to
/// per-swap stages with the contract's rules; other calls succeed without effect.
/// Every transaction is mined immediately.
pub struct MockChain {
    state: Mutex<ChainState>,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ChainState {
                chain_id: TEST_CHAIN_ID,
                timestamp: START_TIME,
                nonces: HashMap::new(),
                stages: HashMap::new(),
                revealed: HashMap::new(),
                receipts: HashMap::new(),
                sent: Vec::new(),
                gas_estimate: 100_000,
                estimate_error: None,
                latency: None,
                hold_receipts: false,
                tx_count: 0,
            }),
        }
    }

    pub fn set_timestamp(&self, timestamp: u64) {
        self.state.lock().unwrap().timestamp = timestamp;
    }

    pub fn timestamp(&self) -> u64 {
        self.state.lock().unwrap().timestamp
    }

    pub fn set_chain_id(&self, chain_id: u64) {
        self.state.lock().unwrap().chain_id = chain_id;
    }

    pub fn set_nonce(&self, address: Address, nonce: U256) {
        self.state.lock().unwrap().nonces.insert(address, nonce);
    }

    pub fn set_stage(&self, swap_id: Hash, stage: Stage) {
        self.state.lock().unwrap().stages.insert(swap_id, stage);
    }

    pub fn stage(&self, swap_id: &Hash) -> Stage {
        self.state
            .lock()
            .unwrap()
            .stages
            .get(swap_id)
            .copied()
            .unwrap_or(Stage::Invalid)
    }

    pub fn set_gas_estimate(&self, gas: u64) {
        self.state.lock().unwrap().gas_estimate = gas;
    }

    /// Makes gas estimation fail as a reverting simulation would
    pub fn fail_estimate(&self, reason: &str) {
        self.state.lock().unwrap().estimate_error = Some(reason.to_string());
    }

    /// Delays every chain query by `latency`
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().unwrap().latency = Some(latency);
    }

    pub fn clear_latency(&self) {
        self.state.lock().unwrap().latency = None;
    }

    /// While held, transactions are applied but report no receipt
    pub fn hold_receipts(&self, hold: bool) {
        self.state.lock().unwrap().hold_receipts = hold;
    }

    pub fn sent_transactions(&self) -> Vec<TxRequest> {
        self.state.lock().unwrap().sent.clone()
    }

    /// Applies call data sent to `to`, returning the mined transaction hash
    pub fn apply_call(&self, to: Address, data: &[u8]) -> Hash {
        let mut state = self.state.lock().unwrap();
        state.tx_count += 1;
        let tx_hash = keccak256(&state.tx_count.to_be_bytes());

        let success = if to == DUMMY_SWAP_CREATOR {
            apply_swap_creator_call(&mut state, data, tx_hash)
        } else {
            true
        };
        let block_number = state.tx_count;
        state.receipts.insert(
            tx_hash,
            TxReceipt {
                tx_hash,
                block_number,
                success,
            },
        );
        tx_hash
    }

    async fn delay(&self) {
        let latency = self.state.lock().unwrap().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

fn selector(signature: &str) -> [u8; 4] {
    function_selector(signature)
}

fn word(data: &[u8], index: usize) -> &[u8] {
    &data[4 + index * 32..4 + (index + 1) * 32]
}

/// Returns whether the call succeeded
fn apply_swap_creator_call(state: &mut ChainState, data: &[u8], tx_hash: Hash) -> bool {
    // The swap tuple is static: nine words inline after the selector.
    if data.len() < 4 + 9 * 32 {
        return false;
    }
    let swap_id = keccak256(&data[4..4 + 9 * 32]);
    let claim_commitment = Hash::from_slice(word(data, 2));
    let refund_commitment = Hash::from_slice(word(data, 3));
    let timeout0 = U256::from_big_endian(word(data, 4)).low_u64();
    let stage = state.stages.get(&swap_id).copied().unwrap_or(Stage::Invalid);
    let now = state.timestamp;

    let sel = [data[0], data[1], data[2], data[3]];
    if sel == selector(&format!("newSwap({})", SWAP_TUPLE_TYPE)) {
        if stage != Stage::Invalid {
            return false;
        }
        state.stages.insert(swap_id, Stage::Pending);
        true
    } else if sel == selector(&format!("setReady({})", SWAP_TUPLE_TYPE)) {
        if stage != Stage::Pending {
            return false;
        }
        state.stages.insert(swap_id, Stage::Ready);
        true
    } else if sel == selector(&format!("claim({},bytes32)", SWAP_TUPLE_TYPE)) {
        let secret = Hash::from_slice(word(data, 9));
        if !stage.is_claimable() || now >= timeout0 || keccak256(secret.as_bytes()) != claim_commitment
        {
            return false;
        }
        state.stages.insert(swap_id, Stage::Completed);
        state.revealed.insert(
            swap_id,
            RevealedSecret {
                kind: SecretKind::Claim,
                secret,
                tx_hash,
            },
        );
        true
    } else if sel == selector(&format!("refund({},bytes32)", SWAP_TUPLE_TYPE)) {
        let secret = Hash::from_slice(word(data, 9));
        let window_open = now >= timeout0 || stage == Stage::Pending;
        if !stage.is_claimable()
            || !window_open
            || keccak256(secret.as_bytes()) != refund_commitment
        {
            return false;
        }
        state.stages.insert(swap_id, Stage::Completed);
        state.revealed.insert(
            swap_id,
            RevealedSecret {
                kind: SecretKind::Refund,
                secret,
                tx_hash,
            },
        );
        true
    } else {
        false
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn chain_id(&self) -> AnyResult<u64> {
        self.delay().await;
        Ok(self.state.lock().unwrap().chain_id)
    }

    async fn latest_block_timestamp(&self) -> AnyResult<u64> {
        self.delay().await;
        Ok(self.state.lock().unwrap().timestamp)
    }

    async fn forwarder_nonce(&self, _forwarder: Address, from: Address) -> AnyResult<U256> {
        self.delay().await;
        Ok(self
            .state
            .lock()
            .unwrap()
            .nonces
            .get(&from)
            .copied()
            .unwrap_or_default())
    }

    async fn swap_stage(&self, _swap_creator: Address, swap_id: Hash) -> AnyResult<Stage> {
        self.delay().await;
        Ok(self.stage(&swap_id))
    }

    async fn estimate_gas(&self, _tx: &TxRequest) -> AnyResult<u64> {
        self.delay().await;
        let state = self.state.lock().unwrap();
        match &state.estimate_error {
            Some(reason) => anyhow::bail!("execution reverted: {}", reason),
            None => Ok(state.gas_estimate),
        }
    }

    async fn send_transaction(&self, tx: &TxRequest) -> AnyResult<Hash> {
        self.delay().await;
        self.state.lock().unwrap().sent.push(tx.clone());
        Ok(self.apply_call(tx.to, &tx.data))
    }

    async fn transaction_receipt(&self, tx_hash: Hash) -> AnyResult<Option<TxReceipt>> {
        self.delay().await;
        let state = self.state.lock().unwrap();
        if state.hold_receipts {
            return Ok(None);
        }
        Ok(state.receipts.get(&tx_hash).cloned())
    }

    async fn revealed_secret(
        &self,
        _swap_creator: Address,
        swap_id: Hash,
    ) -> AnyResult<Option<RevealedSecret>> {
        self.delay().await;
        Ok(self.state.lock().unwrap().revealed.get(&swap_id).cloned())
    }
}

// ============================================================================
// MOCK MONERO
// ============================================================================

/// A sweep performed by [`MockMonero`]
#[derive(Debug, Clone, PartialEq)]
pub struct Sweep {
    pub counterparty_secret: Hash,
    pub deposit_address: Option<String>,
}

#[derive(Default)]
struct MoneroState {
    locks: HashMap<String, u64>,
    sweeps: Vec<Sweep>,
    secrets: Vec<Hash>,
    reject_locks: bool,
}

/// Wallet whose locks are visible to every `MockMonero` sharing the same state
#[derive(Clone, Default)]
pub struct MockMonero {
    state: Arc<Mutex<MoneroState>>,
}

impl MockMonero {
    pub fn new() -> Self {
        Self::default()
    }

    /// A wallet on the same simulated Monero network
    pub fn connected(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }

    pub fn reject_locks(&self) {
        self.state.lock().unwrap().reject_locks = true;
    }

    pub fn sweeps(&self) -> Vec<Sweep> {
        self.state.lock().unwrap().sweeps.clone()
    }

    pub fn lock_count(&self) -> usize {
        self.state.lock().unwrap().locks.len()
    }
}

#[async_trait]
impl MoneroClient for MockMonero {
    async fn generate_keys(&self) -> AnyResult<XmrKeys> {
        let secret = generate_secret();
        self.state.lock().unwrap().secrets.push(secret);
        Ok(XmrKeys::new(
            secret,
            XmrPublicKeys {
                public_spend_key: hex::encode(keccak256(secret.as_bytes())),
                private_view_key: hex::encode(generate_secret()),
            },
        ))
    }

    async fn lock(
        &self,
        _own: &XmrKeys,
        _counterparty: &XmrPublicKeys,
        amount: u64,
    ) -> AnyResult<XmrLock> {
        let mut state = self.state.lock().unwrap();
        let tx_id = format!("xmr-lock-{}", state.locks.len() + 1);
        state.locks.insert(tx_id.clone(), amount);
        Ok(XmrLock { tx_id, amount })
    }

    async fn verify_lock(
        &self,
        _own: &XmrKeys,
        _counterparty: &XmrPublicKeys,
        tx_id: &str,
        amount: u64,
    ) -> AnyResult<bool> {
        let state = self.state.lock().unwrap();
        if state.reject_locks {
            return Ok(false);
        }
        Ok(state.locks.get(tx_id).map_or(false, |locked| *locked >= amount))
    }

    async fn sweep(
        &self,
        _own: &XmrKeys,
        _counterparty: &XmrPublicKeys,
        counterparty_secret: &Hash,
        deposit_address: Option<&str>,
    ) -> AnyResult<String> {
        let mut state = self.state.lock().unwrap();
        state.sweeps.push(Sweep {
            counterparty_secret: *counterparty_secret,
            deposit_address: deposit_address.map(str::to_string),
        });
        Ok(format!("xmr-sweep-{}", state.sweeps.len()))
    }
}

// ============================================================================
// MOCK NET
// ============================================================================

#[derive(Default)]
struct NetState {
    advertised: usize,
    peers: Vec<PeerId>,
    offers: HashMap<PeerId, QueryResponse>,
    initiated: Vec<(PeerId, SendKeysMessage)>,
    sent: Vec<(Hash, Message)>,
    closed: Vec<Hash>,
    fail_initiate: bool,
}

/// Network that records traffic instead of sending it
#[derive(Default)]
pub struct MockNet {
    state: Mutex<NetState>,
}

impl MockNet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_peer(&self, peer: &str, offers: QueryResponse) {
        let mut state = self.state.lock().unwrap();
        state.peers.push(peer.to_string());
        state.offers.insert(peer.to_string(), offers);
    }

    /// Adds a peer that fails every query
    pub fn add_unreachable_peer(&self, peer: &str) {
        self.state.lock().unwrap().peers.push(peer.to_string());
    }

    pub fn fail_initiate(&self) {
        self.state.lock().unwrap().fail_initiate = true;
    }

    pub fn advertised(&self) -> usize {
        self.state.lock().unwrap().advertised
    }

    pub fn initiated(&self) -> Vec<(PeerId, SendKeysMessage)> {
        self.state.lock().unwrap().initiated.clone()
    }

    pub fn sent_messages(&self) -> Vec<(Hash, Message)> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn closed_streams(&self) -> Vec<Hash> {
        self.state.lock().unwrap().closed.clone()
    }
}

#[async_trait]
impl Net for MockNet {
    fn advertise(&self) {
        self.state.lock().unwrap().advertised += 1;
    }

    async fn discover(
        &self,
        _provides: ProvidesCoin,
        _search_time: Duration,
    ) -> AnyResult<Vec<PeerId>> {
        Ok(self.state.lock().unwrap().peers.clone())
    }

    async fn query(&self, peer: &PeerId) -> AnyResult<QueryResponse> {
        self.state
            .lock()
            .unwrap()
            .offers
            .get(peer)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("peer {} unreachable", peer))
    }

    async fn initiate(
        &self,
        peer: &PeerId,
        msg: SendKeysMessage,
        _swap: Arc<dyn SwapStateNet>,
    ) -> AnyResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_initiate {
            anyhow::bail!("failed to open stream to {}", peer);
        }
        state.initiated.push((peer.clone(), msg));
        Ok(())
    }

    async fn send_message(&self, id: Hash, msg: Message) -> AnyResult<()> {
        self.state.lock().unwrap().sent.push((id, msg));
        Ok(())
    }

    async fn close_protocol_stream(&self, id: Hash) {
        self.state.lock().unwrap().closed.push(id);
    }
}

// ============================================================================
// RECORDING RELAYER
// ============================================================================

/// Relayer that validates claims and applies them straight to a [`MockChain`]
pub struct RecordingRelayer {
    chain: Arc<MockChain>,
    submitted: Mutex<Vec<RelayClaimRequest>>,
}

impl RecordingRelayer {
    pub fn new(chain: Arc<MockChain>) -> Self {
        Self {
            chain,
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn submitted(&self) -> Vec<RelayClaimRequest> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl RelaySubmitter for RecordingRelayer {
    async fn submit(&self, request: &RelayClaimRequest) -> Result<Hash> {
        validate_relay_claim_request(request, &request.swap)?;
        self.submitted.lock().unwrap().push(request.clone());
        Ok(self.chain.apply_call(request.request.to, &request.request.data))
    }
}

// ============================================================================
// TEST NODES
// ============================================================================

/// One swap daemon's collaborators, wired to a shared chain
pub struct TestNode {
    pub backend: Arc<Backend>,
    pub chain: Arc<MockChain>,
    pub net: Arc<MockNet>,
    pub monero: MockMonero,
    pub manager: Arc<Manager>,
    pub relayer: Arc<RecordingRelayer>,
    pub key: EthKey,
}

pub fn test_timeouts() -> Timeouts {
    Timeouts {
        io: Duration::from_secs(1),
        tx: Duration::from_secs(2),
        poll_interval: Duration::from_millis(5),
    }
}

/// Builds a node using `key` on `chain` and the Monero network of `monero`
pub fn test_node(chain: Arc<MockChain>, monero: MockMonero, key: EthKey) -> TestNode {
    let net = Arc::new(MockNet::new());
    let manager = Arc::new(Manager::new());
    let relayer = Arc::new(RecordingRelayer::new(chain.clone()));
    let backend = Arc::new(Backend::new(BackendConfig {
        env: Environment::Development,
        chain: chain.clone(),
        monero: Arc::new(monero.clone()),
        net: net.clone(),
        swap_manager: manager.clone(),
        relayer: relayer.clone(),
        eth_key: key.clone(),
        contracts: contracts(),
        timeouts: test_timeouts(),
        swap_timeout: Duration::from_secs(SWAP_TIMEOUT_SECS),
    }));
    TestNode {
        backend,
        chain,
        net,
        monero,
        manager,
        relayer,
        key,
    }
}

/// Maker (claimer) and taker (owner) nodes on one chain and one Monero network
pub fn test_nodes() -> (TestNode, TestNode) {
    let chain = Arc::new(MockChain::new());
    let monero = MockMonero::new();
    let maker = test_node(chain.clone(), monero.connected(), maker_key());
    let taker = test_node(chain, monero.connected(), taker_key());
    (maker, taker)
}
