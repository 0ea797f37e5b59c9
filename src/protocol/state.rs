//! Swap State Machine
//!
//! Drives one swap from key exchange to a terminal status, for either role:
//!
//! 1. **Idle -> KeysExchanged**: both sides swap Monero public keys and commitments to
//!    their secrets.
//! 2. **KeysExchanged -> Locked**: the owner locks the ETH-side asset in the swap
//!    creator contract, the claimer verifies it and locks XMR, the owner verifies the
//!    XMR lock and marks the swap ready.
//! 3. **Locked -> Claimable**: before `timeout0` the claimer reveals its secret through a
//!    relayed claim. The owner reads the secret from the chain and sweeps the XMR.
//! 4. **Locked -> Refundable**: from `timeout0` (or earlier if the XMR lock never
//!    happened) the owner refunds, revealing its own secret so the claimer can sweep
//!    the XMR back.
//!
//! Any failure before funds are locked aborts the swap. All timeout decisions use
//! chain time; the poll cadence only decides when to look.

use ethereum_types::{Address, U256};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::abi::{self, Token};
use crate::chains::{with_deadline, SecretKind, Stage, TxRequest};
use crate::crypto::verify_secret;
use crate::error::{Result, SwapError};
use crate::monero::{XmrKeys, XmrLock, XmrPublicKeys};
use crate::protocol::backend::ProtocolBackend;
use crate::protocol::message::{
    Message, NotifyClaimed, NotifyEthLocked, NotifyXmrLock, SendKeysMessage,
};
use crate::relayer::create_relay_claim_request;
use crate::swap::{Info, StatusNotifier, SwapRecord};
use crate::txsender::{wait_for_receipt, TxSender};
use crate::types::{eth_to_wei, xmr_to_piconero, Hash, Offer, ProvidesCoin, Status};

/// Which side of the swap this node plays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Provides the ETH-side asset (XMR taker); may refund
    Owner,
    /// Provides XMR (XMR maker); claims via the relayer
    Claimer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    KeysExchanged,
    Locked,
    Claimable,
    Refundable,
    Completed(Status),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxKind {
    Approve,
    Lock,
    SetReady,
    Refund,
    Claim,
}

impl TxKind {
    fn label(&self) -> &'static str {
        match self {
            TxKind::Approve => "token approval",
            TxKind::Lock => "swap lock",
            TxKind::SetReady => "swap ready",
            TxKind::Refund => "refund",
            TxKind::Claim => "relayed claim",
        }
    }
}

/// Transaction submitted but not yet known to be mined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingTx {
    kind: TxKind,
    tx_hash: Hash,
}

#[derive(Debug, Clone)]
struct Counterparty {
    keys: XmrPublicKeys,
    commitment: Hash,
    eth_address: Address,
}

/// State of one swap, owned by its [`SwapHandle`](crate::protocol::handle::SwapHandle)
pub struct SwapState {
    backend: Arc<dyn ProtocolBackend>,
    role: Role,
    offer: Offer,
    state: State,
    provided_amount: f64,
    expected_amount: f64,
    keys: XmrKeys,
    counterparty: Option<Counterparty>,
    record: Option<SwapRecord>,
    sender: Arc<dyn TxSender>,
    xmr_lock: Option<XmrLock>,
    /// Claim the claimer reported as submitted
    claim_in_flight: Option<Hash>,
    pending: Option<PendingTx>,
    /// Owner's `newSwap` transaction, once submitted
    lock_tx: Option<Hash>,
    /// Owner has handed `NotifyEthLocked` to the counterparty
    eth_lock_announced: bool,
}

impl SwapState {
    /// Creates the owner side of a swap taking `offer`, and registers it
    ///
    /// # Arguments
    ///
    /// * `backend` - Shared protocol environment
    /// * `offer` - Offer being taken; its id becomes the swap identity
    /// * `provided_amount` - ETH-side amount this node provides, standard units
    /// * `sender` - Sender for lock, ready and refund transactions
    /// * `notifier` - Receives the terminal status
    ///
    /// # Returns
    ///
    /// * `Ok(SwapState)` - Swap registered in `Idle`
    /// * `Err(SwapError::Validation)` - Offer does not provide XMR or amount out of range
    /// * `Err(SwapError::DuplicateSwap)` - Offer already taken
    pub async fn new_owner(
        backend: Arc<dyn ProtocolBackend>,
        offer: Offer,
        provided_amount: f64,
        sender: Arc<dyn TxSender>,
        notifier: StatusNotifier,
    ) -> Result<Self> {
        if offer.provides != ProvidesCoin::Xmr {
            return Err(SwapError::Validation(format!(
                "offer {:#x} provides {}, expected XMR",
                offer.id, offer.provides
            )));
        }
        let expected_amount = offer.xmr_amount_for(provided_amount);
        if !offer.contains(expected_amount) {
            return Err(SwapError::Validation(format!(
                "{} XMR is outside the offer range {} - {}",
                expected_amount, offer.min_amount, offer.max_amount
            )));
        }

        let keys = generate_keys(backend.as_ref()).await?;
        let state = Self {
            backend,
            role: Role::Owner,
            offer,
            state: State::Idle,
            provided_amount,
            expected_amount,
            keys,
            counterparty: None,
            record: None,
            sender,
            xmr_lock: None,
            claim_in_flight: None,
            pending: None,
            lock_tx: None,
            eth_lock_announced: false,
        };
        state.register(ProvidesCoin::Eth, notifier).await?;
        Ok(state)
    }

    /// Creates the claimer side of a swap from the owner's key exchange message
    ///
    /// # Returns
    ///
    /// * `Ok(SwapState)` - Swap registered in `KeysExchanged`
    /// * `Err(SwapError::ProtocolViolation)` - Message does not fit the offer
    /// * `Err(SwapError::DuplicateSwap)` - Offer already taken
    pub async fn new_claimer(
        backend: Arc<dyn ProtocolBackend>,
        offer: Offer,
        msg: SendKeysMessage,
        notifier: StatusNotifier,
    ) -> Result<Self> {
        if msg.offer_id != offer.id {
            return Err(SwapError::ProtocolViolation(format!(
                "key exchange for offer {:#x}, expected {:#x}",
                msg.offer_id, offer.id
            )));
        }
        let provided_amount = offer.xmr_amount_for(msg.provided_amount);
        if !offer.contains(provided_amount) {
            return Err(SwapError::ProtocolViolation(format!(
                "{} XMR is outside the offer range {} - {}",
                provided_amount, offer.min_amount, offer.max_amount
            )));
        }
        if msg.eth_address.is_zero() {
            return Err(SwapError::ProtocolViolation(
                "counterparty ETH address is zero".to_string(),
            ));
        }

        let keys = generate_keys(backend.as_ref()).await?;
        if msg.commitment == keys.commitment() {
            return Err(SwapError::ProtocolViolation(
                "counterparty commitment equals ours".to_string(),
            ));
        }

        let sender: Arc<dyn TxSender> = Arc::new(crate::txsender::NodeSender::new(
            backend.chain(),
            backend.eth_key().address(),
        ));
        let state = Self {
            backend,
            role: Role::Claimer,
            offer,
            state: State::KeysExchanged,
            provided_amount,
            expected_amount: msg.provided_amount,
            keys,
            counterparty: Some(Counterparty {
                keys: msg.keys,
                commitment: msg.commitment,
                eth_address: msg.eth_address,
            }),
            record: None,
            sender,
            xmr_lock: None,
            claim_in_flight: None,
            pending: None,
            lock_tx: None,
            eth_lock_announced: false,
        };
        state.register(ProvidesCoin::Xmr, notifier).await?;
        Ok(state)
    }

    async fn register(&self, provides: ProvidesCoin, notifier: StatusNotifier) -> Result<()> {
        let info = Info::new(
            self.offer.id,
            provides,
            self.provided_amount,
            self.expected_amount,
            self.offer.exchange_rate,
            self.offer.eth_asset,
            notifier,
        );
        self.backend
            .swap_manager()
            .add_swap(Arc::new(info))
            .await?;
        info!(
            "Swap {:#x} started as {:?}: providing {} {}",
            self.offer.id, self.role, self.provided_amount, provides
        );
        Ok(())
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    /// Registry identity (the taken offer's id)
    pub fn id(&self) -> Hash {
        self.offer.id
    }

    /// Swap creator identity of the swap record, once it exists
    pub fn contract_swap_id(&self) -> Option<Hash> {
        self.record.as_ref().map(SwapRecord::id)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn record(&self) -> Option<&SwapRecord> {
        self.record.as_ref()
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.state, State::Completed(_))
    }

    pub fn sender(&self) -> Arc<dyn TxSender> {
        self.sender.clone()
    }

    fn own_eth_address(&self) -> Address {
        match self.role {
            Role::Owner => self.sender.from_address(),
            Role::Claimer => self.backend.eth_key().address(),
        }
    }

    /// Key exchange message committing to this node's secret
    pub fn send_keys_message(&self) -> SendKeysMessage {
        SendKeysMessage {
            offer_id: self.offer.id,
            provided_amount: self.provided_amount,
            keys: self.keys.public.clone(),
            commitment: self.keys.commitment(),
            eth_address: self.own_eth_address(),
        }
    }

    // ========================================================================
    // PEER MESSAGES
    // ========================================================================

    /// Handles a message from the counterparty
    ///
    /// # Returns
    ///
    /// * `Ok((response, done))` - Optional reply for the peer; `done` once terminal
    /// * `Err(SwapError::ProtocolViolation)` - Message does not fit the current state;
    ///   the swap has been aborted or has started refunding
    /// * `Err(_)` - Chain, Monero or timeout failure; the swap can be resumed by `poll`
    ///   or by redelivering the message
    pub async fn handle_protocol_message(&mut self, msg: Message) -> Result<(Option<Message>, bool)> {
        if let State::Completed(status) = self.state {
            return Err(SwapError::ProtocolViolation(format!(
                "swap {:#x} already completed ({}), got {}",
                self.id(),
                status,
                msg.kind()
            )));
        }
        debug!("Swap {:#x} received {} in {:?}", self.id(), msg.kind(), self.state);

        let result = match (self.role, self.state, msg) {
            (Role::Owner, State::Idle, Message::SendKeys(m)) => self.handle_send_keys(m).await,
            (Role::Owner, State::KeysExchanged, Message::SendKeys(m))
                if !self.eth_lock_announced && self.is_counterparty(&m) =>
            {
                info!("Swap {:#x} key exchange redelivered, resuming ETH lock", self.id());
                self.lock_and_announce().await.map(Some)
            }
            (Role::Owner, State::KeysExchanged, Message::NotifyXmrLock(m))
                if self.record.is_some() =>
            {
                self.handle_notify_xmr_lock(m).await
            }
            (Role::Owner, State::Locked, Message::NotifyClaimed(m)) => {
                info!("Swap {:#x} claim in flight: {:#x}", self.id(), m.tx_hash);
                self.claim_in_flight = Some(m.tx_hash);
                Ok(None)
            }
            (Role::Claimer, State::KeysExchanged, Message::NotifyEthLocked(m)) => {
                self.handle_notify_eth_locked(m).await
            }
            (_, state, msg) => Err(SwapError::ProtocolViolation(format!(
                "unexpected {} message in state {:?}",
                msg.kind(),
                state
            ))),
        };

        match result {
            Ok(response) => Ok((response, self.is_completed())),
            Err(e @ SwapError::ProtocolViolation(_)) => {
                error!("Swap {:#x} protocol violation: {}", self.id(), e);
                self.on_protocol_violation().await;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Owner: counterparty keys received, lock the ETH-side asset
    ///
    /// The swap stays in `KeysExchanged` if locking fails part way; `poll` or a
    /// redelivered `SendKeys` resumes it with the same swap record.
    async fn handle_send_keys(&mut self, msg: SendKeysMessage) -> Result<Option<Message>> {
        if msg.offer_id != self.offer.id {
            return Err(SwapError::ProtocolViolation(format!(
                "key exchange for offer {:#x}, expected {:#x}",
                msg.offer_id, self.offer.id
            )));
        }
        if !amounts_match(msg.provided_amount, self.expected_amount) {
            return Err(SwapError::ProtocolViolation(format!(
                "counterparty provides {} XMR, expected {}",
                msg.provided_amount, self.expected_amount
            )));
        }
        if msg.commitment == self.keys.commitment() || msg.eth_address.is_zero() {
            return Err(SwapError::ProtocolViolation(
                "invalid counterparty commitment or address".to_string(),
            ));
        }

        self.counterparty = Some(Counterparty {
            keys: msg.keys,
            commitment: msg.commitment,
            eth_address: msg.eth_address,
        });
        self.state = State::KeysExchanged;
        info!("Swap {:#x} keys exchanged", self.id());

        self.lock_and_announce().await.map(Some)
    }

    fn is_counterparty(&self, msg: &SendKeysMessage) -> bool {
        self.counterparty.as_ref().is_some_and(|c| {
            msg.offer_id == self.offer.id
                && msg.commitment == c.commitment
                && msg.eth_address == c.eth_address
        })
    }

    /// Owner: locks the ETH-side asset for the known counterparty and builds the
    /// lock announcement
    async fn lock_and_announce(&mut self) -> Result<Message> {
        let counterparty = self.require_counterparty()?;
        let (record, tx_hash) = self
            .lock_eth(counterparty.eth_address, counterparty.commitment)
            .await?;
        self.eth_lock_announced = true;
        let contracts = self.backend.contracts();
        Ok(Message::NotifyEthLocked(NotifyEthLocked {
            swap_creator: contracts.swap_creator,
            tx_hash,
            contract_swap_id: record.id(),
            swap: record,
        }))
    }

    async fn lock_eth(&mut self, claimer: Address, claim_commitment: Hash) -> Result<(SwapRecord, Hash)> {
        if let Some(record) = self.record.clone() {
            if let Some(tx_hash) = self.resume_lock(&record).await? {
                return Ok((record, tx_hash));
            }
            return self.send_lock(record).await;
        }

        let now = self.chain_time().await?;
        let timeout = self.backend.swap_timeout().as_secs();
        let value = eth_to_wei(self.provided_amount);
        let asset = self.offer.eth_asset;
        let swap_creator = self.backend.contracts().swap_creator;

        let record = SwapRecord::new(
            self.sender.from_address(),
            claimer,
            claim_commitment,
            self.keys.commitment(),
            now + timeout,
            now + 2 * timeout,
            asset,
            value,
            U256::from(rand::random::<u64>()),
        )?;

        if !asset.is_native() {
            let approve = abi::encode_call(
                "approve(address,uint256)",
                &[Token::Address(swap_creator), Token::Uint(value)],
            );
            self.send_tx(TxKind::Approve, asset.address(), U256::zero(), approve)
                .await?;
        }

        // Kept before sending so a lock that lands after a failed wait is still refundable.
        self.record = Some(record.clone());
        self.send_lock(record).await
    }

    /// Settles a lock of an earlier attempt; `None` if it never reached the chain
    async fn resume_lock(&mut self, record: &SwapRecord) -> Result<Option<Hash>> {
        if let Some(pending) = self.pending.filter(|p| p.kind == TxKind::Lock) {
            self.confirm(pending.tx_hash).await?;
            self.lock_tx = Some(pending.tx_hash);
            return Ok(Some(pending.tx_hash));
        }
        if self.swap_stage(record).await? == Stage::Invalid {
            return Ok(None);
        }
        // Zero when the submission timed out before the sender reported a hash.
        Ok(Some(self.lock_tx.unwrap_or_default()))
    }

    async fn send_lock(&mut self, record: SwapRecord) -> Result<(SwapRecord, Hash)> {
        let swap_creator = self.backend.contracts().swap_creator;
        let msg_value = if record.asset.is_native() {
            record.value
        } else {
            U256::zero()
        };
        let result = self
            .send_tx(TxKind::Lock, swap_creator, msg_value, record.new_swap_call_data())
            .await;
        if let Some(pending) = self.pending.filter(|p| p.kind == TxKind::Lock) {
            self.lock_tx = Some(pending.tx_hash);
        }
        let tx_hash = result?;
        self.lock_tx = Some(tx_hash);

        info!(
            "Swap {:#x} locked {} wei of {} as contract swap {:#x} (timeout0 {}, timeout1 {})",
            self.id(),
            record.value,
            record.asset,
            record.id(),
            record.timeout0,
            record.timeout1
        );
        Ok((record, tx_hash))
    }

    /// Owner: claimer reports its XMR lock; verify it and mark the swap ready
    async fn handle_notify_xmr_lock(&mut self, msg: NotifyXmrLock) -> Result<Option<Message>> {
        let record = self.require_record()?;
        let counterparty = self.require_counterparty()?;
        let amount = xmr_to_piconero(self.expected_amount);

        let verified = self
            .backend
            .monero()
            .verify_lock(&self.keys, &counterparty.keys, &msg.tx_id, amount)
            .await
            .map_err(|e| SwapError::Monero(format!("{:#}", e)))?;
        if !verified {
            return Err(SwapError::ProtocolViolation(format!(
                "XMR lock {} does not hold {} piconero for the joint address",
                msg.tx_id, amount
            )));
        }

        let swap_creator = self.backend.contracts().swap_creator;
        self.send_tx(
            TxKind::SetReady,
            swap_creator,
            U256::zero(),
            record.set_ready_call_data(),
        )
        .await?;

        self.xmr_lock = Some(XmrLock {
            tx_id: msg.tx_id,
            amount,
        });
        self.state = State::Locked;
        info!("Swap {:#x} locked on both chains", self.id());
        Ok(None)
    }

    /// Claimer: owner reports the ETH lock; verify it against the agreed terms and lock XMR
    async fn handle_notify_eth_locked(&mut self, msg: NotifyEthLocked) -> Result<Option<Message>> {
        let counterparty = self.require_counterparty()?;
        let record = msg.swap;
        record
            .validate()
            .map_err(|e| SwapError::ProtocolViolation(format!("invalid swap record: {}", e)))?;

        let contracts = self.backend.contracts();
        let checks = [
            (msg.contract_swap_id == record.id(), "contract swap id"),
            (msg.swap_creator == contracts.swap_creator, "swap creator"),
            (record.claimer == self.own_eth_address(), "claimer"),
            (record.owner == counterparty.eth_address, "owner"),
            (record.claim_commitment == self.keys.commitment(), "claim commitment"),
            (record.refund_commitment == counterparty.commitment, "refund commitment"),
            (record.asset == self.offer.eth_asset, "asset"),
            (record.value == eth_to_wei(self.expected_amount), "value"),
        ];
        if let Some((_, field)) = checks.iter().find(|(ok, _)| !ok) {
            return Err(SwapError::ProtocolViolation(format!(
                "swap record {} does not match the agreed terms",
                field
            )));
        }

        let now = self.chain_time().await?;
        if !record.in_claim_window(now) {
            return Err(SwapError::ProtocolViolation(format!(
                "claim window already closed (chain time {}, timeout0 {})",
                now, record.timeout0
            )));
        }
        let stage = self.swap_stage(&record).await?;
        if stage != Stage::Pending {
            return Err(SwapError::ProtocolViolation(format!(
                "swap {:#x} is in stage {:?} on-chain, expected Pending",
                record.id(),
                stage
            )));
        }

        let lock = self
            .backend
            .monero()
            .lock(
                &self.keys,
                &counterparty.keys,
                xmr_to_piconero(self.provided_amount),
            )
            .await
            .map_err(|e| SwapError::Monero(format!("{:#}", e)))?;

        info!(
            "Swap {:#x} locked {} piconero in {}",
            self.id(),
            lock.amount,
            lock.tx_id
        );
        let tx_id = lock.tx_id.clone();
        self.record = Some(record);
        self.xmr_lock = Some(lock);
        self.state = State::Locked;
        Ok(Some(Message::NotifyXmrLock(NotifyXmrLock { tx_id })))
    }

    async fn on_protocol_violation(&mut self) {
        let funds_locked = match self.role {
            Role::Owner => self.record.is_some(),
            Role::Claimer => self.xmr_lock.is_some(),
        };
        if !funds_locked {
            if let Err(e) = self.complete(Status::CompletedAbort).await {
                error!("Failed to abort swap {:#x}: {}", self.id(), e);
            }
            return;
        }
        if self.role == Role::Owner {
            if let Err(e) = self.refund().await {
                warn!("Swap {:#x} refund after protocol violation failed: {}", self.id(), e);
            }
        }
    }

    // ========================================================================
    // TIMER-DRIVEN PROGRESS
    // ========================================================================

    /// Advances the swap based on chain state; called periodically
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - Swap is completed
    /// * `Ok(false)` - Swap is still in progress
    /// * `Err(_)` - A step failed; it is attempted again on the next poll
    pub async fn poll(&mut self) -> Result<bool> {
        match (self.role, self.state) {
            (_, State::Completed(_)) => {}
            (Role::Owner, State::KeysExchanged) => self.poll_owner_keys_exchanged().await?,
            (Role::Owner, State::Locked) => self.poll_owner_locked().await?,
            (Role::Owner, State::Refundable) => {
                self.refund().await?;
            }
            (Role::Claimer, State::Locked | State::Claimable) => self.poll_claimer().await?,
            _ => {}
        }
        Ok(self.is_completed())
    }

    /// Owner: refunds once the window opens, otherwise finishes an interrupted lock
    async fn poll_owner_keys_exchanged(&mut self) -> Result<()> {
        if let Some(record) = self.record.clone() {
            if record.refund_window_open(self.chain_time().await?) {
                self.refund().await?;
                return Ok(());
            }
        }
        if self.eth_lock_announced {
            return Ok(());
        }

        info!("Swap {:#x} resuming ETH lock", self.id());
        let msg = self.lock_and_announce().await?;
        if let Err(e) = self.backend.net().send_message(self.id(), msg).await {
            self.eth_lock_announced = false;
            return Err(SwapError::Network(format!("{:#}", e)));
        }
        Ok(())
    }

    async fn poll_owner_locked(&mut self) -> Result<()> {
        if self.check_revealed_secret().await? {
            return Ok(());
        }
        let record = self.require_record()?;

        if let Some(claim_tx) = self.claim_in_flight {
            let chain = self.backend.chain();
            let receipt = with_deadline(
                self.backend.timeouts().io,
                "claim receipt",
                chain.transaction_receipt(claim_tx),
            )
            .await?;
            if matches!(receipt, Some(ref r) if !r.success) {
                warn!("Swap {:#x} claim {:#x} reverted", self.id(), claim_tx);
                self.claim_in_flight = None;
            }
        }

        let now = self.chain_time().await?;
        if !record.refund_window_open(now) {
            return Ok(());
        }
        // A claim in flight wins until halfway through the refund window.
        let claim_deadline = record.timeout0 + (record.timeout1 - record.timeout0) / 2;
        if self.claim_in_flight.is_some() && now < claim_deadline {
            debug!("Swap {:#x} deferring refund to in-flight claim", self.id());
            return Ok(());
        }

        info!("Swap {:#x} refund window open at chain time {}", self.id(), now);
        self.refund().await?;
        Ok(())
    }

    async fn poll_claimer(&mut self) -> Result<()> {
        if self.check_revealed_secret().await? {
            return Ok(());
        }

        if let Some(pending) = self.pending.filter(|p| p.kind == TxKind::Claim) {
            let chain = self.backend.chain();
            let receipt = with_deadline(
                self.backend.timeouts().io,
                "claim receipt",
                chain.transaction_receipt(pending.tx_hash),
            )
            .await?;
            match receipt {
                Some(r) if r.success => return self.complete(Status::CompletedSuccess).await,
                Some(_) => {
                    warn!("Swap {:#x} claim {:#x} reverted", self.id(), pending.tx_hash);
                    self.pending = None;
                    self.state = State::Locked;
                }
                None => return Ok(()),
            }
        }

        let record = self.require_record()?;
        let stage = self.swap_stage(&record).await?;
        let now = self.chain_time().await?;
        if stage == Stage::Ready && record.in_claim_window(now) {
            self.claim().await?;
        } else {
            debug!(
                "Swap {:#x} not claiming: stage {:?}, chain time {}, timeout0 {}",
                self.id(),
                stage,
                now,
                record.timeout0
            );
        }
        Ok(())
    }

    /// Looks for a claim or refund of the swap on-chain and completes accordingly
    async fn check_revealed_secret(&mut self) -> Result<bool> {
        let record = self.require_record()?;
        let chain = self.backend.chain();
        let swap_creator = self.backend.contracts().swap_creator;
        let revealed = with_deadline(
            self.backend.timeouts().io,
            "revealed secret",
            chain.revealed_secret(swap_creator, record.id()),
        )
        .await?;
        let Some(revealed) = revealed else {
            return Ok(false);
        };

        let commitment = match revealed.kind {
            SecretKind::Claim => &record.claim_commitment,
            SecretKind::Refund => &record.refund_commitment,
        };
        if !verify_secret(&revealed.secret, commitment) {
            return Err(SwapError::InvalidSecret);
        }

        match (self.role, revealed.kind) {
            (Role::Owner, SecretKind::Claim) => {
                info!("Swap {:#x} claimed in {:#x}", self.id(), revealed.tx_hash);
                self.sweep_xmr(&revealed.secret).await?;
                self.complete(Status::CompletedSuccess).await?;
            }
            (Role::Owner, SecretKind::Refund) => {
                self.complete(Status::CompletedRefund).await?;
            }
            (Role::Claimer, SecretKind::Claim) => {
                self.complete(Status::CompletedSuccess).await?;
            }
            (Role::Claimer, SecretKind::Refund) => {
                info!("Swap {:#x} refunded in {:#x}", self.id(), revealed.tx_hash);
                self.sweep_xmr(&revealed.secret).await?;
                self.complete(Status::CompletedRefund).await?;
            }
        }
        Ok(true)
    }

    async fn sweep_xmr(&self, counterparty_secret: &Hash) -> Result<()> {
        let counterparty = self.require_counterparty()?;
        let deposit_address = self.backend.xmr_deposit_address(&self.id());
        let tx_id = self
            .backend
            .monero()
            .sweep(
                &self.keys,
                &counterparty.keys,
                counterparty_secret,
                deposit_address.as_deref(),
            )
            .await
            .map_err(|e| SwapError::Monero(format!("{:#}", e)))?;
        info!("Swap {:#x} swept XMR in {}", self.id(), tx_id);
        Ok(())
    }

    // ========================================================================
    // CLAIM AND REFUND
    // ========================================================================

    /// Claimer: reveal the claim secret through the relayer
    async fn claim(&mut self) -> Result<()> {
        self.state = State::Claimable;
        let result = self.submit_claim().await;
        if result.is_err() && self.pending.is_none() && !self.is_completed() {
            self.state = State::Locked;
        }
        result
    }

    async fn submit_claim(&mut self) -> Result<()> {
        let record = self.require_record()?;
        let contracts = self.backend.contracts();
        let chain = self.backend.chain();

        let request = create_relay_claim_request(
            self.backend.eth_key(),
            chain.as_ref(),
            contracts.swap_creator,
            contracts.forwarder,
            &record,
            self.keys.secret(),
            self.backend.timeouts().io,
        )
        .await?;
        let tx_hash = self.backend.relayer().submit(&request).await?;
        self.pending = Some(PendingTx {
            kind: TxKind::Claim,
            tx_hash,
        });
        info!("Swap {:#x} claim relayed in {:#x}", self.id(), tx_hash);

        let notify = Message::NotifyClaimed(NotifyClaimed { tx_hash });
        if let Err(e) = self.backend.net().send_message(self.id(), notify).await {
            warn!("Failed to notify counterparty of claim for swap {:#x}: {:#}", self.id(), e);
        }

        self.confirm(tx_hash).await?;
        self.complete(Status::CompletedSuccess).await
    }

    /// Owner: refund the locked ETH-side asset
    ///
    /// Allowed once chain time reaches `timeout0`, or earlier while the swap is still
    /// `Pending` on-chain and the XMR lock was never verified.
    ///
    /// # Returns
    ///
    /// * `Ok(Hash)` - Refund transaction hash; the swap completed as refunded
    /// * `Err(SwapError::RefundWindowNotYetOpen)` - Too early to refund
    /// * `Err(SwapError::InvalidSwap)` - Swap already completed on-chain or never locked
    pub async fn refund(&mut self) -> Result<Hash> {
        if self.role != Role::Owner {
            return Err(SwapError::Validation(
                "only the swap owner can refund".to_string(),
            ));
        }
        if let State::Completed(status) = self.state {
            return Err(SwapError::InvalidSwap(format!(
                "swap {:#x} already completed ({})",
                self.id(),
                status
            )));
        }
        let record = self.record.clone().ok_or_else(|| {
            SwapError::InvalidSwap("no ETH has been locked for this swap".to_string())
        })?;

        if let Some(pending) = self.pending.filter(|p| p.kind == TxKind::Lock) {
            // A lock of unknown outcome must settle before deciding anything.
            self.confirm(pending.tx_hash).await.ok();
        }

        let stage = self.swap_stage(&record).await?;
        match stage {
            Stage::Invalid => {
                if self.pending.map(|p| p.kind) == Some(TxKind::Lock) {
                    return Err(SwapError::Timeout {
                        operation: TxKind::Lock.label().to_string(),
                        timeout: self.backend.timeouts().tx,
                    });
                }
                warn!("Swap {:#x} was never locked on-chain; aborting", self.id());
                self.complete(Status::CompletedAbort).await?;
                return Err(SwapError::InvalidSwap(format!(
                    "swap {:#x} was never locked on-chain",
                    record.id()
                )));
            }
            Stage::Completed => {
                self.check_revealed_secret().await?;
                return Err(SwapError::InvalidSwap(format!(
                    "swap {:#x} already completed on-chain",
                    record.id()
                )));
            }
            Stage::Pending | Stage::Ready => {}
        }

        let now = self.chain_time().await?;
        let never_ready = stage == Stage::Pending && self.xmr_lock.is_none();
        if !record.refund_window_open(now) && !never_ready {
            return Err(SwapError::RefundWindowNotYetOpen {
                now,
                timeout0: record.timeout0,
            });
        }

        self.state = State::Refundable;
        let swap_creator = self.backend.contracts().swap_creator;
        let tx_hash = self
            .send_tx(
                TxKind::Refund,
                swap_creator,
                U256::zero(),
                record.refund_call_data(self.keys.secret()),
            )
            .await?;
        info!("Swap {:#x} refunded in {:#x}", self.id(), tx_hash);
        self.complete(Status::CompletedRefund).await?;
        Ok(tx_hash)
    }

    // ========================================================================
    // TEARDOWN
    // ========================================================================

    /// Cleanup when the protocol stream closes unexpectedly
    ///
    /// Aborts if no funds are locked yet. An owner with ETH locked but no XMR lock
    /// moves to `Refundable`; otherwise the swap is left as it is. Either way the
    /// timeout watcher submits and confirms any refund, so no transaction is waited
    /// on here. Idempotent.
    pub async fn exit(&mut self) -> Result<()> {
        if self.is_completed() {
            return Ok(());
        }
        info!("Swap {:#x} exiting in {:?}", self.id(), self.state);

        match self.role {
            Role::Owner if self.record.is_some() => {
                let record = self.require_record()?;
                let stage = self.swap_stage(&record).await?;
                if stage != Stage::Ready && self.xmr_lock.is_none() {
                    self.state = State::Refundable;
                    info!("Swap {:#x} refund left to the timeout watcher", self.id());
                } else {
                    info!(
                        "Swap {:#x} refund deferred until timeout0 {}",
                        self.id(),
                        record.timeout0
                    );
                }
                Ok(())
            }
            Role::Claimer if self.xmr_lock.is_some() => Ok(()),
            _ => self.complete(Status::CompletedAbort).await,
        }
    }

    /// Records the terminal status exactly once, then tears down
    async fn complete(&mut self, status: Status) -> Result<()> {
        if self.is_completed() {
            return Ok(());
        }
        let id = self.id();
        let manager = self.backend.swap_manager();
        manager.update_status(&id, status).await?;
        manager.complete_ongoing_swap(&id).await?;
        self.state = State::Completed(status);
        self.pending = None;

        self.backend.net().close_protocol_stream(id).await;
        self.backend.clear_xmr_deposit_address(id);
        info!("Swap {:#x} completed: {}", id, status);
        Ok(())
    }

    // ========================================================================
    // CHAIN HELPERS
    // ========================================================================

    async fn chain_time(&self) -> Result<u64> {
        let chain = self.backend.chain();
        with_deadline(
            self.backend.timeouts().io,
            "block timestamp",
            chain.latest_block_timestamp(),
        )
        .await
    }

    async fn swap_stage(&self, record: &SwapRecord) -> Result<Stage> {
        let chain = self.backend.chain();
        with_deadline(
            self.backend.timeouts().io,
            "swap stage",
            chain.swap_stage(self.backend.contracts().swap_creator, record.id()),
        )
        .await
    }

    /// Sends a transaction and waits for it to be mined.
    ///
    /// An earlier submission of the same kind whose outcome is unknown is waited on
    /// instead of resubmitted.
    async fn send_tx(&mut self, kind: TxKind, to: Address, value: U256, data: Vec<u8>) -> Result<Hash> {
        if let Some(pending) = self.pending.filter(|p| p.kind == kind) {
            self.confirm(pending.tx_hash).await?;
            return Ok(pending.tx_hash);
        }

        let tx = TxRequest::new(self.sender.from_address(), to, value, data)
            .with_gas_price(self.backend.gas_price());
        let tx_hash = with_deadline(self.backend.timeouts().tx, kind.label(), self.sender.send(tx)).await?;
        self.pending = Some(PendingTx { kind, tx_hash });
        debug!("Swap {:#x} sent {} {:#x}", self.id(), kind.label(), tx_hash);

        self.confirm(tx_hash).await?;
        Ok(tx_hash)
    }

    /// Waits for `tx_hash`; a timeout leaves it pending
    async fn confirm(&mut self, tx_hash: Hash) -> Result<()> {
        let chain = self.backend.chain();
        let timeouts = self.backend.timeouts();
        let receipt = with_deadline(
            timeouts.tx,
            "transaction receipt",
            wait_for_receipt(chain.as_ref(), tx_hash, timeouts.poll_interval),
        )
        .await?;

        self.pending = None;
        if !receipt.success {
            return Err(SwapError::Chain(anyhow::anyhow!(
                "Transaction {:#x} reverted",
                tx_hash
            )));
        }
        Ok(())
    }

    fn require_record(&self) -> Result<SwapRecord> {
        self.record
            .clone()
            .ok_or_else(|| SwapError::Internal(format!("swap {:#x} has no swap record", self.id())))
    }

    fn require_counterparty(&self) -> Result<Counterparty> {
        self.counterparty.clone().ok_or_else(|| {
            SwapError::Internal(format!("swap {:#x} has no counterparty keys", self.id()))
        })
    }
}

async fn generate_keys(backend: &dyn ProtocolBackend) -> Result<XmrKeys> {
    backend
        .monero()
        .generate_keys()
        .await
        .map_err(|e| SwapError::Monero(format!("{:#}", e)))
}

fn amounts_match(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}
