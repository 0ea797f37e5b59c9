//! Transaction senders
//!
//! A [`TxSender`] gets an unsigned transaction onto the chain and returns its hash.
//! [`NodeSender`] uses an account unlocked in the node. [`ExternalSender`] hands the
//! transaction to an outside wallet and waits for it to report the hash back.

use anyhow::{Context, Result};
use async_trait::async_trait;
use ethereum_types::Address;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use crate::chains::{ChainClient, TxReceipt, TxRequest};
use crate::types::Hash;

#[async_trait]
pub trait TxSender: Send + Sync {
    /// Address transactions are sent from
    fn from_address(&self) -> Address;

    /// Submits a transaction without waiting for it to be mined.
    ///
    /// `tx.from` is replaced with [`TxSender::from_address`].
    async fn send(&self, tx: TxRequest) -> Result<Hash>;
}

/// Sends through `eth_sendTransaction` from a node-managed account
pub struct NodeSender {
    chain: Arc<dyn ChainClient>,
    from: Address,
}

impl NodeSender {
    pub fn new(chain: Arc<dyn ChainClient>, from: Address) -> Self {
        Self { chain, from }
    }
}

#[async_trait]
impl TxSender for NodeSender {
    fn from_address(&self) -> Address {
        self.from
    }

    async fn send(&self, mut tx: TxRequest) -> Result<Hash> {
        tx.from = self.from;
        self.chain.send_transaction(&tx).await
    }
}

/// Transaction queued for an external wallet
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalTx {
    /// Identifies the request when the wallet reports its hash
    pub id: u64,
    pub tx: TxRequest,
}

/// Sender for swaps whose funds live in an external wallet (e.g. a browser wallet).
///
/// Transactions are queued for the wallet; the operator relays each resulting hash
/// back through [`ExternalSender::submit_tx_hash`] with the request's id. Requests
/// and hashes of a `send` that already gave up are discarded.
pub struct ExternalSender {
    from: Address,
    hash_timeout: Duration,
    next_id: AtomicU64,
    /// Request the current `send` is waiting on
    awaiting: StdMutex<Option<u64>>,
    outgoing_tx: mpsc::Sender<ExternalTx>,
    outgoing_rx: Mutex<mpsc::Receiver<ExternalTx>>,
    incoming_tx: mpsc::Sender<(u64, Hash)>,
    incoming_rx: Mutex<mpsc::Receiver<(u64, Hash)>>,
}

impl ExternalSender {
    /// Creates a sender for `from` that waits up to `hash_timeout` for each hash
    pub fn new(from: Address, hash_timeout: Duration) -> Self {
        let (outgoing_tx, outgoing_rx) = mpsc::channel(1);
        let (incoming_tx, incoming_rx) = mpsc::channel(1);
        Self {
            from,
            hash_timeout,
            next_id: AtomicU64::new(1),
            awaiting: StdMutex::new(None),
            outgoing_tx,
            outgoing_rx: Mutex::new(outgoing_rx),
            incoming_tx,
            incoming_rx: Mutex::new(incoming_rx),
        }
    }

    fn is_awaited(&self, id: u64) -> bool {
        self.awaiting
            .lock()
            .map(|awaiting| *awaiting == Some(id))
            .unwrap_or(false)
    }

    fn set_awaited(&self, id: Option<u64>) {
        if let Ok(mut awaiting) = self.awaiting.lock() {
            *awaiting = id;
        }
    }

    /// Next transaction waiting to be signed by the external wallet
    ///
    /// Requests abandoned by a timed out `send` are skipped.
    pub async fn next_pending(&self) -> Option<ExternalTx> {
        let mut outgoing = self.outgoing_rx.lock().await;
        loop {
            let request = outgoing.recv().await?;
            if self.is_awaited(request.id) {
                return Some(request);
            }
            warn!("Dropping abandoned external transaction request {}", request.id);
        }
    }

    /// Reports the hash of the transaction the external wallet sent for request `id`
    pub async fn submit_tx_hash(&self, id: u64, tx_hash: Hash) -> Result<()> {
        if !self.is_awaited(id) {
            anyhow::bail!("External sender is not waiting for a hash for request {}", id);
        }
        self.incoming_tx
            .send((id, tx_hash))
            .await
            .context("External sender is no longer waiting for a transaction hash")
    }
}

#[async_trait]
impl TxSender for ExternalSender {
    fn from_address(&self) -> Address {
        self.from
    }

    async fn send(&self, mut tx: TxRequest) -> Result<Hash> {
        // Only one transaction is outstanding at a time.
        let mut incoming = self.incoming_rx.lock().await;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.set_awaited(Some(id));

        tx.from = self.from;
        let result = tokio::time::timeout(self.hash_timeout, async {
            self.outgoing_tx
                .send(ExternalTx { id, tx })
                .await
                .context("Failed to queue transaction for external wallet")?;
            loop {
                let (reply_id, tx_hash) = incoming
                    .recv()
                    .await
                    .context("External wallet channel closed")?;
                if reply_id == id {
                    return anyhow::Ok(tx_hash);
                }
                warn!(
                    "Ignoring hash {:#x} for abandoned external request {}",
                    tx_hash, reply_id
                );
            }
        })
        .await;
        self.set_awaited(None);

        let tx_hash = result.with_context(|| {
            format!(
                "No transaction hash from external wallet after {:?}",
                self.hash_timeout
            )
        })??;
        info!("External wallet sent transaction {:#x} for request {}", tx_hash, id);
        Ok(tx_hash)
    }
}

/// Polls for the receipt of `tx_hash` until it is mined, reverted or not.
///
/// Unbounded; callers apply their own deadline.
pub async fn wait_for_receipt(
    chain: &dyn ChainClient,
    tx_hash: Hash,
    poll_interval: Duration,
) -> Result<TxReceipt> {
    loop {
        if let Some(receipt) = chain.transaction_receipt(tx_hash).await? {
            return Ok(receipt);
        }
        tokio::time::sleep(poll_interval).await;
    }
}
