//! XMR taker
//!
//! The ETH-providing side. Takes offers found on the network, owns the resulting
//! swaps (locks ETH, may refund) and exposes the operator controls for them.

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

use crate::error::{Result, SwapError};
use crate::net::PeerId;
use crate::protocol::backend::ProtocolBackend;
use crate::protocol::handle::{run_timeout_watcher, SwapHandle, SwapStateNet};
use crate::protocol::state::{State, SwapState};
use crate::swap::{status_channel, StatusObserver};
use crate::txsender::{ExternalSender, NodeSender, TxSender};
use crate::types::{Hash, Offer, ProvidesCoin};

struct TakerSwap {
    handle: SwapHandle,
    external: Option<Arc<ExternalSender>>,
}

pub struct XmrTaker {
    backend: Arc<dyn ProtocolBackend>,
    /// Route lock and refund transactions through an external wallet
    use_external_sender: bool,
    /// Swaps until their timeout watcher sees them complete
    swaps: Arc<RwLock<HashMap<Hash, TakerSwap>>>,
    shutdown: watch::Receiver<bool>,
}

impl XmrTaker {
    pub fn new(
        backend: Arc<dyn ProtocolBackend>,
        use_external_sender: bool,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            backend,
            use_external_sender,
            swaps: Arc::new(RwLock::new(HashMap::new())),
            shutdown,
        }
    }

    pub fn provides(&self) -> ProvidesCoin {
        ProvidesCoin::Eth
    }

    /// Takes `offer` from `peer`, providing `provides_amount` of the offer's ETH asset
    ///
    /// # Arguments
    ///
    /// * `peer` - Maker advertising the offer
    /// * `provides_amount` - ETH-side amount to provide, standard units
    /// * `offer` - The offer being taken
    ///
    /// # Returns
    ///
    /// * `Ok((SwapHandle, StatusObserver))` - Swap started; the observer yields the
    ///   terminal status
    /// * `Err(SwapError::Validation)` - Amount outside the offer range
    /// * `Err(SwapError::DuplicateSwap)` - Offer already taken by this node
    /// * `Err(SwapError::Network)` - Peer could not be reached; the swap is aborted
    pub async fn initiate_protocol(
        &self,
        peer: &PeerId,
        provides_amount: f64,
        offer: Offer,
    ) -> Result<(SwapHandle, StatusObserver)> {
        let (notifier, observer) = status_channel();
        let eth_address = self.backend.eth_address();

        let external = self.use_external_sender.then(|| {
            Arc::new(ExternalSender::new(eth_address, self.backend.timeouts().tx))
        });
        let sender: Arc<dyn TxSender> = match &external {
            Some(external) => external.clone(),
            None => Arc::new(NodeSender::new(self.backend.chain(), eth_address)),
        };

        let state = SwapState::new_owner(
            self.backend.clone(),
            offer,
            provides_amount,
            sender,
            notifier,
        )
        .await?;
        let handle = SwapHandle::new(state);
        let id = handle.id();
        let msg = handle.send_keys_message().await;

        if let Err(e) = self
            .backend
            .net()
            .initiate(peer, msg, Arc::new(handle.clone()))
            .await
        {
            warn!("Failed to initiate swap {:#x} with {}: {:#}", id, peer, e);
            handle.exit().await?;
            return Err(SwapError::Network(format!("{:#}", e)));
        }

        self.swaps.write().await.insert(
            id,
            TakerSwap {
                handle: handle.clone(),
                external,
            },
        );
        self.watch_swap(handle.clone());
        info!("Initiated swap {:#x} with {}", id, peer);
        Ok((handle, observer))
    }

    /// Drives `handle` with the timeout watcher and forgets it once completed
    fn watch_swap(&self, handle: SwapHandle) {
        let swaps = self.swaps.clone();
        let watcher = run_timeout_watcher(
            handle.clone(),
            self.backend.timeouts().poll_interval,
            self.shutdown.clone(),
        );
        tokio::spawn(async move {
            if watcher.await {
                swaps.write().await.remove(&handle.id());
                debug!("Swap {:#x} released", handle.id());
            }
        });
    }

    /// Ids of the swaps this node currently drives
    pub async fn ongoing_swap_ids(&self) -> Vec<Hash> {
        self.swaps.read().await.keys().copied().collect()
    }

    /// Queries peers providing XMR for their offers
    ///
    /// Peers that fail to answer are skipped.
    pub async fn discover_offers(&self, search_time: Duration) -> Result<Vec<(PeerId, Offer)>> {
        let net = self.backend.net();
        let peers = net
            .discover(ProvidesCoin::Xmr, search_time)
            .await
            .map_err(|e| SwapError::Network(format!("{:#}", e)))?;

        let responses = join_all(peers.iter().map(|peer| net.query(peer))).await;
        let mut offers = Vec::new();
        for (peer, response) in peers.into_iter().zip(responses) {
            match response {
                Ok(response) => offers.extend(
                    response
                        .offers
                        .into_iter()
                        .filter(|offer| offer.provides == ProvidesCoin::Xmr)
                        .map(|offer| (peer.clone(), offer)),
                ),
                Err(e) => warn!("Failed to query {}: {:#}", peer, e),
            }
        }
        Ok(offers)
    }

    /// State of an ongoing swap this node owns
    pub async fn get_ongoing_swap_state(&self, id: &Hash) -> Option<State> {
        let handle = self.swaps.read().await.get(id).map(|s| s.handle.clone())?;
        let state = handle.state().await;
        match state {
            State::Completed(_) => None,
            _ => Some(state),
        }
    }

    /// Refunds swap `id` now; see [`SwapState::refund`]
    pub async fn refund(&self, id: &Hash) -> Result<Hash> {
        let handle = self
            .swaps
            .read()
            .await
            .get(id)
            .map(|s| s.handle.clone())
            .ok_or(SwapError::NotFound(*id))?;
        handle.refund().await
    }

    /// Claim window duration applied to swaps initiated from now on
    pub fn set_swap_timeout(&self, timeout: Duration) {
        self.backend.set_swap_timeout(timeout);
    }

    pub fn set_gas_price(&self, gas_price: u64) {
        self.backend.set_gas_price(gas_price);
    }

    /// External wallet sender of swap `id`, when external sending is enabled
    pub async fn external_sender(&self, id: &Hash) -> Option<Arc<ExternalSender>> {
        self.swaps.read().await.get(id).and_then(|s| s.external.clone())
    }
}
