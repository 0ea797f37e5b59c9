//! XMR maker
//!
//! The XMR-providing side. Keeps the offer book, answers takers' key exchange
//! messages by starting claimer swaps, and exposes their state.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

use crate::error::{Result, SwapError};
use crate::net::PeerId;
use crate::protocol::backend::ProtocolBackend;
use crate::protocol::handle::{run_timeout_watcher, SwapHandle, SwapStateNet};
use crate::protocol::message::SendKeysMessage;
use crate::protocol::state::{State, SwapState};
use crate::swap::{status_channel, StatusNotifier, StatusObserver};
use crate::types::{Hash, Offer, ProvidesCoin};

/// Returned by [`XmrMaker::make_offer`]; observes the swap that takes the offer
#[derive(Debug)]
pub struct OfferExtra {
    pub offer: Offer,
    pub status: StatusObserver,
}

pub struct XmrMaker {
    backend: Arc<dyn ProtocolBackend>,
    offers: RwLock<HashMap<Hash, (Offer, StatusNotifier)>>,
    /// Swaps until their timeout watcher sees them complete
    swaps: Arc<RwLock<HashMap<Hash, SwapHandle>>>,
    shutdown: watch::Receiver<bool>,
}

impl XmrMaker {
    pub fn new(backend: Arc<dyn ProtocolBackend>, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            backend,
            offers: RwLock::new(HashMap::new()),
            swaps: Arc::new(RwLock::new(HashMap::new())),
            shutdown,
        }
    }

    pub fn provides(&self) -> ProvidesCoin {
        ProvidesCoin::Xmr
    }

    /// Adds `offer` to the offer book and advertises it
    ///
    /// # Returns
    ///
    /// * `Ok(OfferExtra)` - Offer published
    /// * `Err(SwapError::Validation)` - Offer does not provide XMR or its id does not
    ///   match its terms
    /// * `Err(SwapError::DuplicateSwap)` - Offer already published or taken
    pub async fn make_offer(&self, offer: Offer) -> Result<OfferExtra> {
        if offer.provides != ProvidesCoin::Xmr {
            return Err(SwapError::Validation(format!(
                "maker offers must provide XMR, got {}",
                offer.provides
            )));
        }
        if offer.id != offer.compute_id() {
            return Err(SwapError::Validation(format!(
                "offer id {:#x} does not match its terms",
                offer.id
            )));
        }
        let manager = self.backend.swap_manager();
        if manager.get_ongoing_swap(&offer.id).await.is_some()
            || manager.get_past_swap(&offer.id).await.is_some()
        {
            return Err(SwapError::DuplicateSwap(offer.id));
        }

        let (notifier, observer) = status_channel();
        {
            let mut offers = self.offers.write().await;
            if offers.contains_key(&offer.id) {
                return Err(SwapError::DuplicateSwap(offer.id));
            }
            offers.insert(offer.id, (offer.clone(), notifier));
        }

        info!(
            "Offer {:#x} published: {} - {} XMR at {} {} per XMR",
            offer.id, offer.min_amount, offer.max_amount, offer.exchange_rate, offer.eth_asset
        );
        self.backend.net().advertise();
        Ok(OfferExtra {
            offer,
            status: observer,
        })
    }

    pub async fn get_offers(&self) -> Vec<Offer> {
        self.offers
            .read()
            .await
            .values()
            .map(|(offer, _)| offer.clone())
            .collect()
    }

    /// Withdraws offers; an empty `ids` withdraws all of them
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Offers removed
    /// * `Err(SwapError::NotFound)` - An id is not in the offer book; nothing is removed
    pub async fn clear_offers(&self, ids: &[Hash]) -> Result<()> {
        let mut offers = self.offers.write().await;
        if ids.is_empty() {
            info!("Clearing all {} offers", offers.len());
            offers.clear();
            return Ok(());
        }
        if let Some(missing) = ids.iter().find(|id| !offers.contains_key(*id)) {
            return Err(SwapError::NotFound(*missing));
        }
        for id in ids {
            offers.remove(id);
        }
        info!("Cleared {} offers", ids.len());
        Ok(())
    }

    /// State of an ongoing swap this node is claimer of
    pub async fn get_ongoing_swap_state(&self, id: &Hash) -> Option<State> {
        let handle = self.swaps.read().await.get(id).cloned()?;
        let state = handle.state().await;
        match state {
            State::Completed(_) => None,
            _ => Some(state),
        }
    }

    /// Ids of the swaps this node currently drives
    pub async fn ongoing_swap_ids(&self) -> Vec<Hash> {
        self.swaps.read().await.keys().copied().collect()
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

    /// Starts the claimer swap for a taker's key exchange message
    ///
    /// The offer leaves the offer book while the swap runs. If the swap cannot be
    /// started, the offer is published again.
    ///
    /// # Returns
    ///
    /// * `Ok((SwapHandle, SendKeysMessage))` - Swap started; the message is the reply
    ///   carrying this node's keys
    /// * `Err(SwapError::NotFound)` - No such offer
    /// * `Err(SwapError::ProtocolViolation)` - Message does not fit the offer
    pub async fn handle_initiate_message(
        &self,
        peer: &PeerId,
        msg: SendKeysMessage,
    ) -> Result<(SwapHandle, SendKeysMessage)> {
        let (offer, notifier) = self
            .offers
            .write()
            .await
            .remove(&msg.offer_id)
            .ok_or(SwapError::NotFound(msg.offer_id))?;

        let retained = notifier.clone();
        let state = match SwapState::new_claimer(self.backend.clone(), offer.clone(), msg, notifier)
            .await
        {
            Ok(state) => state,
            Err(e) => {
                warn!("Rejected initiation of offer {:#x} from {}: {}", offer.id, peer, e);
                self.offers
                    .write()
                    .await
                    .insert(offer.id, (offer, retained));
                return Err(e);
            }
        };

        let handle = SwapHandle::new(state);
        let reply = handle.send_keys_message().await;
        self.swaps.write().await.insert(handle.id(), handle.clone());
        self.watch_swap(handle.clone());
        info!("Swap {:#x} initiated by {}", handle.id(), peer);
        Ok((handle, reply))
    }
}
