//! Swap handles and the timeout watcher
//!
//! A [`SwapHandle`] serializes access to one [`SwapState`]: peer messages, the timer
//! and operator commands all go through the same lock, so the state machine only
//! ever sees one event at a time.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::protocol::message::{Message, SendKeysMessage};
use crate::protocol::state::{State, SwapState};
use crate::swap::SwapRecord;
use crate::types::Hash;

/// What the network layer drives on behalf of a swap
#[async_trait]
pub trait SwapStateNet: Send + Sync {
    fn id(&self) -> Hash;

    /// Handles an inbound protocol message; see [`SwapState::handle_protocol_message`]
    async fn handle_protocol_message(&self, msg: Message) -> Result<(Option<Message>, bool)>;

    /// Called when the protocol stream closes
    async fn exit(&self) -> Result<()>;
}

#[derive(Clone)]
pub struct SwapHandle {
    id: Hash,
    state: Arc<Mutex<SwapState>>,
}

impl std::fmt::Debug for SwapHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwapHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl SwapHandle {
    pub fn new(state: SwapState) -> Self {
        Self {
            id: state.id(),
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub async fn send_keys_message(&self) -> SendKeysMessage {
        self.state.lock().await.send_keys_message()
    }

    pub async fn poll(&self) -> Result<bool> {
        self.state.lock().await.poll().await
    }

    pub async fn state(&self) -> State {
        self.state.lock().await.state()
    }

    pub async fn contract_swap_id(&self) -> Option<Hash> {
        self.state.lock().await.contract_swap_id()
    }

    pub async fn record(&self) -> Option<SwapRecord> {
        self.state.lock().await.record().cloned()
    }

    pub async fn refund(&self) -> Result<Hash> {
        self.state.lock().await.refund().await
    }

    pub async fn is_completed(&self) -> bool {
        self.state.lock().await.is_completed()
    }
}

#[async_trait]
impl SwapStateNet for SwapHandle {
    fn id(&self) -> Hash {
        self.id
    }

    async fn handle_protocol_message(&self, msg: Message) -> Result<(Option<Message>, bool)> {
        self.state.lock().await.handle_protocol_message(msg).await
    }

    async fn exit(&self) -> Result<()> {
        self.state.lock().await.exit().await
    }
}

/// Polls `handle` every `interval` until the swap completes or `shutdown` flips
///
/// Shutdown is checked before each poll. Poll failures are logged and retried on
/// the next tick. Returns `true` if the swap completed.
pub async fn run_timeout_watcher(
    handle: SwapHandle,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> bool {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        if *shutdown.borrow() {
            info!("Timeout watcher for swap {:#x} shutting down", handle.id);
            return false;
        }
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("Timeout watcher for swap {:#x} shutting down", handle.id);
                    return false;
                }
            }
            _ = ticker.tick() => {
                match handle.poll().await {
                    Ok(true) => {
                        debug!("Timeout watcher for swap {:#x} done", handle.id);
                        return true;
                    }
                    Ok(false) => {}
                    Err(e) => warn!("Swap {:#x} poll failed: {}", handle.id, e),
                }
            }
        }
    }
}

/// Spawns [`run_timeout_watcher`] on the runtime
pub fn spawn_timeout_watcher(
    handle: SwapHandle,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<bool> {
    tokio::spawn(run_timeout_watcher(handle, interval, shutdown))
}
