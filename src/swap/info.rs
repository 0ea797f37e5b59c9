//! Swap Info
//!
//! Registry entry for one swap, plus the single-shot terminal status notification.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

use crate::error::{Result, SwapError};
use crate::types::{EthAsset, Hash, ProvidesCoin, Status};

// ============================================================================
// STATUS NOTIFICATION
// ============================================================================

/// Write side of the terminal status slot. Accepts exactly one value.
///
/// Clones share the slot.
#[derive(Debug, Clone)]
pub struct StatusNotifier {
    sender: Arc<Mutex<Option<oneshot::Sender<Status>>>>,
}

/// Read side of the terminal status slot. Can be taken by one observer only.
#[derive(Debug)]
pub struct StatusObserver {
    receiver: oneshot::Receiver<Status>,
}

/// Creates a connected notifier/observer pair
pub fn status_channel() -> (StatusNotifier, StatusObserver) {
    let (sender, receiver) = oneshot::channel();
    (
        StatusNotifier {
            sender: Arc::new(Mutex::new(Some(sender))),
        },
        StatusObserver { receiver },
    )
}

impl StatusNotifier {
    /// Publishes the terminal status.
    ///
    /// Publishing twice, or publishing `Ongoing`, is an invariant violation.
    /// A dropped observer is not an error.
    pub fn publish(&self, status: Status) -> Result<()> {
        if status.is_ongoing() {
            return Err(SwapError::Internal(
                "cannot publish a non-terminal status".to_string(),
            ));
        }
        let sender = self
            .sender
            .lock()
            .map_err(|_| SwapError::Internal("status notifier lock poisoned".to_string()))?
            .take()
            .ok_or_else(|| SwapError::Internal("terminal status already published".to_string()))?;
        let _ = sender.send(status);
        Ok(())
    }

    pub fn is_published(&self) -> bool {
        self.sender.lock().map(|s| s.is_none()).unwrap_or(true)
    }
}

impl StatusObserver {
    /// Waits for the terminal status. `None` if the swap was dropped without completing.
    pub async fn wait(self) -> Option<Status> {
        self.receiver.await.ok()
    }

    /// Non-blocking check for the terminal status
    pub fn try_recv(&mut self) -> Option<Status> {
        self.receiver.try_recv().ok()
    }
}

// ============================================================================
// SWAP INFO
// ============================================================================

/// Read-only snapshot of a registry entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoSnapshot {
    pub id: Hash,
    pub provides: ProvidesCoin,
    pub provided_amount: f64,
    pub expected_amount: f64,
    pub exchange_rate: f64,
    pub eth_asset: EthAsset,
    pub status: Status,
    /// Unix timestamp when the swap was registered
    pub start_time: i64,
    /// Unix timestamp when the swap was completed
    pub end_time: Option<i64>,
}

#[derive(Debug)]
struct InfoState {
    status: Status,
    end_time: Option<i64>,
}

/// Registry entry for a swap.
///
/// The status is mutated only by the registry; everything else is immutable.
#[derive(Debug)]
pub struct Info {
    id: Hash,
    provides: ProvidesCoin,
    provided_amount: f64,
    expected_amount: f64,
    exchange_rate: f64,
    eth_asset: EthAsset,
    start_time: i64,
    state: Mutex<InfoState>,
    notifier: StatusNotifier,
}

impl Info {
    /// Creates an ongoing swap entry that publishes its terminal status to `notifier`
    pub fn new(
        id: Hash,
        provides: ProvidesCoin,
        provided_amount: f64,
        expected_amount: f64,
        exchange_rate: f64,
        eth_asset: EthAsset,
        notifier: StatusNotifier,
    ) -> Self {
        Self {
            id,
            provides,
            provided_amount,
            expected_amount,
            exchange_rate,
            eth_asset,
            start_time: chrono::Utc::now().timestamp(),
            state: Mutex::new(InfoState {
                status: Status::Ongoing,
                end_time: None,
            }),
            notifier,
        }
    }

    /// Rebuilds a completed entry, e.g. from persisted past swaps
    pub fn from_snapshot(snapshot: InfoSnapshot) -> Self {
        let (notifier, _observer) = status_channel();
        if !snapshot.status.is_ongoing() {
            let _ = notifier.publish(snapshot.status);
        }
        Self {
            id: snapshot.id,
            provides: snapshot.provides,
            provided_amount: snapshot.provided_amount,
            expected_amount: snapshot.expected_amount,
            exchange_rate: snapshot.exchange_rate,
            eth_asset: snapshot.eth_asset,
            start_time: snapshot.start_time,
            state: Mutex::new(InfoState {
                status: snapshot.status,
                end_time: snapshot.end_time,
            }),
            notifier,
        }
    }

    pub fn id(&self) -> Hash {
        self.id
    }

    pub fn provides(&self) -> ProvidesCoin {
        self.provides
    }

    pub fn status(&self) -> Status {
        self.lock_state().map(|s| s.status).unwrap_or(Status::Ongoing)
    }

    pub fn snapshot(&self) -> InfoSnapshot {
        let (status, end_time) = self
            .lock_state()
            .map(|s| (s.status, s.end_time))
            .unwrap_or((Status::Ongoing, None));
        InfoSnapshot {
            id: self.id,
            provides: self.provides,
            provided_amount: self.provided_amount,
            expected_amount: self.expected_amount,
            exchange_rate: self.exchange_rate,
            eth_asset: self.eth_asset,
            status,
            start_time: self.start_time,
            end_time,
        }
    }

    /// Sets the status; a terminal status is final.
    pub(crate) fn set_status(&self, status: Status) -> Result<()> {
        let mut state = self.lock_state()?;
        if state.status == status {
            return Ok(());
        }
        if !state.status.is_ongoing() {
            return Err(SwapError::Internal(format!(
                "swap {:#x} status is final ({}), cannot change to {}",
                self.id, state.status, status
            )));
        }
        state.status = status;
        Ok(())
    }

    /// Publishes the final status and stamps the end time.
    ///
    /// An entry completed while still `Ongoing` (torn down without a terminal
    /// transition) is recorded as aborted.
    pub(crate) fn finalize(&self) -> Result<Status> {
        let mut state = self.lock_state()?;
        if state.status.is_ongoing() {
            state.status = Status::CompletedAbort;
        }
        state.end_time = Some(chrono::Utc::now().timestamp());
        self.notifier.publish(state.status)?;
        Ok(state.status)
    }

    fn lock_state(&self) -> Result<std::sync::MutexGuard<'_, InfoState>> {
        self.state
            .lock()
            .map_err(|_| SwapError::Internal("swap info lock poisoned".to_string()))
    }
}
