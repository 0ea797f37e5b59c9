//! Swap protocol
//!
//! The per-swap state machine, the handle that serializes its events, and the two
//! role drivers built on top of it.

pub mod backend;
pub mod handle;
pub mod message;
pub mod state;
pub mod xmrmaker;
pub mod xmrtaker;

pub use backend::{Backend, BackendConfig, ContractAddresses, ProtocolBackend, Timeouts};
pub use handle::{run_timeout_watcher, spawn_timeout_watcher, SwapHandle, SwapStateNet};
pub use message::{Message, NotifyClaimed, NotifyEthLocked, NotifyXmrLock, SendKeysMessage};
pub use state::{Role, State, SwapState};
pub use xmrmaker::{OfferExtra, XmrMaker};
pub use xmrtaker::XmrTaker;
