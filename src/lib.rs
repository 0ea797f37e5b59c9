//! Swap Daemon Library
//!
//! Core of an ETH/XMR atomic swap daemon: the per-swap protocol state machine,
//! gasless claims relayed through an EIP-712 forwarder, and the registry of ongoing
//! and past swaps. Chain, Monero wallet and peer transport access are capability
//! traits so the engine can run against real backends or test doubles.

pub mod abi;
pub mod chains;
pub mod config;
pub mod crypto;
pub mod error;
pub mod monero;
pub mod net;
pub mod protocol;
pub mod relayer;
pub mod swap;
pub mod txsender;
pub mod types;

// Re-export commonly used types
pub use config::SwapdConfig;
pub use error::{Result, SwapError};
pub use swap::{Info, Manager, SwapManager, SwapRecord};
pub use types::{EthAsset, Hash, Offer, ProvidesCoin, Status};
