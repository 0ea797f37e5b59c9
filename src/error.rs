//! Error types
//!
//! `SwapError` is the protocol-level error returned by the registry, the relay claim
//! builder and the swap state machine. Infrastructure plumbing (JSON-RPC, config
//! loading) uses `anyhow` and is wrapped into `SwapError::Chain` at the seam.

use std::time::Duration;
use thiserror::Error;

use crate::types::Hash;

#[derive(Error, Debug)]
pub enum SwapError {
    /// Malformed swap record or offer, rejected at construction
    #[error("validation error: {0}")]
    Validation(String),

    /// Signing identity does not match the party entitled to act
    #[error("authorization error: {0}")]
    Authorization(String),

    #[error("secret does not match its commitment")]
    InvalidSecret,

    /// Message out of sequence or of the wrong type for the current state
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("timed out after {timeout:?} waiting for {operation}")]
    Timeout { operation: String, timeout: Duration },

    #[error("claim window closed: chain time {now} is not before timeout0 {timeout0}")]
    ClaimWindowClosed { now: u64, timeout0: u64 },

    #[error("refund window not yet open: chain time {now} is before timeout0 {timeout0}")]
    RefundWindowNotYetOpen { now: u64, timeout0: u64 },

    #[error("swap {0:#x} already exists")]
    DuplicateSwap(Hash),

    #[error("swap {0:#x} not found")]
    NotFound(Hash),

    /// On-chain swap is missing or not in a claimable stage
    #[error("invalid on-chain swap: {0}")]
    InvalidSwap(String),

    #[error("chain error: {0:#}")]
    Chain(#[from] anyhow::Error),

    #[error("monero error: {0}")]
    Monero(String),

    /// Peer discovery or protocol stream failure
    #[error("network error: {0}")]
    Network(String),

    /// Invariant violation; indicates a programming error
    #[error("internal error: {0}")]
    Internal(String),
}

impl SwapError {
    /// Whether the failed operation may be attempted again unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SwapError::Timeout { .. } | SwapError::Chain(_))
    }
}

pub type Result<T, E = SwapError> = std::result::Result<T, E>;
