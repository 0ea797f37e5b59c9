//! Swap protocol messages
//!
//! Wire encoding is the transport's concern; messages derive serde so any encoding
//! the transport picks can carry them.

use ethereum_types::Address;
use serde::{Deserialize, Serialize};

use crate::monero::XmrPublicKeys;
use crate::swap::SwapRecord;
use crate::types::Hash;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    SendKeys(SendKeysMessage),
    NotifyEthLocked(NotifyEthLocked),
    NotifyXmrLock(NotifyXmrLock),
    NotifyClaimed(NotifyClaimed),
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::SendKeys(_) => "SendKeys",
            Message::NotifyEthLocked(_) => "NotifyEthLocked",
            Message::NotifyXmrLock(_) => "NotifyXmrLock",
            Message::NotifyClaimed(_) => "NotifyClaimed",
        }
    }
}

/// Key exchange: commits to the sender's secret without revealing it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendKeysMessage {
    pub offer_id: Hash,
    /// Amount of the sender's coin it provides, standard units
    pub provided_amount: f64,
    pub keys: XmrPublicKeys,
    /// keccak256 of the sender's secret
    pub commitment: Hash,
    pub eth_address: Address,
}

/// Sent by the owner once the swap is locked in the swap creator contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifyEthLocked {
    pub swap_creator: Address,
    pub tx_hash: Hash,
    pub contract_swap_id: Hash,
    pub swap: SwapRecord,
}

/// Sent by the claimer once XMR is locked to the joint address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifyXmrLock {
    pub tx_id: String,
}

/// Sent by the claimer when its relayed claim is submitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifyClaimed {
    pub tx_hash: Hash,
}
