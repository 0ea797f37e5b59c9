//! Shared protocol types
//!
//! Identities are 32-byte keccak hashes, addresses are 20-byte Ethereum addresses.

use ethereum_types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::keccak256;
use crate::error::{Result, SwapError};

/// Content hash used for swap and offer identities
pub type Hash = H256;

/// Ethereum-side asset: the zero address denotes the native coin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EthAsset(pub Address);

impl EthAsset {
    pub const ETH: EthAsset = EthAsset(Address::zero());

    pub fn is_native(&self) -> bool {
        self.0.is_zero()
    }

    pub fn address(&self) -> Address {
        self.0
    }
}

impl fmt::Display for EthAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_native() {
            write!(f, "ETH")
        } else {
            write!(f, "{:#x}", self.0)
        }
    }
}

/// The coin a party provides in a swap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProvidesCoin {
    #[serde(rename = "ETH")]
    Eth,
    #[serde(rename = "XMR")]
    Xmr,
}

impl fmt::Display for ProvidesCoin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvidesCoin::Eth => write!(f, "ETH"),
            ProvidesCoin::Xmr => write!(f, "XMR"),
        }
    }
}

/// Swap status as reported by the registry. Terminal values never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Ongoing,
    CompletedSuccess,
    CompletedRefund,
    CompletedAbort,
}

impl Status {
    pub fn is_ongoing(&self) -> bool {
        matches!(self, Status::Ongoing)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Ongoing => "Ongoing",
            Status::CompletedSuccess => "Success",
            Status::CompletedRefund => "Refunded",
            Status::CompletedAbort => "Aborted",
        };
        write!(f, "{}", s)
    }
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Stagenet,
    Mainnet,
}

/// Wei per ether
pub const WEI_PER_ETH: f64 = 1e18;
/// Piconero per monero
pub const PICONERO_PER_XMR: f64 = 1e12;

/// Converts a standard-unit ETH (or 18-decimal token) amount to wei
pub fn eth_to_wei(amount: f64) -> U256 {
    U256::from((amount * WEI_PER_ETH) as u128)
}

/// Converts a standard-unit XMR amount to piconero
pub fn xmr_to_piconero(amount: f64) -> u64 {
    (amount * PICONERO_PER_XMR) as u64
}

/// An offer published by an XMR maker.
///
/// The offer's id is the content hash of its terms and becomes the registry identity
/// of the swap that takes it. Amounts are in standard units of the provided coin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: Hash,
    pub provides: ProvidesCoin,
    pub min_amount: f64,
    pub max_amount: f64,
    /// Units of ETH (or the ETH-side asset) per XMR
    pub exchange_rate: f64,
    pub eth_asset: EthAsset,
    pub nonce: u64,
}

impl Offer {
    pub fn new(
        provides: ProvidesCoin,
        min_amount: f64,
        max_amount: f64,
        exchange_rate: f64,
        eth_asset: EthAsset,
        nonce: u64,
    ) -> Result<Self> {
        if !(min_amount > 0.0) || min_amount > max_amount || !max_amount.is_finite() {
            return Err(SwapError::Validation(format!(
                "invalid offer amounts: min {} max {}",
                min_amount, max_amount
            )));
        }
        if !(exchange_rate > 0.0) || !exchange_rate.is_finite() {
            return Err(SwapError::Validation(format!(
                "invalid exchange rate {}",
                exchange_rate
            )));
        }

        let mut offer = Self {
            id: Hash::zero(),
            provides,
            min_amount,
            max_amount,
            exchange_rate,
            eth_asset,
            nonce,
        };
        offer.id = offer.compute_id();
        Ok(offer)
    }

    /// Hash over every term of the offer
    pub fn compute_id(&self) -> Hash {
        let mut preimage = Vec::with_capacity(64);
        preimage.push(match self.provides {
            ProvidesCoin::Eth => 0u8,
            ProvidesCoin::Xmr => 1u8,
        });
        preimage.extend_from_slice(&self.min_amount.to_be_bytes());
        preimage.extend_from_slice(&self.max_amount.to_be_bytes());
        preimage.extend_from_slice(&self.exchange_rate.to_be_bytes());
        preimage.extend_from_slice(self.eth_asset.0.as_bytes());
        preimage.extend_from_slice(&self.nonce.to_be_bytes());
        keccak256(&preimage)
    }

    /// ETH-side amount owed for `xmr` units of monero
    pub fn eth_amount_for(&self, xmr: f64) -> f64 {
        xmr * self.exchange_rate
    }

    /// Monero amount owed for `eth` units of the ETH-side asset
    pub fn xmr_amount_for(&self, eth: f64) -> f64 {
        eth / self.exchange_rate
    }

    pub fn contains(&self, amount: f64) -> bool {
        amount >= self.min_amount && amount <= self.max_amount
    }
}
