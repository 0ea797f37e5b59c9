//! Monero-side capability
//!
//! Each party holds a 32-byte secret per swap. Its keccak256 commitment is written
//! into the swap record, and the same secret is that party's share of the joint
//! Monero spend key. Revealing it on Ethereum (by claiming or refunding) therefore
//! hands the counterparty what it needs to sweep the locked XMR.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::commitment;
use crate::types::Hash;

/// Public half of a party's per-swap Monero keys, as sent to the counterparty
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XmrPublicKeys {
    pub public_spend_key: String,
    pub private_view_key: String,
}

/// A party's per-swap Monero key material
#[derive(Clone)]
pub struct XmrKeys {
    secret: Hash,
    pub public: XmrPublicKeys,
}

impl fmt::Debug for XmrKeys {
    // Never print key material.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmrKeys")
            .field("public", &self.public)
            .finish()
    }
}

impl XmrKeys {
    pub fn new(secret: Hash, public: XmrPublicKeys) -> Self {
        Self { secret, public }
    }

    /// Private spend key share; revealed on Ethereum by claiming or refunding
    pub fn secret(&self) -> &Hash {
        &self.secret
    }

    /// Commitment to [`XmrKeys::secret`] used in the swap record
    pub fn commitment(&self) -> Hash {
        commitment(&self.secret)
    }
}

/// XMR locked to the joint address of both parties
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XmrLock {
    pub tx_id: String,
    /// Piconero
    pub amount: u64,
}

/// Monero wallet operations the swap engine needs
#[async_trait]
pub trait MoneroClient: Send + Sync {
    /// Generates fresh per-swap keys
    async fn generate_keys(&self) -> anyhow::Result<XmrKeys>;

    /// Locks `amount` piconero to the joint address of `own` and `counterparty`
    async fn lock(
        &self,
        own: &XmrKeys,
        counterparty: &XmrPublicKeys,
        amount: u64,
    ) -> anyhow::Result<XmrLock>;

    /// Whether `tx_id` locked at least `amount` piconero to the joint address
    async fn verify_lock(
        &self,
        own: &XmrKeys,
        counterparty: &XmrPublicKeys,
        tx_id: &str,
        amount: u64,
    ) -> anyhow::Result<bool>;

    /// Sweeps the joint address using both secrets, returning the sweep transaction id
    ///
    /// `deposit_address` defaults to the wallet's primary address.
    async fn sweep(
        &self,
        own: &XmrKeys,
        counterparty: &XmrPublicKeys,
        counterparty_secret: &Hash,
        deposit_address: Option<&str>,
    ) -> anyhow::Result<String>;
}
