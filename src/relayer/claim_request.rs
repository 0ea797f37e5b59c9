//! Relay Claim Requests
//!
//! Builds the signed forwarder request that lets a claimer without gas funds have a
//! relayer execute `claim(swap, secret)` for them, and checks such requests on the
//! relayer side. Building has no on-chain side effects; submission is separate and
//! may be retried by whoever transmits the request.

use ethereum_types::{Address, U256};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::chains::{with_deadline, ChainClient, TxRequest};
use crate::crypto::{recover_address, verify_secret, EthKey};
use crate::error::{Result, SwapError};
use crate::relayer::forwarder::{self, ForwardRequest};
use crate::swap::SwapRecord;
use crate::types::Hash;

/// Extra gas on top of the simulated claim, as a percentage
pub const GAS_LIMIT_MARGIN_PERCENT: u64 = 20;

/// Gas limit for a claim whose simulation used `estimate`, including the margin.
/// Does not overflow for any estimate.
pub fn gas_limit(estimate: u64) -> U256 {
    U256::from(estimate) * U256::from(100 + GAS_LIMIT_MARGIN_PERCENT) / U256::from(100)
}

/// A claim authorized by the claimer, ready for a relayer to submit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayClaimRequest {
    pub swap: SwapRecord,
    pub secret: Hash,
    pub claimer: Address,
    pub swap_creator: Address,
    pub forwarder: Address,
    pub chain_id: u64,
    pub request: ForwardRequest,
    /// `r || s || v` over the EIP-712 digest of `request`
    #[serde(with = "crate::chains::hex_bytes")]
    pub signature: Vec<u8>,
}

impl RelayClaimRequest {
    /// Contract swap id of the claimed swap
    pub fn swap_id(&self) -> Hash {
        self.swap.id()
    }

    pub fn domain_separator(&self) -> Hash {
        forwarder::domain_separator(self.chain_id, self.forwarder)
    }

    pub fn digest(&self) -> Hash {
        forwarder::typed_data_digest(&self.domain_separator(), &self.request)
    }

    /// Address that signed the request
    pub fn signer(&self) -> anyhow::Result<Address> {
        recover_address(&self.digest(), &self.signature)
    }

    /// Call data for the forwarder's `execute`
    pub fn execute_call_data(&self) -> Vec<u8> {
        forwarder::execute_call_data(&self.request, &self.domain_separator(), &self.signature)
    }
}

/// Creates a signed relay claim request for `swap`
///
/// The key is checked against the claimer and the secret against the claim
/// commitment before any chain I/O. Each chain query is bounded by `io_timeout`.
///
/// # Arguments
///
/// * `key` - Claimer's signing key
/// * `chain` - Chain access for nonce, stage, time and gas queries
/// * `swap_creator` - Swap creator contract address
/// * `forwarder` - Forwarder contract address
/// * `swap` - Swap to claim
/// * `secret` - Claim secret
/// * `io_timeout` - Deadline for each chain query
///
/// # Returns
///
/// * `Ok(RelayClaimRequest)` - Signed request whose signer is the claimer
/// * `Err(SwapError::Authorization)` - Key does not belong to the claimer
/// * `Err(SwapError::InvalidSecret)` - Secret does not open the claim commitment
/// * `Err(SwapError::InvalidSwap)` - Swap unknown on-chain or already completed
/// * `Err(SwapError::ClaimWindowClosed)` - Chain time reached `timeout0`
/// * `Err(SwapError::Timeout)` / `Err(SwapError::Chain)` - Chain query failed
#[allow(clippy::too_many_arguments)]
pub async fn create_relay_claim_request(
    key: &EthKey,
    chain: &dyn ChainClient,
    swap_creator: Address,
    forwarder: Address,
    swap: &SwapRecord,
    secret: &Hash,
    io_timeout: Duration,
) -> Result<RelayClaimRequest> {
    let claimer = key.address();
    if claimer != swap.claimer {
        return Err(SwapError::Authorization(
            "signing key does not match claimer".to_string(),
        ));
    }
    if !verify_secret(secret, &swap.claim_commitment) {
        return Err(SwapError::InvalidSecret);
    }

    let swap_id = swap.id();
    let chain_id = with_deadline(io_timeout, "chain id", chain.chain_id()).await?;
    let nonce = with_deadline(
        io_timeout,
        "forwarder nonce",
        chain.forwarder_nonce(forwarder, claimer),
    )
    .await?;

    let stage = with_deadline(
        io_timeout,
        "swap stage",
        chain.swap_stage(swap_creator, swap_id),
    )
    .await?;
    if !stage.is_claimable() {
        return Err(SwapError::InvalidSwap(format!(
            "swap {:#x} is not claimable in stage {:?}",
            swap_id, stage
        )));
    }

    let now = with_deadline(io_timeout, "block timestamp", chain.latest_block_timestamp()).await?;
    if !swap.in_claim_window(now) {
        return Err(SwapError::ClaimWindowClosed {
            now,
            timeout0: swap.timeout0,
        });
    }

    let data = swap.claim_call_data(secret);
    let estimate = with_deadline(
        io_timeout,
        "claim gas estimate",
        chain.estimate_gas(&TxRequest::new(claimer, swap_creator, U256::zero(), data.clone())),
    )
    .await?;
    let gas = gas_limit(estimate);
    debug!("Claim gas estimate {} (limit {})", estimate, gas);

    let request = ForwardRequest {
        from: claimer,
        to: swap_creator,
        value: U256::zero(),
        gas,
        nonce,
        data,
        valid_until_time: U256::from(swap.timeout0),
    };

    let domain_separator = forwarder::domain_separator(chain_id, forwarder);
    let digest = forwarder::typed_data_digest(&domain_separator, &request);
    let signature = key
        .sign_digest(&digest)
        .map_err(|e| SwapError::Internal(format!("failed to sign relay claim: {:#}", e)))?;

    let claim_request = RelayClaimRequest {
        swap: swap.clone(),
        secret: *secret,
        claimer,
        swap_creator,
        forwarder,
        chain_id,
        request,
        signature,
    };

    let signer = claim_request
        .signer()
        .map_err(|e| SwapError::Internal(format!("failed to recover relay claim signer: {:#}", e)))?;
    if signer != claimer {
        return Err(SwapError::Internal(format!(
            "relay claim signature recovers to {:#x}, expected {:#x}",
            signer, claimer
        )));
    }

    info!(
        "Created relay claim request for swap {:#x} (forwarder nonce {}, gas {})",
        swap_id, nonce, gas
    );
    Ok(claim_request)
}

/// Checks a relay claim request against the swap it claims
///
/// Run by the relayer before paying for `execute`; it needs no trust in the sender.
///
/// # Returns
///
/// * `Ok(())` - Request authorizes exactly `claim(swap, secret)` by the claimer
/// * `Err(SwapError::Authorization)` - Signer or claimer mismatch
/// * `Err(SwapError::InvalidSecret)` - Secret does not open the claim commitment
/// * `Err(SwapError::Validation)` - Request does not target this swap's claim
pub fn validate_relay_claim_request(request: &RelayClaimRequest, swap: &SwapRecord) -> Result<()> {
    if request.claimer != swap.claimer {
        return Err(SwapError::Authorization(
            "request claimer does not match swap claimer".to_string(),
        ));
    }
    let signer = request
        .signer()
        .map_err(|e| SwapError::Authorization(format!("invalid signature: {:#}", e)))?;
    if signer != request.claimer {
        return Err(SwapError::Authorization(
            "signature does not match claimer".to_string(),
        ));
    }
    if request.swap != *swap {
        return Err(SwapError::Validation(
            "request swap does not match expected swap".to_string(),
        ));
    }
    if !verify_secret(&request.secret, &swap.claim_commitment) {
        return Err(SwapError::InvalidSecret);
    }

    let forward = &request.request;
    if forward.from != request.claimer || forward.to != request.swap_creator {
        return Err(SwapError::Validation(
            "forward request must be sent from the claimer to the swap creator".to_string(),
        ));
    }
    if !forward.value.is_zero() {
        return Err(SwapError::Validation(
            "forward request must not carry value".to_string(),
        ));
    }
    if forward.data != swap.claim_call_data(&request.secret) {
        return Err(SwapError::Validation(
            "forward request data is not a claim of this swap".to_string(),
        ));
    }
    Ok(())
}
