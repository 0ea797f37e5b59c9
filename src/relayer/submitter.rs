//! Relay submission
//!
//! A [`RelaySubmitter`] takes a signed claim request and gets it executed. The relay
//! transport itself is pluggable; [`ForwarderRelayer`] is the in-process relayer that
//! pays for `execute` on the forwarder from its own account.

use async_trait::async_trait;
use ethereum_types::{Address, U256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::chains::{with_deadline, ChainClient, TxRequest};
use crate::error::{Result, SwapError};
use crate::relayer::claim_request::{validate_relay_claim_request, RelayClaimRequest};
use crate::txsender::TxSender;
use crate::types::Hash;

#[async_trait]
pub trait RelaySubmitter: Send + Sync {
    /// Submits the claim, returning the relayer's transaction hash
    async fn submit(&self, request: &RelayClaimRequest) -> Result<Hash>;
}

/// Relayer that submits claims through a forwarder it is configured for
pub struct ForwarderRelayer {
    chain: Arc<dyn ChainClient>,
    sender: Arc<dyn TxSender>,
    forwarder: Address,
    io_timeout: Duration,
}

impl ForwarderRelayer {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        sender: Arc<dyn TxSender>,
        forwarder: Address,
        io_timeout: Duration,
    ) -> Self {
        Self {
            chain,
            sender,
            forwarder,
            io_timeout,
        }
    }
}

#[async_trait]
impl RelaySubmitter for ForwarderRelayer {
    async fn submit(&self, request: &RelayClaimRequest) -> Result<Hash> {
        request.swap.validate()?;
        validate_relay_claim_request(request, &request.swap)?;

        if request.forwarder != self.forwarder {
            return Err(SwapError::Validation(format!(
                "request targets forwarder {:#x}, relayer uses {:#x}",
                request.forwarder, self.forwarder
            )));
        }
        let chain_id = with_deadline(self.io_timeout, "chain id", self.chain.chain_id()).await?;
        if request.chain_id != chain_id {
            warn!(
                "Rejecting relay claim for chain {} on chain {}",
                request.chain_id, chain_id
            );
            return Err(SwapError::Validation(format!(
                "request signed for chain {}, relayer is on chain {}",
                request.chain_id, chain_id
            )));
        }

        let tx_hash = with_deadline(
            self.io_timeout,
            "relay submission",
            self.sender.send(TxRequest::new(
                self.sender.from_address(),
                self.forwarder,
                U256::zero(),
                request.execute_call_data(),
            )),
        )
        .await?;

        info!(
            "Relayed claim for swap {:#x} in transaction {:#x}",
            request.swap_id(),
            tx_hash
        );
        Ok(tx_hash)
    }
}
