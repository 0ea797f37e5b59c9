//! Gasless claims
//!
//! Construction and validation of relay claim requests, the forwarder's EIP-712
//! encoding, and relay submission.

pub mod claim_request;
pub mod forwarder;
pub mod submitter;

pub use claim_request::{
    create_relay_claim_request, gas_limit, validate_relay_claim_request, RelayClaimRequest,
    GAS_LIMIT_MARGIN_PERCENT,
};
pub use forwarder::ForwardRequest;
pub use submitter::{ForwarderRelayer, RelaySubmitter};
