//! Swap Record
//!
//! The immutable on-chain terms of one swap. Its identity is the keccak256 of its
//! ABI encoding, which is what the swap creator contract keys swaps by.

use ethereum_types::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::abi::{self, Token};
use crate::crypto::keccak256;
use crate::error::{Result, SwapError};
use crate::types::{EthAsset, Hash};

/// Solidity tuple type of the record, used in function signatures
pub const SWAP_TUPLE_TYPE: &str =
    "(address,address,bytes32,bytes32,uint256,uint256,address,uint256,uint256)";

/// Terms of one swap, mirrored into the swap creator contract when the owner locks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRecord {
    /// Address that locks (and may refund) the Ethereum-side asset
    pub owner: Address,
    /// Address entitled to claim the locked asset
    pub claimer: Address,
    pub claim_commitment: Hash,
    pub refund_commitment: Hash,
    /// End of the claim window, seconds since epoch
    pub timeout0: u64,
    /// End of the refund window, seconds since epoch
    pub timeout1: u64,
    pub asset: EthAsset,
    pub value: U256,
    pub nonce: U256,
}

impl SwapRecord {
    /// Creates a validated swap record
    ///
    /// # Returns
    ///
    /// * `Ok(SwapRecord)` - Terms are well formed
    /// * `Err(SwapError::Validation)` - `timeout0 >= timeout1`, zero value, zero
    ///   parties, or identical commitments
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        owner: Address,
        claimer: Address,
        claim_commitment: Hash,
        refund_commitment: Hash,
        timeout0: u64,
        timeout1: u64,
        asset: EthAsset,
        value: U256,
        nonce: U256,
    ) -> Result<Self> {
        let record = Self {
            owner,
            claimer,
            claim_commitment,
            refund_commitment,
            timeout0,
            timeout1,
            asset,
            value,
            nonce,
        };
        record.validate()?;
        Ok(record)
    }

    /// Re-checks the construction invariants, for records received from peers
    pub fn validate(&self) -> Result<()> {
        if self.timeout0 >= self.timeout1 {
            return Err(SwapError::Validation(format!(
                "timeout0 ({}) must be before timeout1 ({})",
                self.timeout0, self.timeout1
            )));
        }
        if self.value.is_zero() {
            return Err(SwapError::Validation("value must be positive".to_string()));
        }
        if self.owner.is_zero() || self.claimer.is_zero() {
            return Err(SwapError::Validation(
                "owner and claimer must be non-zero addresses".to_string(),
            ));
        }
        if self.claim_commitment == self.refund_commitment {
            return Err(SwapError::Validation(
                "claim and refund commitments must differ".to_string(),
            ));
        }
        Ok(())
    }

    /// Content hash of the record; recomputed on every call
    pub fn id(&self) -> Hash {
        keccak256(&abi::encode(&[self.to_token()]))
    }

    pub fn to_token(&self) -> Token {
        Token::Tuple(vec![
            Token::Address(self.owner),
            Token::Address(self.claimer),
            Token::FixedBytes(self.claim_commitment),
            Token::FixedBytes(self.refund_commitment),
            Token::Uint(U256::from(self.timeout0)),
            Token::Uint(U256::from(self.timeout1)),
            Token::Address(self.asset.address()),
            Token::Uint(self.value),
            Token::Uint(self.nonce),
        ])
    }

    /// Call data for `newSwap(swap)`, which locks `value` of `asset`
    pub fn new_swap_call_data(&self) -> Vec<u8> {
        abi::encode_call(&format!("newSwap({})", SWAP_TUPLE_TYPE), &[self.to_token()])
    }

    /// Call data for `setReady(swap)`, which the owner sends once the XMR lock is verified
    pub fn set_ready_call_data(&self) -> Vec<u8> {
        abi::encode_call(&format!("setReady({})", SWAP_TUPLE_TYPE), &[self.to_token()])
    }

    /// Call data for `claim(swap, secret)`
    pub fn claim_call_data(&self, secret: &Hash) -> Vec<u8> {
        abi::encode_call(
            &format!("claim({},bytes32)", SWAP_TUPLE_TYPE),
            &[self.to_token(), Token::FixedBytes(*secret)],
        )
    }

    /// Call data for `refund(swap, secret)`
    pub fn refund_call_data(&self, secret: &Hash) -> Vec<u8> {
        abi::encode_call(
            &format!("refund({},bytes32)", SWAP_TUPLE_TYPE),
            &[self.to_token(), Token::FixedBytes(*secret)],
        )
    }

    /// Whether `now` (chain time) falls in the claim window
    pub fn in_claim_window(&self, now: u64) -> bool {
        now < self.timeout0
    }

    /// Whether `now` (chain time) has reached the refund window
    pub fn refund_window_open(&self, now: u64) -> bool {
        now >= self.timeout0
    }
}
