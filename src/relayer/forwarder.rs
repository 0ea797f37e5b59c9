//! Forwarder (EIP-712 meta-transactions)
//!
//! The forwarder contract checks a signed `ForwardRequest` and its replay-protection
//! nonce, then calls `to` with `data` on behalf of `from`. The signature covers the
//! EIP-712 digest of the request under the forwarder's domain, so a relayer cannot
//! change any field without invalidating it.

use ethereum_types::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::abi::{self, Token};
use crate::crypto::keccak256;
use crate::types::Hash;

pub const FORWARDER_NAME: &str = "Forwarder";
pub const FORWARDER_VERSION: &str = "1";

const EIP712_DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

pub const FORWARD_REQUEST_TYPE: &str = "ForwardRequest(address from,address to,uint256 value,uint256 gas,uint256 nonce,bytes data,uint256 validUntilTime)";

const EXECUTE_SIGNATURE: &str =
    "execute((address,address,uint256,uint256,uint256,bytes,uint256),bytes32,bytes32,bytes,bytes)";

/// A call the forwarder executes on behalf of `from`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardRequest {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub gas: U256,
    pub nonce: U256,
    #[serde(with = "crate::chains::hex_bytes")]
    pub data: Vec<u8>,
    /// Zero means no expiry
    pub valid_until_time: U256,
}

impl ForwardRequest {
    /// `hashStruct(ForwardRequest)`; the dynamic `data` field is hashed first
    pub fn struct_hash(&self) -> Hash {
        keccak256(&abi::encode(&[
            Token::FixedBytes(request_type_hash()),
            Token::Address(self.from),
            Token::Address(self.to),
            Token::Uint(self.value),
            Token::Uint(self.gas),
            Token::Uint(self.nonce),
            Token::FixedBytes(keccak256(&self.data)),
            Token::Uint(self.valid_until_time),
        ]))
    }

    pub fn to_token(&self) -> Token {
        Token::Tuple(vec![
            Token::Address(self.from),
            Token::Address(self.to),
            Token::Uint(self.value),
            Token::Uint(self.gas),
            Token::Uint(self.nonce),
            Token::Bytes(self.data.clone()),
            Token::Uint(self.valid_until_time),
        ])
    }
}

pub fn request_type_hash() -> Hash {
    keccak256(FORWARD_REQUEST_TYPE.as_bytes())
}

/// Domain separator of the forwarder deployed at `forwarder` on `chain_id`
pub fn domain_separator(chain_id: u64, forwarder: Address) -> Hash {
    keccak256(&abi::encode(&[
        Token::FixedBytes(keccak256(EIP712_DOMAIN_TYPE.as_bytes())),
        Token::FixedBytes(keccak256(FORWARDER_NAME.as_bytes())),
        Token::FixedBytes(keccak256(FORWARDER_VERSION.as_bytes())),
        Token::Uint(U256::from(chain_id)),
        Token::Address(forwarder),
    ]))
}

/// `keccak256("\x19\x01" || domainSeparator || hashStruct(request))`
pub fn typed_data_digest(domain_separator: &Hash, request: &ForwardRequest) -> Hash {
    let mut preimage = Vec::with_capacity(66);
    preimage.extend_from_slice(&[0x19, 0x01]);
    preimage.extend_from_slice(domain_separator.as_bytes());
    preimage.extend_from_slice(request.struct_hash().as_bytes());
    keccak256(&preimage)
}

/// Call data for `execute(req, domainSeparator, requestTypeHash, suffixData, sig)`
pub fn execute_call_data(
    request: &ForwardRequest,
    domain_separator: &Hash,
    signature: &[u8],
) -> Vec<u8> {
    abi::encode_call(
        EXECUTE_SIGNATURE,
        &[
            request.to_token(),
            Token::FixedBytes(*domain_separator),
            Token::FixedBytes(request_type_hash()),
            Token::Bytes(Vec::new()),
            Token::Bytes(signature.to_vec()),
        ],
    )
}
