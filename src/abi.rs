//! Solidity ABI encoding
//!
//! Covers the types the swap and forwarder contracts take: addresses, uint256,
//! bytes32, dynamic `bytes`, and (possibly dynamic) tuples.

use ethereum_types::{Address, H256, U256};

use crate::crypto::function_selector;

/// A value to be ABI encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Address(Address),
    Uint(U256),
    FixedBytes(H256),
    Bytes(Vec<u8>),
    Tuple(Vec<Token>),
}

impl Token {
    fn is_dynamic(&self) -> bool {
        match self {
            Token::Bytes(_) => true,
            Token::Tuple(tokens) => tokens.iter().any(Token::is_dynamic),
            _ => false,
        }
    }
}

/// `abi.encode(tokens...)`
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let head_len: usize = tokens.iter().map(head_size).sum();
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in tokens {
        if token.is_dynamic() {
            head.extend_from_slice(&uint_word(U256::from(head_len + tail.len())));
            tail.extend(encode_token(token));
        } else {
            head.extend(encode_token(token));
        }
    }

    head.extend(tail);
    head
}

/// Call data: four-byte selector of `signature` followed by `abi.encode(args...)`
pub fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut data = function_selector(signature).to_vec();
    data.extend(encode(args));
    data
}

/// Decodes a single uint256 return value
pub fn decode_uint(data: &[u8]) -> anyhow::Result<U256> {
    if data.len() < 32 {
        anyhow::bail!("Return data too short for uint256: {} bytes", data.len());
    }
    Ok(U256::from_big_endian(&data[..32]))
}

fn head_size(token: &Token) -> usize {
    match token {
        Token::Tuple(tokens) if !token.is_dynamic() => tokens.iter().map(head_size).sum(),
        _ => 32,
    }
}

fn encode_token(token: &Token) -> Vec<u8> {
    match token {
        Token::Address(address) => {
            let mut word = [0u8; 32];
            word[12..].copy_from_slice(address.as_bytes());
            word.to_vec()
        }
        Token::Uint(value) => uint_word(*value).to_vec(),
        Token::FixedBytes(value) => value.as_bytes().to_vec(),
        Token::Bytes(bytes) => {
            let mut out = uint_word(U256::from(bytes.len())).to_vec();
            out.extend_from_slice(bytes);
            let padding = (32 - bytes.len() % 32) % 32;
            out.extend(std::iter::repeat(0u8).take(padding));
            out
        }
        Token::Tuple(tokens) => encode(tokens),
    }
}

fn uint_word(value: U256) -> [u8; 32] {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    word
}
