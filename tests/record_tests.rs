//! Unit tests for the swap record

use ethereum_types::{Address, U256};
use swapd::crypto::{commitment, function_selector};
use swapd::swap::record::SWAP_TUPLE_TYPE;
use swapd::swap::SwapRecord;
use swapd::types::{EthAsset, Hash};
use swapd::SwapError;

#[path = "helpers.rs"]
mod test_helpers;
use test_helpers::{create_test_swap, dummy_secret, DUMMY_OWNER, START_TIME};

const CLAIMER: Address = Address::repeat_byte(0x0b);

// ============================================================================
// CONSTRUCTION
// ============================================================================

/// What is tested: SwapRecord::new() accepts well-formed terms
/// Why: The owner builds the record it locks from these terms
#[test]
fn test_new_record_success() {
    let record = create_test_swap(CLAIMER);
    assert_eq!(record.owner, DUMMY_OWNER);
    assert_eq!(record.claimer, CLAIMER);
    assert_eq!(record.timeout0, START_TIME + 1800);
    assert_eq!(record.timeout1, START_TIME + 3600);
    assert_eq!(record.value, U256::exp10(18));
}

/// What is tested: SwapRecord::new() rejects timeout0 >= timeout1
/// Why: An empty or inverted refund window would let either party race the other
#[test]
fn test_new_record_rejects_inverted_timeouts() {
    for (t0, t1) in [(START_TIME + 10, START_TIME + 10), (START_TIME + 20, START_TIME + 10)] {
        let result = SwapRecord::new(
            DUMMY_OWNER,
            CLAIMER,
            commitment(&dummy_secret()),
            commitment(&Hash::repeat_byte(0x02)),
            t0,
            t1,
            EthAsset::ETH,
            U256::one(),
            U256::one(),
        );
        assert!(matches!(result, Err(SwapError::Validation(_))));
    }
}

/// What is tested: SwapRecord::new() rejects a zero value
/// Why: A swap of nothing can be claimed for free and proves nothing
#[test]
fn test_new_record_rejects_zero_value() {
    let mut record = create_test_swap(CLAIMER);
    record.value = U256::zero();
    let err = record.validate().unwrap_err();
    assert!(matches!(err, SwapError::Validation(ref m) if m.contains("value")));
}

/// What is tested: validate() rejects equal claim and refund commitments
/// Why: Both secrets must differ or revealing one would reveal the other
#[test]
fn test_record_rejects_equal_commitments() {
    let mut record = create_test_swap(CLAIMER);
    record.refund_commitment = record.claim_commitment;
    assert!(matches!(record.validate(), Err(SwapError::Validation(_))));
}

/// What is tested: validate() rejects a zero claimer
/// Why: Nobody could ever claim, so the owner would be forced to refund
#[test]
fn test_record_rejects_zero_claimer() {
    let mut record = create_test_swap(CLAIMER);
    record.claimer = Address::zero();
    assert!(matches!(record.validate(), Err(SwapError::Validation(_))));
}

// ============================================================================
// IDENTITY
// ============================================================================

/// What is tested: id() is deterministic and depends on every field
/// Why: The contract keys swaps by this hash; any drift loses track of the swap
#[test]
fn test_record_id_content_addressed() {
    let record = create_test_swap(CLAIMER);
    assert_eq!(record.id(), create_test_swap(CLAIMER).id());

    let mut other_nonce = record.clone();
    other_nonce.nonce = U256::from(2);
    assert_ne!(record.id(), other_nonce.id());

    let mut other_timeout = record.clone();
    other_timeout.timeout1 += 1;
    assert_ne!(record.id(), other_timeout.id());
}

/// What is tested: id() is keccak256 of the 288-byte static tuple encoding
/// Why: This must match `keccak256(abi.encode(swap))` computed on-chain
#[test]
fn test_record_id_matches_abi_encoding() {
    let record = create_test_swap(CLAIMER);
    let encoded = swapd::abi::encode(&[record.to_token()]);
    assert_eq!(encoded.len(), 9 * 32);
    assert_eq!(record.id(), swapd::crypto::keccak256(&encoded));
}

/// What is tested: records survive a JSON round trip unchanged
/// Why: Records are sent to peers and handed to the relay_claim tool as JSON
#[test]
fn test_record_json_round_trip_keeps_id() {
    let record = create_test_swap(CLAIMER);
    let json = serde_json::to_string(&record).unwrap();
    let decoded: SwapRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, record);
    assert_eq!(decoded.id(), record.id());
}

// ============================================================================
// CALL DATA AND WINDOWS
// ============================================================================

/// What is tested: contract call data carries the right selectors and arguments
/// Why: A wrong selector silently calls a different contract function
#[test]
fn test_record_call_data() {
    let record = create_test_swap(CLAIMER);
    let secret = dummy_secret();

    let new_swap = record.new_swap_call_data();
    assert_eq!(
        new_swap[..4],
        function_selector(&format!("newSwap({})", SWAP_TUPLE_TYPE))
    );
    assert_eq!(new_swap.len(), 4 + 9 * 32);

    let set_ready = record.set_ready_call_data();
    assert_eq!(
        set_ready[..4],
        function_selector(&format!("setReady({})", SWAP_TUPLE_TYPE))
    );

    let claim = record.claim_call_data(&secret);
    assert_eq!(
        claim[..4],
        function_selector(&format!("claim({},bytes32)", SWAP_TUPLE_TYPE))
    );
    assert_eq!(&claim[4 + 9 * 32..], secret.as_bytes());

    let refund = record.refund_call_data(&secret);
    assert_ne!(claim[..4], refund[..4]);
    assert_eq!(claim[4..], refund[4..]);
}

/// What is tested: claim and refund windows split at timeout0
/// Why: Exactly one of claim and refund must be possible at any chain time
#[test]
fn test_record_windows() {
    let record = create_test_swap(CLAIMER);
    let t0 = record.timeout0;

    assert!(record.in_claim_window(t0 - 1));
    assert!(!record.refund_window_open(t0 - 1));

    assert!(!record.in_claim_window(t0));
    assert!(record.refund_window_open(t0));

    assert!(record.refund_window_open(record.timeout1 + 1));
}
