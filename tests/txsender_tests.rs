//! Transaction sender tests

use ethereum_types::{Address, U256};
use std::sync::Arc;
use std::time::Duration;
use swapd::chains::{ChainClient, TxRequest};
use swapd::txsender::{wait_for_receipt, ExternalSender, NodeSender, TxSender};
use swapd::types::Hash;

#[path = "helpers.rs"]
mod test_helpers;
use test_helpers::{MockChain, DUMMY_FORWARDER};

const WALLET: Address = Address::repeat_byte(0x0a);

fn tx() -> TxRequest {
    TxRequest::new(Address::zero(), DUMMY_FORWARDER, U256::zero(), vec![1, 2, 3])
}

/// What is tested: NodeSender sends from its own address
/// Why: The swap owner recorded in the contract is the sending account
#[tokio::test]
async fn test_node_sender_overrides_from() {
    let chain = Arc::new(MockChain::new());
    let sender = NodeSender::new(chain.clone(), WALLET);

    let tx_hash = sender.send(tx()).await.unwrap();

    let sent = chain.sent_transactions();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].from, WALLET);
    let receipt = wait_for_receipt(chain.as_ref(), tx_hash, Duration::from_millis(5))
        .await
        .unwrap();
    assert!(receipt.success);
}

/// What is tested: ExternalSender hands the transaction out and returns the reported hash
/// Why: The external wallet signs and sends, the swap waits for its hash
#[tokio::test]
async fn test_external_sender_round_trip() {
    let sender = Arc::new(ExternalSender::new(WALLET, Duration::from_secs(2)));
    let wallet = sender.clone();
    let tx_hash = Hash::repeat_byte(0x55);

    let wallet_task = tokio::spawn(async move {
        let pending = wallet.next_pending().await.unwrap();
        wallet.submit_tx_hash(pending.id, tx_hash).await.unwrap();
        pending
    });

    assert_eq!(sender.send(tx()).await.unwrap(), tx_hash);
    let pending = wallet_task.await.unwrap();
    assert_eq!(pending.tx.from, WALLET);
    assert_eq!(pending.tx.data, vec![1, 2, 3]);
}

/// What is tested: ExternalSender gives up when no hash is reported in time
/// Why: An abandoned wallet prompt must not block the swap forever
#[tokio::test]
async fn test_external_sender_timeout() {
    let sender = Arc::new(ExternalSender::new(WALLET, Duration::from_millis(50)));
    let wallet = sender.clone();
    let drain = tokio::spawn(async move { wallet.next_pending().await });

    let err = sender.send(tx()).await.unwrap_err();
    assert!(err.to_string().contains("No transaction hash"));
    assert!(drain.await.unwrap().is_some());
}

/// What is tested: a hash reported after its send() timed out is not returned for the next transaction
/// Why: Confirming the wrong transaction would treat e.g. an approval as the swap lock
#[tokio::test]
async fn test_external_sender_ignores_late_hash() {
    let sender = Arc::new(ExternalSender::new(WALLET, Duration::from_millis(50)));
    let late_hash = Hash::repeat_byte(0xaa);
    let second_hash = Hash::repeat_byte(0xbb);

    assert!(sender.send(tx()).await.is_err());

    // The wallet only gets to the queue after the first request was abandoned
    let wallet = sender.clone();
    let waiting = tokio::spawn(async move { wallet.next_pending().await });
    let second = TxRequest::new(Address::zero(), DUMMY_FORWARDER, U256::zero(), vec![4, 5, 6]);
    let sending = {
        let sender = sender.clone();
        tokio::spawn(async move { sender.send(second).await })
    };
    let pending = waiting.await.unwrap().unwrap();
    assert_eq!(pending.tx.data, vec![4, 5, 6]);

    assert!(sender.submit_tx_hash(pending.id - 1, late_hash).await.is_err());
    sender.submit_tx_hash(pending.id, second_hash).await.unwrap();
    assert_eq!(sending.await.unwrap().unwrap(), second_hash);
}

/// What is tested: wait_for_receipt() polls until the transaction is mined
/// Why: Receipts appear only after the node includes the transaction
#[tokio::test]
async fn test_wait_for_receipt_polls() {
    let chain = Arc::new(MockChain::new());
    let unknown = Hash::repeat_byte(0x66);

    let waited = tokio::time::timeout(
        Duration::from_millis(50),
        wait_for_receipt(chain.as_ref(), unknown, Duration::from_millis(5)),
    )
    .await;
    assert!(waited.is_err());

    let client: Arc<dyn ChainClient> = chain.clone();
    let tx_hash = client.send_transaction(&tx()).await.unwrap();
    assert!(wait_for_receipt(client.as_ref(), tx_hash, Duration::from_millis(5))
        .await
        .is_ok());
}
