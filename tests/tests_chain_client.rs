use std::sync::Arc;
use std::time::{Duration, Instant};

use ethers::types::U256;

use settlement_ledger::chain::{ChainClient, MockChainClient, ReceiptMode};
use settlement_ledger::LedgerError;

const TO: &str = "0x000000000000000000000000000000000000dEaD";

#[tokio::test]
async fn test_await_confirmation_times_out_after_window() {
    let mock = MockChainClient::new().with_poll_interval(Duration::from_millis(100));
    mock.set_receipt_mode(ReceiptMode::Never);
    let hash = mock.submit(TO, U256::one(), vec![]).await.unwrap();

    let started = Instant::now();
    let err = mock
        .await_confirmation(&hash, Duration::from_secs(1))
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    match err {
        LedgerError::ConfirmationTimeout { tx_hash, waited_ms } => {
            assert_eq!(tx_hash, hash);
            assert!(waited_ms >= 900, "waited only {}ms", waited_ms);
        }
        other => panic!("expected ConfirmationTimeout, got {:?}", other),
    }
    assert!(elapsed >= Duration::from_millis(950), "returned after {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(3), "returned after {:?}", elapsed);
}

#[tokio::test]
async fn test_poll_interval_never_exceeds_timeout() {
    // A poll interval far beyond the window must not stretch the wait.
    let mock = MockChainClient::new().with_poll_interval(Duration::from_secs(30));
    mock.set_receipt_mode(ReceiptMode::Never);

    let started = Instant::now();
    let err = mock
        .await_confirmation(&format!("0x{:064x}", 1), Duration::from_millis(200))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::ConfirmationTimeout { .. }));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_confirmation_arrives_during_wait() {
    let mock = Arc::new(MockChainClient::new().with_poll_interval(Duration::from_millis(20)));
    mock.set_receipt_mode(ReceiptMode::Never);
    let hash = mock.submit(TO, U256::one(), vec![]).await.unwrap();

    let flipper = {
        let mock = mock.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            mock.set_receipt_mode(ReceiptMode::Confirm);
        })
    };

    let receipt = mock
        .await_confirmation(&hash, Duration::from_secs(2))
        .await
        .unwrap();
    assert!(receipt.success);
    assert_eq!(receipt.tx_hash, hash);
    flipper.await.unwrap();
}

#[tokio::test]
async fn test_malformed_hash_fails_fast() {
    let mock = MockChainClient::new();
    let err = mock
        .await_confirmation("0xnothex", Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidInput(_)));
}

#[tokio::test]
async fn test_submissions_are_not_deduplicated() {
    let mock = MockChainClient::new();
    let a = mock.submit(TO, U256::from(10u64), vec![1]).await.unwrap();
    let b = mock.submit(TO, U256::from(10u64), vec![1]).await.unwrap();
    assert_ne!(a, b);
    assert_eq!(mock.submitted().len(), 2);
}

#[tokio::test]
async fn test_rpc_failure_ends_wait_with_network_error() {
    let mock = MockChainClient::new().with_poll_interval(Duration::from_millis(20));
    let hash = mock.submit(TO, U256::one(), vec![]).await.unwrap();
    mock.set_fail_receipt(true);

    let started = Instant::now();
    let err = mock
        .await_confirmation(&hash, Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NetworkError(_)), "got {:?}", err);
    assert!(started.elapsed() < Duration::from_secs(1));
}
