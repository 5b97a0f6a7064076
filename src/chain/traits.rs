//! Chain settlement capability
//!
//! The only component that crosses the network boundary. Callers depend on
//! [`ChainClient`] and never on which implementation is active.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use ethers::types::U256;
use serde::Serialize;

use crate::error::{LedgerError, LedgerResult};

/// Confirmation data for a mined transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub tx_hash: String,
    pub block_number: Option<u64>,
    /// False when the transaction was mined but reverted
    pub success: bool,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Native balance in wei.
    ///
    /// Fails with `InvalidAddress` on malformed input and `NetworkError`
    /// when the RPC call fails.
    async fn get_balance(&self, address: &str) -> LedgerResult<U256>;

    /// Sign and broadcast one transaction, returning its hash.
    ///
    /// Not idempotent: every call is a new outbound transaction.
    async fn submit(&self, to: &str, amount: U256, payload: Vec<u8>) -> LedgerResult<String>;

    /// Single receipt lookup; `None` while the transaction is not mined.
    async fn receipt(&self, tx_hash: &str) -> LedgerResult<Option<Receipt>>;

    fn poll_interval(&self) -> Duration;

    /// Poll until mined or until `timeout` elapses.
    ///
    /// One wait window only; on `ConfirmationTimeout` the caller decides
    /// whether to poll again. RPC failures while polling end the wait.
    async fn await_confirmation(&self, tx_hash: &str, timeout: Duration) -> LedgerResult<Receipt> {
        let started = Instant::now();
        let interval = self
            .poll_interval()
            .min(timeout)
            .max(Duration::from_millis(1));

        match tokio::time::timeout(timeout, poll_until_mined(self, tx_hash, interval)).await {
            Ok(result) => result,
            Err(_) => {
                let waited_ms = started.elapsed().as_millis() as u64;
                log::warn!(
                    "[{}] {} not mined within {}ms",
                    self.name(),
                    tx_hash,
                    waited_ms
                );
                Err(LedgerError::ConfirmationTimeout {
                    tx_hash: tx_hash.to_string(),
                    waited_ms,
                })
            }
        }
    }

    /// Get client name for logging
    fn name(&self) -> &str;
}

async fn poll_until_mined<C: ChainClient + ?Sized>(
    client: &C,
    tx_hash: &str,
    interval: Duration,
) -> LedgerResult<Receipt> {
    loop {
        if let Some(receipt) = client.receipt(tx_hash).await? {
            log::debug!(
                "[{}] {} mined in block {:?}",
                client.name(),
                tx_hash,
                receipt.block_number
            );
            return Ok(receipt);
        }
        tokio::time::sleep(interval).await;
    }
}
