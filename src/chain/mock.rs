//! Deterministic chain double for tests and offline runs
//!
//! Hashes are `0x` followed by a zero-padded counter, so the n-th submission
//! always yields the same hash.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use ethers::types::U256;

use crate::error::{LedgerError, LedgerResult};

use super::ethers_client::{parse_address, parse_tx_hash};
use super::traits::{ChainClient, Receipt};

/// How receipt lookups answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptMode {
    /// Mined and successful
    Confirm,
    /// Mined but reverted
    Revert,
    /// Never mined
    Never,
}

/// One recorded `submit` call
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedTx {
    pub tx_hash: String,
    pub to: String,
    pub amount: U256,
    pub payload: Vec<u8>,
}

pub struct MockChainClient {
    name: String,
    counter: AtomicU64,
    signing_key: AtomicBool,
    fail_submit: AtomicBool,
    fail_receipt: AtomicBool,
    receipt_mode: Mutex<ReceiptMode>,
    balances: Mutex<HashMap<String, U256>>,
    submitted: Mutex<Vec<SubmittedTx>>,
    poll_interval: Duration,
}

fn locked<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

impl MockChainClient {
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            counter: AtomicU64::new(0),
            signing_key: AtomicBool::new(true),
            fail_submit: AtomicBool::new(false),
            fail_receipt: AtomicBool::new(false),
            receipt_mode: Mutex::new(ReceiptMode::Confirm),
            balances: Mutex::new(HashMap::new()),
            submitted: Mutex::new(Vec::new()),
            poll_interval: Duration::from_millis(50),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn set_receipt_mode(&self, mode: ReceiptMode) {
        *locked(&self.receipt_mode) = mode;
    }

    /// Make the next submissions fail with `NetworkError`
    pub fn set_fail_submit(&self, fail: bool) {
        self.fail_submit.store(fail, Ordering::SeqCst);
    }

    /// Make receipt lookups fail with `NetworkError`
    pub fn set_fail_receipt(&self, fail: bool) {
        self.fail_receipt.store(fail, Ordering::SeqCst);
    }

    /// Simulate a missing signing key
    pub fn set_signing_key(&self, configured: bool) {
        self.signing_key.store(configured, Ordering::SeqCst);
    }

    pub fn set_balance(&self, address: &str, wei: U256) {
        locked(&self.balances).insert(address.to_lowercase(), wei);
    }

    pub fn submitted(&self) -> Vec<SubmittedTx> {
        locked(&self.submitted).clone()
    }
}

impl Default for MockChainClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn get_balance(&self, address: &str) -> LedgerResult<U256> {
        parse_address(address)?;
        Ok(locked(&self.balances)
            .get(&address.trim().to_lowercase())
            .copied()
            .unwrap_or_default())
    }

    async fn submit(&self, to: &str, amount: U256, payload: Vec<u8>) -> LedgerResult<String> {
        if !self.signing_key.load(Ordering::SeqCst) {
            return Err(LedgerError::KeyNotConfigured);
        }
        parse_address(to)?;
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(LedgerError::NetworkError("mock submission rejected".to_string()));
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let tx_hash = format!("0x{:064x}", n);
        log::debug!("[{}] submit({}, to={}, amount={})", self.name, tx_hash, to, amount);

        locked(&self.submitted).push(SubmittedTx {
            tx_hash: tx_hash.clone(),
            to: to.to_string(),
            amount,
            payload,
        });
        Ok(tx_hash)
    }

    async fn receipt(&self, tx_hash: &str) -> LedgerResult<Option<Receipt>> {
        parse_tx_hash(tx_hash)?;
        if self.fail_receipt.load(Ordering::SeqCst) {
            return Err(LedgerError::NetworkError("mock rpc unreachable".to_string()));
        }
        let mode = *locked(&self.receipt_mode);
        log::debug!("[{}] receipt({}) -> {:?}", self.name, tx_hash, mode);

        Ok(match mode {
            ReceiptMode::Never => None,
            ReceiptMode::Confirm | ReceiptMode::Revert => Some(Receipt {
                tx_hash: tx_hash.to_string(),
                block_number: Some(self.counter.load(Ordering::SeqCst).max(1)),
                success: mode == ReceiptMode::Confirm,
            }),
        })
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    fn name(&self) -> &str {
        &self.name
    }
}
