//! Transaction Log
//!
//! Append-only record of ledger-affecting events. Entries are never
//! deleted; the only mutation is the pending -> success | failed move.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::clock::Clock;
use crate::db::LedgerDb;
use crate::error::{LedgerError, LedgerResult};
use crate::models::{
    format_amount, parse_amount, validate_address, validate_amount, NewTransaction, Transaction,
    TransactionEvent, TransactionStatus, TransactionType,
};

pub const DEFAULT_PAGE_SIZE: usize = 50;

pub struct TransactionLog {
    db: Arc<LedgerDb>,
    clock: Arc<dyn Clock>,
    max_page_size: usize,
}

impl TransactionLog {
    pub fn new(db: Arc<LedgerDb>, clock: Arc<dyn Clock>, max_page_size: usize) -> Self {
        Self {
            db,
            clock,
            max_page_size: max_page_size.max(1),
        }
    }

    pub fn max_page_size(&self) -> usize {
        self.max_page_size
    }

    /// Append with an explicit initial status and no chain reference.
    pub fn append(
        &self,
        address: &str,
        tx_type: TransactionType,
        amount: Decimal,
        initial_status: TransactionStatus,
    ) -> LedgerResult<Transaction> {
        let amount = validate_amount(amount)?;
        self.append_entry(NewTransaction::new(
            address,
            tx_type,
            format_amount(amount),
            initial_status,
        ))
    }

    /// Append a fully described entry (hash, counterparty, payment method).
    pub fn append_entry(&self, mut draft: NewTransaction) -> LedgerResult<Transaction> {
        validate_address(&draft.address)?;
        draft.amount = format_amount(parse_amount(&draft.amount)?);
        let tx = self.db.insert_transaction(draft, self.clock.now())?;
        log::info!(
            "[TxLog] Appended #{} {} {} for {} ({})",
            tx.id,
            tx.tx_type,
            tx.amount,
            tx.address,
            tx.status.as_str()
        );
        Ok(tx)
    }

    pub fn get(&self, transaction_id: u64) -> LedgerResult<Transaction> {
        self.db
            .get_transaction(transaction_id)?
            .ok_or(LedgerError::TransactionNotFound(transaction_id))
    }

    pub fn find_by_hash(&self, tx_hash: &str) -> LedgerResult<Option<Transaction>> {
        self.db.find_transaction_by_hash(tx_hash)
    }

    /// pending -> success, recording the chain hash.
    pub fn mark_confirmed(&self, transaction_id: u64, tx_hash: &str) -> LedgerResult<Transaction> {
        if tx_hash.trim().is_empty() {
            return Err(LedgerError::InvalidInput(
                "confirmation requires a transaction hash".to_string(),
            ));
        }
        let tx = self.db.transition_transaction(
            transaction_id,
            TransactionEvent::Confirmed,
            Some(tx_hash),
            None,
            self.clock.now(),
        )?;
        crate::log_transaction_settled!(tx.id, tx.status.as_str(), tx.tx_hash.as_str());
        Ok(tx)
    }

    /// pending -> failed. Terminal.
    pub fn mark_failed(&self, transaction_id: u64, reason: &str) -> LedgerResult<Transaction> {
        self.mark_failed_with_hash(transaction_id, None, reason)
    }

    /// pending -> failed, keeping the hash of a reverted chain transaction.
    pub fn mark_failed_with_hash(
        &self,
        transaction_id: u64,
        tx_hash: Option<&str>,
        reason: &str,
    ) -> LedgerResult<Transaction> {
        let tx = self.db.transition_transaction(
            transaction_id,
            TransactionEvent::Failed,
            tx_hash,
            Some(reason),
            self.clock.now(),
        )?;
        log::warn!("[TxLog] Transaction #{} failed: {}", tx.id, reason);
        crate::log_transaction_settled!(tx.id, tx.status.as_str(), tx.tx_hash.as_str());
        Ok(tx)
    }

    /// Newest first. `page` is 1-based; `page_size` is capped.
    pub fn list_by_account(
        &self,
        address: &str,
        page: usize,
        page_size: usize,
    ) -> LedgerResult<Vec<Transaction>> {
        validate_address(address)?;
        let page = page.max(1);
        let page_size = page_size.clamp(1, self.max_page_size);
        self.db
            .list_transactions(address, (page - 1).saturating_mul(page_size), page_size)
    }
}
