//! Transaction log entries and their status state machine.
//!
//! `pending -> success | failed`; `success` and `failed` are terminal.
//! Resubmission after a failure requires a new transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

/// Kind of ledger-affecting event
///
/// Uses strum for String conversion:
/// - `tx_type.as_ref()` -> &str "investment"
/// - `"yield-payout".parse::<TransactionType>()`
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Investment,
    Transfer,
    YieldPayout,
}

/// Transaction status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Waiting on chain confirmation
    Pending,
    /// Confirmed, terminal
    Success,
    /// Rejected or reverted, terminal
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Success => "success",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TransactionStatus::Pending),
            "success" => Some(TransactionStatus::Success),
            "failed" => Some(TransactionStatus::Failed),
            _ => None,
        }
    }

    /// Check if this is a terminal state (no further transitions possible)
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Success | TransactionStatus::Failed)
    }
}

/// Inputs that move a pending transaction forward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionEvent {
    /// Chain reported the transaction mined successfully
    Confirmed,
    /// Submission rejected, reverted on chain, or abandoned
    Failed,
}

impl TransactionEvent {
    fn target(&self) -> TransactionStatus {
        match self {
            TransactionEvent::Confirmed => TransactionStatus::Success,
            TransactionEvent::Failed => TransactionStatus::Failed,
        }
    }
}

/// State transition function
///
/// Unlike a retrying workflow, an invalid transition here is a programming
/// or race error and is reported, never absorbed.
pub fn transition(
    current: TransactionStatus,
    event: TransactionEvent,
) -> LedgerResult<TransactionStatus> {
    use TransactionEvent::*;
    use TransactionStatus::*;

    match (current, event) {
        (Pending, Confirmed) => Ok(Success),
        (Pending, TransactionEvent::Failed) => Ok(TransactionStatus::Failed),
        (from, event) => Err(LedgerError::InvalidTransition {
            from: from.as_str().to_string(),
            to: event.target().as_str().to_string(),
        }),
    }
}

/// One append-only ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: u64,
    /// Owning account (wallet address)
    pub address: String,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    /// Two-decimal amount kept as text at the boundary
    pub amount: String,
    pub status: TransactionStatus,
    /// Chain reference; empty until confirmed or supplied
    pub tx_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a new log entry; ids and timestamps are assigned on append.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub address: String,
    pub tx_type: TransactionType,
    pub amount: String,
    pub status: TransactionStatus,
    pub tx_hash: String,
    pub counterparty: Option<String>,
    pub payment_method: Option<String>,
}

impl NewTransaction {
    pub fn new(
        address: &str,
        tx_type: TransactionType,
        amount: String,
        status: TransactionStatus,
    ) -> Self {
        Self {
            address: address.to_string(),
            tx_type,
            amount,
            status,
            tx_hash: String::new(),
            counterparty: None,
            payment_method: None,
        }
    }

    pub fn with_tx_hash(mut self, tx_hash: &str) -> Self {
        self.tx_hash = tx_hash.to_string();
        self
    }

    pub fn with_counterparty(mut self, counterparty: &str) -> Self {
        self.counterparty = Some(counterparty.to_string());
        self
    }

    pub fn with_payment_method(mut self, method: &str) -> Self {
        self.payment_method = Some(method.to_string());
        self
    }

    pub fn into_transaction(self, id: u64, now: DateTime<Utc>) -> Transaction {
        Transaction {
            id,
            address: self.address,
            tx_type: self.tx_type,
            amount: self.amount,
            status: self.status,
            tx_hash: self.tx_hash,
            counterparty: self.counterparty,
            payment_method: self.payment_method,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }
}
