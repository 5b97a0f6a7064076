// Error taxonomy for the settlement ledger
use std::fmt;

use rust_decimal::Decimal;
use sled::transaction::TransactionError;

#[derive(Debug, Clone, PartialEq)]
pub enum LedgerError {
    // Validation errors
    InvalidInput(String),
    InvalidAmount(String),
    InvalidAddress(String),

    // Balance errors
    InsufficientBalance { available: Decimal, required: Decimal },

    // Lookup errors
    AccountNotFound(String),
    TransactionNotFound(u64),
    AssetNotFound(u64),

    // State errors
    InvalidTransition { from: String, to: String },
    DuplicateTxHash(String),
    DuplicateTokenId(String),

    // Chain errors
    KeyNotConfigured,
    NetworkError(String),
    ConfirmationTimeout { tx_hash: String, waited_ms: u64 },

    // Persistence errors
    StorageError(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            Self::InvalidAmount(msg) => write!(f, "Invalid amount: {}", msg),
            Self::InvalidAddress(addr) => write!(f, "Invalid address: {}", addr),
            Self::InsufficientBalance { available, required } => {
                write!(f, "Insufficient balance: have {}, need {}", available, required)
            }
            Self::AccountNotFound(addr) => write!(f, "Account {} not found", addr),
            Self::TransactionNotFound(id) => write!(f, "Transaction {} not found", id),
            Self::AssetNotFound(id) => write!(f, "Asset {} not found", id),
            Self::InvalidTransition { from, to } => {
                write!(f, "Invalid state transition: {} -> {}", from, to)
            }
            Self::DuplicateTxHash(hash) => {
                write!(f, "Transaction hash {} already recorded", hash)
            }
            Self::DuplicateTokenId(token) => write!(f, "Token id {} already issued", token),
            Self::KeyNotConfigured => write!(f, "Signing key not configured"),
            Self::NetworkError(msg) => write!(f, "Network error: {}", msg),
            Self::ConfirmationTimeout { tx_hash, waited_ms } => {
                write!(f, "Transaction {} not confirmed after {}ms", tx_hash, waited_ms)
            }
            Self::StorageError(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<sled::Error> for LedgerError {
    fn from(err: sled::Error) -> Self {
        LedgerError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::StorageError(format!("codec: {}", err))
    }
}

impl From<TransactionError<LedgerError>> for LedgerError {
    fn from(err: TransactionError<LedgerError>) -> Self {
        match err {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => LedgerError::StorageError(e.to_string()),
        }
    }
}

// Error code mapping for API responses
impl LedgerError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::InvalidAddress(_) => "INVALID_ADDRESS",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            Self::AssetNotFound(_) => "ASSET_NOT_FOUND",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::DuplicateTxHash(_) => "DUPLICATE_TX_HASH",
            Self::DuplicateTokenId(_) => "DUPLICATE_TOKEN_ID",
            Self::KeyNotConfigured => "KEY_NOT_CONFIGURED",
            Self::NetworkError(_) => "NETWORK_ERROR",
            Self::ConfirmationTimeout { .. } => "CONFIRMATION_TIMEOUT",
            Self::StorageError(_) => "STORAGE_ERROR",
        }
    }

    /// Transient failures a caller may re-attempt. Nothing in this crate retries them itself.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError(_) | Self::ConfirmationTimeout { .. } | Self::StorageError(_)
        )
    }

    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_)
                | Self::InvalidAmount(_)
                | Self::InvalidAddress(_)
                | Self::InsufficientBalance { .. }
        )
    }
}
