/// Structured settlement events
///
/// Settlement milestones are logged as one-line JSON objects so they can be
/// grepped or shipped to an ingest pipeline next to the plain log lines.

use serde_json::{json, Value};

use crate::clock::now_ms;

/// Structured log event builder
///
/// Usage:
/// ```
/// use settlement_ledger::logging::LogEvent;
///
/// let log_value = LogEvent::new("TOPUP_CREDITED")
///     .field("address", "0xabc")
///     .field("amount", "100.00")
///     .service("ledger")
///     .build();
///
/// log::info!("{}", log_value);
/// ```
pub struct LogEvent {
    fields: serde_json::Map<String, Value>,
}

impl LogEvent {
    /// Create a new log event with the given event name
    pub fn new(event: &str) -> Self {
        let mut fields = serde_json::Map::new();
        fields.insert("event".to_string(), json!(event));
        fields.insert("timestamp_ms".to_string(), json!(now_ms()));

        Self { fields }
    }

    /// Add a field to the log event
    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// Add service name
    pub fn service(mut self, service: &str) -> Self {
        self.fields.insert("service".to_string(), json!(service));
        self
    }

    /// Build the final JSON value
    pub fn build(self) -> Value {
        Value::Object(self.fields)
    }
}

#[macro_export]
macro_rules! log_balance_credited {
    ($address:expr, $amount:expr, $balance_after:expr) => {
        log::info!(
            "{}",
            $crate::logging::LogEvent::new("BALANCE_CREDITED")
                .field("address", $address)
                .field("amount", $amount)
                .field("balance_after", $balance_after)
                .service("ledger")
                .build()
        );
    };
}

#[macro_export]
macro_rules! log_transaction_settled {
    ($transaction_id:expr, $status:expr, $tx_hash:expr) => {
        log::info!(
            "{}",
            $crate::logging::LogEvent::new("TRANSACTION_SETTLED")
                .field("transaction_id", $transaction_id)
                .field("status", $status)
                .field("tx_hash", $tx_hash)
                .service("ledger")
                .build()
        );
    };
}

#[macro_export]
macro_rules! log_settlement_warning {
    ($operation:expr, $address:expr, $warning:expr) => {
        log::warn!(
            "{}",
            $crate::logging::LogEvent::new("SETTLEMENT_PARTIAL")
                .field("operation", $operation)
                .field("address", $address)
                .field("warning", $warning)
                .service("settlement")
                .build()
        );
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event_builder() {
        let log = LogEvent::new("INVESTMENT_RECORDED")
            .field("product_id", 7)
            .field("amount", "200.00")
            .service("settlement")
            .build();

        assert_eq!(log["event"], "INVESTMENT_RECORDED");
        assert_eq!(log["product_id"], 7);
        assert_eq!(log["amount"], "200.00");
        assert_eq!(log["service"], "settlement");
        assert!(log.get("timestamp_ms").is_some());
    }
}
