use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Off-chain balance of one wallet address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub address: String,
    #[serde(with = "crate::models::serde_utils")]
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(address: &str, now: DateTime<Utc>) -> Self {
        Self {
            address: address.to_string(),
            balance: Decimal::new(0, 2),
            created_at: now,
            updated_at: now,
        }
    }
}
