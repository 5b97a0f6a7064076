use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lifecycle of an investment holding. Only `Active` is ever written today.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AssetStatus {
    Active,
    Sold,
    Matured,
}

/// Recorded investment holding linking a wallet, a product and a token id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: u64,
    pub wallet_address: String,
    pub product_id: u64,
    pub token_id: String,
    #[serde(default)]
    pub nft_address: Option<String>,
    #[serde(with = "crate::models::serde_utils")]
    pub investment_amount: Decimal,
    pub purchase_date: DateTime<Utc>,
    pub status: AssetStatus,
    /// Funding transaction reference (may be empty)
    pub tx_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Asset fields before an id is assigned
#[derive(Debug, Clone, PartialEq)]
pub struct NewAsset {
    pub wallet_address: String,
    pub product_id: u64,
    pub token_id: String,
    pub nft_address: Option<String>,
    pub investment_amount: Decimal,
    pub tx_hash: String,
}

impl NewAsset {
    pub fn into_asset(self, id: u64, now: DateTime<Utc>) -> Asset {
        Asset {
            id,
            wallet_address: self.wallet_address,
            product_id: self.product_id,
            token_id: self.token_id,
            nft_address: self.nft_address,
            investment_amount: self.investment_amount,
            purchase_date: now,
            status: AssetStatus::Active,
            tx_hash: self.tx_hash,
            created_at: now,
            updated_at: now,
        }
    }
}
