use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Asset, Transaction};

pub const DEFAULT_PAYMENT_METHOD: &str = "alipay";

pub const TOPUP_LOG_WARNING: &str = "Balance updated but transaction record may not be saved";
pub const INVESTMENT_LOG_WARNING: &str = "Asset created but transaction record may not be saved";

#[derive(Debug, Clone, Deserialize)]
pub struct TopUpRequest {
    pub address: String,
    pub rmb: Decimal,
    /// "alipay" (default) or "wechat"
    #[serde(default)]
    pub payment_method: Option<String>,
    /// Payment gateway trade number, kept as the deposit entry's hash
    #[serde(default)]
    pub trade_no: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopUpOutcome {
    pub address: String,
    #[serde(with = "crate::models::serde_utils")]
    pub balance: Decimal,
    pub payment_method: String,
    /// Missing when the deposit entry could not be written
    pub transaction_id: Option<u64>,
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvestmentRequest {
    pub wallet_address: String,
    pub product_id: u64,
    pub investment_amount: Decimal,
    #[serde(default)]
    pub token_id: Option<String>,
    #[serde(default)]
    pub nft_address: Option<String>,
    #[serde(default)]
    pub tx_hash: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvestmentOutcome {
    pub asset: Asset,
    pub transaction: Option<Transaction>,
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferRequest {
    pub address: String,
    pub to: String,
    pub amount: Decimal,
    /// Broadcast through the chain client instead of only recording a request
    #[serde(default)]
    pub submit: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmRequest {
    pub tx_hash: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NftMintRequest {
    pub to: String,
    pub token_id: String,
    #[serde(default)]
    pub nft_address: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub harvest_time: u64,
    #[serde(default)]
    pub inspection_id: String,
    /// 0x-prefixed 32-byte hex; zero when absent
    #[serde(default)]
    pub content_hash: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NftTransferRequest {
    pub from: String,
    pub to: String,
    pub token_id: String,
    #[serde(default)]
    pub nft_address: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topup_accepts_number_or_string() {
        let a: TopUpRequest = serde_json::from_str(r#"{"address":"W1","rmb":100.5}"#).unwrap();
        let b: TopUpRequest =
            serde_json::from_str(r#"{"address":"W1","rmb":"100.50","payment_method":"wechat"}"#)
                .unwrap();
        assert_eq!(a.rmb, b.rmb);
        assert!(a.payment_method.is_none());
        assert_eq!(b.payment_method.as_deref(), Some("wechat"));
    }

    #[test]
    fn test_mint_request_uses_camel_case() {
        let req: NftMintRequest = serde_json::from_str(
            r#"{"to":"0x01","tokenId":"5","nftAddress":"0x02","origin":"Yunnan","harvestTime":1700000000,"inspectionId":"QC-1"}"#,
        )
        .unwrap();
        assert_eq!(req.token_id, "5");
        assert_eq!(req.harvest_time, 1_700_000_000);
        assert!(req.content_hash.is_none());
    }
}
