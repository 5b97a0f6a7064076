//! Investment Recorder
//!
//! Orchestrates one logical settlement across the balance ledger, the
//! transaction log, the asset book and the chain client.
//!
//! Policy: the balance (or asset) write is authoritative and the log entry
//! is best effort. When the log write fails after the primary write
//! succeeded, the outcome carries a warning instead of an error. With
//! `atomic_investment` the asset and its log entry are one storage unit.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ethers::types::U256;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::chain::{parse_address, ChainClient};
use crate::clock::Clock;
use crate::configure::SettlementConfig;
use crate::db::LedgerDb;
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{AssetBook, BalanceLedger, TransactionLog};
use crate::logging::LogEvent;
use crate::models::{
    format_amount, validate_address, validate_amount, Account, Asset, NewAsset, NewTransaction,
    Transaction, TransactionStatus, TransactionType,
};

use super::types::{
    InvestmentOutcome, InvestmentRequest, TopUpOutcome, TopUpRequest, DEFAULT_PAYMENT_METHOD,
    INVESTMENT_LOG_WARNING, TOPUP_LOG_WARNING,
};

/// `TOKEN-{product}-{unix seconds}`. Two issuances for one product in the
/// same second produce the same id; the token index rejects the second.
pub fn generate_token_id(product_id: u64, now: DateTime<Utc>) -> String {
    format!("TOKEN-{}-{}", product_id, now.timestamp())
}

/// Ledger amounts go on chain in minor units (cents).
fn to_chain_units(amount: Decimal) -> LedgerResult<U256> {
    (amount * Decimal::ONE_HUNDRED)
        .trunc()
        .to_u64()
        .map(U256::from)
        .ok_or_else(|| LedgerError::InvalidAmount(format!("{} not representable on chain", amount)))
}

pub struct InvestmentRecorder {
    balances: Arc<BalanceLedger>,
    transactions: Arc<TransactionLog>,
    assets: Arc<AssetBook>,
    chain: Arc<dyn ChainClient>,
    clock: Arc<dyn Clock>,
    config: SettlementConfig,
    confirmation_timeout: Duration,
}

impl InvestmentRecorder {
    pub fn new(
        db: Arc<LedgerDb>,
        chain: Arc<dyn ChainClient>,
        clock: Arc<dyn Clock>,
        config: SettlementConfig,
        confirmation_timeout: Duration,
    ) -> Self {
        Self {
            balances: Arc::new(BalanceLedger::new(db.clone(), clock.clone())),
            transactions: Arc::new(TransactionLog::new(
                db.clone(),
                clock.clone(),
                config.max_page_size,
            )),
            assets: Arc::new(AssetBook::new(db, clock.clone())),
            chain,
            clock,
            config,
            confirmation_timeout,
        }
    }

    pub fn balances(&self) -> &BalanceLedger {
        &self.balances
    }

    pub fn transactions(&self) -> &TransactionLog {
        &self.transactions
    }

    pub fn assets(&self) -> &AssetBook {
        &self.assets
    }

    pub fn chain(&self) -> &Arc<dyn ChainClient> {
        &self.chain
    }

    pub fn confirmation_timeout(&self) -> Duration {
        self.confirmation_timeout
    }

    // ===== Top-up =====

    /// Credit the off-chain balance, then log a successful deposit.
    pub fn top_up(&self, req: TopUpRequest) -> LedgerResult<TopUpOutcome> {
        validate_address(&req.address)?;
        let amount = validate_amount(req.rmb)?;
        let payment_method = req
            .payment_method
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string());

        let account = self.balances.credit(&req.address, amount)?;

        let draft = NewTransaction::new(
            &req.address,
            TransactionType::Deposit,
            format_amount(amount),
            TransactionStatus::Success,
        )
        .with_payment_method(&payment_method)
        .with_tx_hash(req.trade_no.as_deref().unwrap_or_default());

        let (transaction_id, warning) = match self.transactions.append_entry(draft) {
            Ok(tx) => (Some(tx.id), None),
            Err(e) => {
                log::error!("[Recorder] Deposit log for {} failed: {}", req.address, e);
                crate::log_settlement_warning!("topup", req.address.as_str(), TOPUP_LOG_WARNING);
                (None, Some(TOPUP_LOG_WARNING.to_string()))
            }
        };

        Ok(TopUpOutcome {
            address: account.address,
            balance: account.balance,
            payment_method,
            transaction_id,
            warning,
        })
    }

    // ===== Investment =====

    pub fn record_investment(&self, req: InvestmentRequest) -> LedgerResult<InvestmentOutcome> {
        validate_address(&req.wallet_address)?;
        let amount = validate_amount(req.investment_amount)?;
        self.balances.get_or_create_account(&req.wallet_address)?;

        let token_id = match req.token_id.filter(|t| !t.trim().is_empty()) {
            Some(token_id) => token_id,
            None => generate_token_id(req.product_id, self.clock.now()),
        };
        let tx_hash = req.tx_hash.unwrap_or_default();

        let asset_draft = NewAsset {
            wallet_address: req.wallet_address.clone(),
            product_id: req.product_id,
            token_id,
            nft_address: req.nft_address.filter(|a| !a.trim().is_empty()),
            investment_amount: amount,
            tx_hash: tx_hash.clone(),
        };
        let tx_draft = NewTransaction::new(
            &req.wallet_address,
            TransactionType::Investment,
            format_amount(amount),
            TransactionStatus::Success,
        )
        .with_tx_hash(&tx_hash);

        let outcome = if self.config.atomic_investment {
            let (asset, tx) = self.assets.issue_with_transaction(asset_draft, tx_draft)?;
            InvestmentOutcome {
                asset,
                transaction: Some(tx),
                warning: None,
            }
        } else {
            let asset = self.assets.issue(asset_draft)?;
            match self.transactions.append_entry(tx_draft) {
                Ok(tx) => InvestmentOutcome {
                    asset,
                    transaction: Some(tx),
                    warning: None,
                },
                Err(e) => {
                    log::error!(
                        "[Recorder] Investment log for asset {} failed: {}",
                        asset.id,
                        e
                    );
                    crate::log_settlement_warning!(
                        "invest",
                        req.wallet_address.as_str(),
                        INVESTMENT_LOG_WARNING
                    );
                    InvestmentOutcome {
                        asset,
                        transaction: None,
                        warning: Some(INVESTMENT_LOG_WARNING.to_string()),
                    }
                }
            }
        };

        log::info!(
            "{}",
            LogEvent::new("INVESTMENT_RECORDED")
                .field("wallet_address", outcome.asset.wallet_address.as_str())
                .field("product_id", outcome.asset.product_id)
                .field("token_id", outcome.asset.token_id.as_str())
                .field("amount", format_amount(outcome.asset.investment_amount))
                .field("logged", outcome.transaction.is_some())
                .service("settlement")
                .build()
        );
        Ok(outcome)
    }

    // ===== Pending requests =====
    //
    // Recorded only. No balance moves until something settles them.

    pub fn request_transfer(
        &self,
        address: &str,
        to: &str,
        amount: Decimal,
    ) -> LedgerResult<Transaction> {
        validate_address(to)?;
        let amount = validate_amount(amount)?;
        self.balances.get_or_create_account(address)?;
        self.transactions.append_entry(
            NewTransaction::new(
                address,
                TransactionType::Transfer,
                format_amount(amount),
                TransactionStatus::Pending,
            )
            .with_counterparty(to),
        )
    }

    pub fn request_withdrawal(&self, address: &str, amount: Decimal) -> LedgerResult<Transaction> {
        self.balances.get_or_create_account(address)?;
        self.transactions.append(
            address,
            TransactionType::Withdrawal,
            amount,
            TransactionStatus::Pending,
        )
    }

    pub fn request_deposit(&self, address: &str, amount: Decimal) -> LedgerResult<Transaction> {
        self.balances.get_or_create_account(address)?;
        self.transactions.append(
            address,
            TransactionType::Deposit,
            amount,
            TransactionStatus::Pending,
        )
    }

    /// Record a pending transfer and broadcast it. A rejected submission
    /// fails the entry; an accepted one stays pending until confirmed.
    pub async fn submit_transfer(
        &self,
        address: &str,
        to: &str,
        amount: Decimal,
    ) -> LedgerResult<(Transaction, String)> {
        let value = to_chain_units(validate_amount(amount)?)?;
        parse_address(to)?;
        let pending = self.request_transfer(address, to, amount)?;

        match self.chain.submit(to, value, Vec::new()).await {
            Ok(tx_hash) => {
                log::info!(
                    "[Recorder] Transfer #{} submitted as {}",
                    pending.id,
                    tx_hash
                );
                Ok((pending, tx_hash))
            }
            Err(e) => {
                if let Err(mark_err) = self.transactions.mark_failed(pending.id, &e.to_string()) {
                    log::error!(
                        "[Recorder] Could not fail transfer #{}: {}",
                        pending.id,
                        mark_err
                    );
                }
                Err(e)
            }
        }
    }

    /// Wait for the chain receipt of `tx_hash` and settle the pending entry.
    ///
    /// No ledger state is touched while waiting. On `ConfirmationTimeout`
    /// the entry stays pending and the error is returned to the caller.
    pub async fn confirm_pending(
        &self,
        transaction_id: u64,
        tx_hash: &str,
        timeout: Option<Duration>,
    ) -> LedgerResult<Transaction> {
        let current = self.transactions.get(transaction_id)?;
        if current.status != TransactionStatus::Pending {
            return Err(LedgerError::InvalidTransition {
                from: current.status.as_str().to_string(),
                to: TransactionStatus::Success.as_str().to_string(),
            });
        }

        let timeout = timeout.unwrap_or(self.confirmation_timeout);
        let receipt = self.chain.await_confirmation(tx_hash, timeout).await?;

        if receipt.success {
            self.transactions.mark_confirmed(transaction_id, &receipt.tx_hash)
        } else {
            self.transactions.mark_failed_with_hash(
                transaction_id,
                Some(&receipt.tx_hash),
                "reverted on chain",
            )
        }
    }

    // ===== Queries =====

    /// Balance lookup; creates the account on first reference.
    pub fn balance(&self, address: &str) -> LedgerResult<Account> {
        self.balances.get_or_create_account(address)
    }

    pub fn list_transactions(
        &self,
        address: &str,
        page: usize,
        page_size: usize,
    ) -> LedgerResult<Vec<Transaction>> {
        self.transactions.list_by_account(address, page, page_size)
    }

    pub fn list_assets(&self, address: &str) -> LedgerResult<Vec<Asset>> {
        self.assets.list_active(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{MockChainClient, ReceiptMode};
    use crate::clock::FixedClock;
    use std::str::FromStr;

    const TO: &str = "0x000000000000000000000000000000000000dEaD";

    fn recorder_with(config: SettlementConfig) -> (InvestmentRecorder, Arc<MockChainClient>) {
        let chain = Arc::new(MockChainClient::new().with_poll_interval(Duration::from_millis(10)));
        let recorder = InvestmentRecorder::new(
            Arc::new(LedgerDb::temporary().unwrap()),
            chain.clone(),
            Arc::new(FixedClock::at_unix(1_700_000_000)),
            config,
            Duration::from_secs(1),
        );
        (recorder, chain)
    }

    fn recorder() -> (InvestmentRecorder, Arc<MockChainClient>) {
        recorder_with(SettlementConfig::default())
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_generate_token_id() {
        let now = FixedClock::at_unix(1_700_000_000).now();
        assert_eq!(generate_token_id(7, now), "TOKEN-7-1700000000");
    }

    #[test]
    fn test_to_chain_units() {
        assert_eq!(to_chain_units(dec("12.34")).unwrap(), U256::from(1234u64));
        assert_eq!(to_chain_units(dec("1")).unwrap(), U256::from(100u64));
    }

    #[test]
    fn test_top_up_defaults_payment_method() {
        let (recorder, _) = recorder();
        let outcome = recorder
            .top_up(TopUpRequest {
                address: "W1".into(),
                rmb: dec("100"),
                payment_method: None,
                trade_no: None,
            })
            .unwrap();
        assert_eq!(outcome.payment_method, "alipay");
        assert_eq!(format_amount(outcome.balance), "100.00");
        assert!(outcome.transaction_id.is_some());
        assert!(outcome.warning.is_none());

        let logged = recorder.list_transactions("W1", 1, 10).unwrap();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].tx_type, TransactionType::Deposit);
        assert_eq!(logged[0].payment_method.as_deref(), Some("alipay"));
    }

    #[test]
    fn test_top_up_rejects_before_mutation() {
        let (recorder, _) = recorder();
        let err = recorder
            .top_up(TopUpRequest {
                address: "W1".into(),
                rmb: dec("-5"),
                payment_method: None,
                trade_no: None,
            })
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(_)));
        assert!(recorder.balances().find_account("W1").unwrap().is_none());
    }

    #[test]
    fn test_requests_do_not_move_balance() {
        let (recorder, _) = recorder();
        let transfer = recorder.request_transfer("W1", "W2", dec("5.00")).unwrap();
        let withdrawal = recorder.request_withdrawal("W1", dec("3.00")).unwrap();
        let deposit = recorder.request_deposit("W1", dec("2.00")).unwrap();

        for tx in [&transfer, &withdrawal, &deposit] {
            assert_eq!(tx.status, TransactionStatus::Pending);
        }
        assert_eq!(transfer.counterparty.as_deref(), Some("W2"));
        assert_eq!(recorder.balance("W1").unwrap().balance, Decimal::ZERO);
    }

    #[test]
    fn test_top_up_keeps_credit_when_log_write_fails() {
        let (recorder, _) = recorder();
        let top_up = |rmb: &str| {
            recorder
                .top_up(TopUpRequest {
                    address: "W1".into(),
                    rmb: dec(rmb),
                    payment_method: Some("wechat".into()),
                    trade_no: Some("ALI-2023-0001".into()),
                })
                .unwrap()
        };
        assert!(top_up("10.00").warning.is_none());

        // Same trade number: the deposit entry is refused after the credit.
        let outcome = top_up("5.00");
        assert_eq!(outcome.warning.as_deref(), Some(TOPUP_LOG_WARNING));
        assert!(outcome.transaction_id.is_none());
        assert_eq!(outcome.payment_method, "wechat");
        assert_eq!(format_amount(outcome.balance), "15.00");
        assert_eq!(format_amount(recorder.balance("W1").unwrap().balance), "15.00");
        assert_eq!(recorder.list_transactions("W1", 1, 10).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_transfer_rejects_bad_destination_before_writing() {
        let (recorder, chain) = recorder();
        let err = recorder.submit_transfer("W1", "W2", dec("1.00")).await.unwrap_err();
        assert_eq!(err, LedgerError::InvalidAddress("W2".to_string()));
        assert!(recorder.list_transactions("W1", 1, 10).unwrap().is_empty());
        assert!(recorder.balances().find_account("W1").unwrap().is_none());
        assert!(chain.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_submit_transfer_failure_marks_failed() {
        let (recorder, chain) = recorder();
        chain.set_fail_submit(true);
        let err = recorder.submit_transfer("W1", TO, dec("1.00")).await.unwrap_err();
        assert!(matches!(err, LedgerError::NetworkError(_)));

        let logged = recorder.list_transactions("W1", 1, 10).unwrap();
        assert_eq!(logged[0].status, TransactionStatus::Failed);
    }

    #[tokio::test]
    async fn test_submit_then_confirm() {
        let (recorder, chain) = recorder();
        let (pending, hash) = recorder.submit_transfer("W1", TO, dec("1.50")).await.unwrap();
        assert_eq!(pending.status, TransactionStatus::Pending);
        assert_eq!(chain.submitted()[0].amount, U256::from(150u64));

        let settled = recorder.confirm_pending(pending.id, &hash, None).await.unwrap();
        assert_eq!(settled.status, TransactionStatus::Success);
        assert_eq!(settled.tx_hash, hash);

        let again = recorder.confirm_pending(pending.id, &hash, None).await.unwrap_err();
        assert!(matches!(again, LedgerError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_reverted_receipt_fails_entry() {
        let (recorder, chain) = recorder();
        let (pending, hash) = recorder.submit_transfer("W1", TO, dec("1.00")).await.unwrap();
        chain.set_receipt_mode(ReceiptMode::Revert);
        let settled = recorder.confirm_pending(pending.id, &hash, None).await.unwrap();
        assert_eq!(settled.status, TransactionStatus::Failed);
        assert_eq!(settled.failure_reason.as_deref(), Some("reverted on chain"));
    }

    #[tokio::test]
    async fn test_timeout_leaves_entry_pending() {
        let (recorder, chain) = recorder();
        let (pending, hash) = recorder.submit_transfer("W1", TO, dec("1.00")).await.unwrap();
        chain.set_receipt_mode(ReceiptMode::Never);

        let err = recorder
            .confirm_pending(pending.id, &hash, Some(Duration::from_millis(100)))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ConfirmationTimeout { .. }));
        assert_eq!(
            recorder.transactions().get(pending.id).unwrap().status,
            TransactionStatus::Pending
        );
    }
}
