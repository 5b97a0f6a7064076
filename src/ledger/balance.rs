//! Balance Ledger
//!
//! Owns the per-address off-chain balance. Accounts are created lazily on
//! first reference and only ever change through `credit` / `debit`.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::clock::Clock;
use crate::db::LedgerDb;
use crate::error::{LedgerError, LedgerResult};
use crate::models::{format_amount, validate_address, validate_amount, Account};

pub struct BalanceLedger {
    db: Arc<LedgerDb>,
    clock: Arc<dyn Clock>,
}

impl BalanceLedger {
    pub fn new(db: Arc<LedgerDb>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Existing account, or a new one with balance 0. Idempotent.
    pub fn get_or_create_account(&self, address: &str) -> LedgerResult<Account> {
        validate_address(address)?;
        let (account, created) = self.db.get_or_create_account(address, self.clock.now())?;
        if created {
            log::info!("[Ledger] Created account {}", address);
        }
        Ok(account)
    }

    /// Read without the lazy-create side effect.
    pub fn find_account(&self, address: &str) -> LedgerResult<Option<Account>> {
        validate_address(address)?;
        self.db.get_account(address)
    }

    /// Add `amount` to the balance in one atomic read-modify-write.
    pub fn credit(&self, address: &str, amount: Decimal) -> LedgerResult<Account> {
        let amount = validate_amount(amount)?;
        self.get_or_create_account(address)?;

        let account = self.db.update_balance(address, self.clock.now(), |balance| {
            balance
                .checked_add(amount)
                .ok_or_else(|| LedgerError::InvalidAmount(format!("credit of {} overflows", amount)))
        })?;

        crate::log_balance_credited!(
            address,
            format_amount(amount),
            format_amount(account.balance)
        );
        Ok(account)
    }

    /// Subtract `amount`; fails without mutation when the balance is short.
    pub fn debit(&self, address: &str, amount: Decimal) -> LedgerResult<Account> {
        let amount = validate_amount(amount)?;
        validate_address(address)?;

        let result = self.db.update_balance(address, self.clock.now(), |balance| {
            if balance < amount {
                return Err(LedgerError::InsufficientBalance {
                    available: balance,
                    required: amount,
                });
            }
            Ok(balance - amount)
        });

        match result {
            Ok(account) => {
                log::info!(
                    "[Ledger] Debited {} from {} (balance {})",
                    format_amount(amount),
                    address,
                    format_amount(account.balance)
                );
                Ok(account)
            }
            // An unknown address holds nothing.
            Err(LedgerError::AccountNotFound(_)) => Err(LedgerError::InsufficientBalance {
                available: Decimal::ZERO,
                required: amount,
            }),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use std::str::FromStr;

    fn ledger() -> BalanceLedger {
        BalanceLedger::new(Arc::new(LedgerDb::temporary().unwrap()), Arc::new(SystemClock))
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_get_or_create_twice_keeps_balance() {
        let ledger = ledger();
        ledger.credit("W1", dec("12.50")).unwrap();
        let a = ledger.get_or_create_account("W1").unwrap();
        let b = ledger.get_or_create_account("W1").unwrap();
        assert_eq!(a, b);
        assert_eq!(b.balance, dec("12.50"));
    }

    #[test]
    fn test_new_account_starts_at_zero() {
        let ledger = ledger();
        let account = ledger.get_or_create_account("W2").unwrap();
        assert_eq!(format_amount(account.balance), "0.00");
    }

    #[test]
    fn test_credit_is_decimal_exact() {
        let ledger = ledger();
        for _ in 0..10 {
            ledger.credit("W1", dec("0.10")).unwrap();
        }
        let account = ledger.get_or_create_account("W1").unwrap();
        assert_eq!(account.balance, dec("1.00"));
    }

    #[test]
    fn test_credit_rejects_non_positive() {
        let ledger = ledger();
        assert!(matches!(
            ledger.credit("W1", Decimal::ZERO),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            ledger.credit("W1", dec("-1")),
            Err(LedgerError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_debit_insufficient_leaves_balance() {
        let ledger = ledger();
        ledger.credit("W1", dec("30.00")).unwrap();

        let err = ledger.debit("W1", dec("30.01")).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientBalance {
                available: dec("30.00"),
                required: dec("30.01"),
            }
        );
        assert_eq!(ledger.get_or_create_account("W1").unwrap().balance, dec("30.00"));

        let account = ledger.debit("W1", dec("30.00")).unwrap();
        assert_eq!(account.balance, Decimal::ZERO);
    }

    #[test]
    fn test_debit_unknown_account() {
        let ledger = ledger();
        let err = ledger.debit("ghost", dec("1.00")).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert!(ledger.find_account("ghost").unwrap().is_none());
    }

    #[test]
    fn test_concurrent_credits_do_not_lose_updates() {
        let ledger = Arc::new(ledger());
        ledger.get_or_create_account("W1").unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = ledger.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        ledger.credit("W1", dec("1.00")).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(ledger.get_or_create_account("W1").unwrap().balance, dec("200.00"));
    }
}
