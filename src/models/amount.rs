use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::{LedgerError, LedgerResult};

/// Fractional digits carried by every ledger amount.
pub const AMOUNT_SCALE: u32 = 2;

const MAX_ADDRESS_LEN: usize = 128;

/// Validate a settlement amount: strictly positive, at most two decimals.
///
/// The returned value is rescaled to [`AMOUNT_SCALE`] so `100` and `100.00`
/// are stored identically.
pub fn validate_amount(amount: Decimal) -> LedgerResult<Decimal> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount(format!(
            "amount must be positive, got {}",
            amount
        )));
    }
    if amount.normalize().scale() > AMOUNT_SCALE {
        return Err(LedgerError::InvalidAmount(format!(
            "amount {} exceeds max precision {}",
            amount, AMOUNT_SCALE
        )));
    }
    let mut scaled = amount;
    scaled.rescale(AMOUNT_SCALE);
    Ok(scaled)
}

pub fn parse_amount(raw: &str) -> LedgerResult<Decimal> {
    let amount = Decimal::from_str(raw.trim())
        .map_err(|e| LedgerError::InvalidAmount(format!("{}: {}", raw, e)))?;
    validate_amount(amount)
}

/// Render with exactly two fractional digits, e.g. `150.00`.
pub fn format_amount(amount: Decimal) -> String {
    let mut rounded = amount.round_dp(AMOUNT_SCALE);
    rounded.rescale(AMOUNT_SCALE);
    rounded.to_string()
}

/// Ledger addresses are opaque: callers supply the canonical form and the
/// ledger never normalizes case or encoding. Only obviously broken input is
/// rejected.
pub fn validate_address(address: &str) -> LedgerResult<()> {
    if address.is_empty() {
        return Err(LedgerError::InvalidInput("address is required".to_string()));
    }
    if address.len() > MAX_ADDRESS_LEN {
        return Err(LedgerError::InvalidInput(format!(
            "address longer than {} bytes",
            MAX_ADDRESS_LEN
        )));
    }
    if address.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(LedgerError::InvalidInput(format!(
            "address contains whitespace or control characters: {:?}",
            address
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_amount_rescales() {
        let amount = validate_amount(Decimal::from(100)).unwrap();
        assert_eq!(amount.to_string(), "100.00");
    }

    #[test]
    fn test_validate_amount_rejects_non_positive() {
        assert!(matches!(
            validate_amount(Decimal::ZERO),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            validate_amount(Decimal::new(-500, 2)),
            Err(LedgerError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_validate_amount_precision_limit() {
        // trailing zeros beyond the scale are fine
        assert!(parse_amount("1.2300").is_ok());
        let err = parse_amount("1.234").unwrap_err();
        assert_eq!(
            err,
            LedgerError::InvalidAmount("amount 1.234 exceeds max precision 2".to_string())
        );
    }

    #[test]
    fn test_parse_amount_garbage() {
        assert!(matches!(parse_amount("ten"), Err(LedgerError::InvalidAmount(_))));
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(Decimal::from(150)), "150.00");
        assert_eq!(format_amount(Decimal::new(5, 1)), "0.50");
        assert_eq!(format_amount(Decimal::ZERO), "0.00");
    }

    #[test]
    fn test_validate_address() {
        assert!(validate_address("cfxtest:aak2rra2njvd77ezwjvx04kkds9fzagfe6d5r8e957").is_ok());
        assert!(validate_address("0xAbC0000000000000000000000000000000000001").is_ok());
        assert!(validate_address("").is_err());
        assert!(validate_address("0xabc def").is_err());
        assert!(validate_address(&"a".repeat(129)).is_err());
    }
}
