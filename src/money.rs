//! Money Conversion Module
//!
//! All client-facing amounts enter and leave the system through this module.
//!
//! ## Design Principles
//! 1. Amounts are `rust_decimal::Decimal`, never floats
//! 2. Explicit Error Handling: No silent truncation or rounding
//! 3. Currency precision is fixed at [`CURRENCY_DECIMALS`] (cents)
//!
//! ## Usage
//! ```rust
//! use retail_banking::money::{parse_amount, format_amount};
//!
//! let amount = parse_amount("30.5").unwrap();
//! assert_eq!(format_amount(amount), "30.50");
//! ```

use rust_decimal::prelude::*;
use thiserror::Error;

/// Fractional digits allowed for any currency amount
pub const CURRENCY_DECIMALS: u32 = 2;

/// Upper bound for a single movement of funds
pub const MAX_SINGLE_AMOUNT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

// ============================================================================
// Error Types
// ============================================================================

/// Money conversion errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Precision overflow: provided {provided} decimals, max allowed {max}")]
    PrecisionOverflow { provided: u32, max: u32 },

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Amount too large")]
    Overflow,

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

// ============================================================================
// Parse: Client → Internal
// ============================================================================

/// Parse a client-provided amount string
///
/// Rejects ambiguous formats (`.5`, `5.`), signs, more than
/// [`CURRENCY_DECIMALS`] fractional digits, zero and oversized values.
pub fn parse_amount(amount_str: &str) -> Result<Decimal, MoneyError> {
    let amount_str = amount_str.trim();
    if amount_str.is_empty() {
        return Err(MoneyError::InvalidFormat("empty string".into()));
    }

    if amount_str.starts_with('-') || amount_str.starts_with('+') {
        return Err(MoneyError::InvalidAmount);
    }

    if amount_str.starts_with('.') {
        return Err(MoneyError::InvalidFormat(
            "missing leading zero (e.g., use 0.5 instead of .5)".into(),
        ));
    }
    if amount_str.ends_with('.') {
        return Err(MoneyError::InvalidFormat(
            "missing fractional part (e.g., use 5.0 instead of 5.)".into(),
        ));
    }
    if !amount_str.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return Err(MoneyError::InvalidFormat(format!(
            "invalid character in amount: {}",
            amount_str
        )));
    }

    let decimal = Decimal::from_str(amount_str)
        .map_err(|e| MoneyError::InvalidFormat(e.to_string()))?;

    validate_amount(decimal)
}

/// Validate an already-parsed Decimal amount
///
/// Trailing zeros do not count against precision (`30.000` is accepted as `30.00`).
pub fn validate_amount(decimal: Decimal) -> Result<Decimal, MoneyError> {
    if decimal.is_sign_negative() || decimal.is_zero() {
        return Err(MoneyError::InvalidAmount);
    }

    let normalized = decimal.normalize();
    if normalized.scale() > CURRENCY_DECIMALS {
        return Err(MoneyError::PrecisionOverflow {
            provided: normalized.scale(),
            max: CURRENCY_DECIMALS,
        });
    }

    if decimal > MAX_SINGLE_AMOUNT {
        return Err(MoneyError::Overflow);
    }

    Ok(normalized)
}

// ============================================================================
// Format: Internal → Client
// ============================================================================

/// Format an amount for display with exactly [`CURRENCY_DECIMALS`] digits
pub fn format_amount(amount: Decimal) -> String {
    let mut rounded = amount.round_dp(CURRENCY_DECIMALS);
    rounded.rescale(CURRENCY_DECIMALS);
    rounded.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_amount_valid() {
        assert_eq!(parse_amount("30").unwrap(), dec("30"));
        assert_eq!(parse_amount("30.5").unwrap(), dec("30.5"));
        assert_eq!(parse_amount("0.01").unwrap(), dec("0.01"));
        assert_eq!(parse_amount(" 12.34 ").unwrap(), dec("12.34"));
    }

    #[test]
    fn test_parse_amount_trailing_zeros_accepted() {
        assert_eq!(parse_amount("30.000").unwrap(), dec("30"));
    }

    #[test]
    fn test_parse_amount_rejects_ambiguous_format() {
        assert!(matches!(
            parse_amount(".5"),
            Err(MoneyError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_amount("5."),
            Err(MoneyError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_amount("1e3"),
            Err(MoneyError::InvalidFormat(_))
        ));
        assert!(matches!(parse_amount(""), Err(MoneyError::InvalidFormat(_))));
    }

    #[test]
    fn test_parse_amount_rejects_sign_and_zero() {
        assert_eq!(parse_amount("-1"), Err(MoneyError::InvalidAmount));
        assert_eq!(parse_amount("+1"), Err(MoneyError::InvalidAmount));
        assert_eq!(parse_amount("0"), Err(MoneyError::InvalidAmount));
        assert_eq!(parse_amount("0.00"), Err(MoneyError::InvalidAmount));
    }

    #[test]
    fn test_parse_amount_precision_overflow() {
        assert_eq!(
            parse_amount("1.005"),
            Err(MoneyError::PrecisionOverflow {
                provided: 3,
                max: 2
            })
        );
    }

    #[test]
    fn test_validate_amount_overflow() {
        assert_eq!(
            validate_amount(dec("1000000000.01")),
            Err(MoneyError::Overflow)
        );
        assert!(validate_amount(dec("1000000000")).is_ok());
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(dec("70")), "70.00");
        assert_eq!(format_amount(dec("30.5")), "30.50");
        assert_eq!(format_amount(dec("0.01")), "0.01");
    }
}
