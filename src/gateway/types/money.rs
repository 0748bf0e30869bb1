//! Money types for API boundary enforcement
//!
//! - `StrictDecimal`: Format-validated input type

use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};

// ============================================================================
// StrictDecimal: Format-Validated Decimal at Serde Layer
// ============================================================================

/// Strict format Decimal - validates format during deserialization
///
/// Accepts JSON strings and JSON numbers. String input is checked strictly:
/// - Rejects `.5` (must be `0.5`)
/// - Rejects `5.` (must be `5.0` or `5`)
/// - Rejects negative numbers
/// - Rejects empty strings
/// - Rejects scientific notation and a leading `+`
///
/// Business validation (scale, range, zero) happens later in `money::validate_amount`.
#[derive(Debug, Clone, Copy)]
pub struct StrictDecimal(Decimal);

impl StrictDecimal {
    /// Get the inner Decimal value
    pub fn inner(self) -> Decimal {
        self.0
    }

    /// Create from Decimal (for testing)
    #[cfg(test)]
    pub fn from_decimal(d: Decimal) -> Self {
        Self(d)
    }
}

impl std::ops::Deref for StrictDecimal {
    type Target = Decimal;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'de> Deserialize<'de> for StrictDecimal {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        // Support both JSON number and JSON string
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum DecimalOrString {
            String(String),
            Number(serde_json::Number),
        }

        let s = match DecimalOrString::deserialize(deserializer)? {
            DecimalOrString::String(s) => s,
            DecimalOrString::Number(n) => n.to_string(),
        };

        if s.is_empty() {
            return Err(D::Error::custom("Amount cannot be empty"));
        }

        // Reject .5 format (must be 0.5)
        if s.starts_with('.') {
            return Err(D::Error::custom("Invalid format: use 0.5 not .5"));
        }

        // Reject 5. format (must be 5.0 or 5)
        if s.ends_with('.') {
            return Err(D::Error::custom("Invalid format: use 5.0 not 5."));
        }

        if s.contains('e') || s.contains('E') {
            return Err(D::Error::custom(
                "Invalid format: scientific notation not allowed",
            ));
        }

        if s.starts_with('+') {
            return Err(D::Error::custom("Invalid format: + prefix not allowed"));
        }

        let d = Decimal::from_str(&s)
            .map_err(|e| D::Error::custom(format!("Invalid decimal: {}", e)))?;

        if d.is_sign_negative() {
            return Err(D::Error::custom("Amount cannot be negative"));
        }

        Ok(StrictDecimal(d))
    }
}

impl Serialize for StrictDecimal {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        // Serialize as string to preserve precision
        serializer.serialize_str(&self.0.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Body {
        amount: StrictDecimal,
    }

    fn parse(json: &str) -> Result<Decimal, serde_json::Error> {
        serde_json::from_str::<Body>(json).map(|b| b.amount.inner())
    }

    #[test]
    fn test_accepts_string_and_number() {
        assert_eq!(parse(r#"{"amount":"30.00"}"#).unwrap(), Decimal::new(3000, 2));
        assert_eq!(parse(r#"{"amount":30}"#).unwrap(), Decimal::new(30, 0));
        assert_eq!(parse(r#"{"amount":12.5}"#).unwrap(), Decimal::new(125, 1));
    }

    #[test]
    fn test_rejects_sloppy_formats() {
        for bad in [
            r#"{"amount":""}"#,
            r#"{"amount":".5"}"#,
            r#"{"amount":"5."}"#,
            r#"{"amount":"1e3"}"#,
            r#"{"amount":"+5"}"#,
            r#"{"amount":"-5"}"#,
            r#"{"amount":-5}"#,
            r#"{"amount":"abc"}"#,
        ] {
            assert!(parse(bad).is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_serializes_as_string() {
        let v = serde_json::to_string(&StrictDecimal::from_decimal(Decimal::new(3000, 2))).unwrap();
        assert_eq!(v, r#""30.00""#);
    }
}
