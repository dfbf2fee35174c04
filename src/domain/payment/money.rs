//! Integer money in the currency's smallest unit.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::ValidationError;

/// ISO-4217 currency code, stored upper-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    /// Parses a three-letter code, accepting any case.
    pub fn new(code: impl AsRef<str>) -> Result<Self, ValidationError> {
        let code = code.as_ref().trim();
        if code.is_empty() {
            return Err(ValidationError::empty_field("currency"));
        }
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::invalid_format(
                "currency",
                format!("'{}' is not a three-letter ISO-4217 code", code),
            ));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    pub fn jpy() -> Self {
        Self("JPY".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Currency {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

/// An amount in minor units (yen, cents) with its currency.
///
/// Never holds a negative amount.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    amount_minor_units: i64,
    currency: Currency,
}

impl Money {
    pub fn new(amount_minor_units: i64, currency: Currency) -> Result<Self, ValidationError> {
        if amount_minor_units < 0 {
            return Err(ValidationError::out_of_range(
                "amount_minor_units",
                0,
                i64::MAX,
                amount_minor_units,
            ));
        }
        Ok(Self {
            amount_minor_units,
            currency,
        })
    }

    pub fn amount_minor_units(&self) -> i64 {
        self.amount_minor_units
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount_minor_units, self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_is_normalized_to_upper_case() {
        assert_eq!(Currency::new("jpy").unwrap().as_str(), "JPY");
    }

    #[test]
    fn currency_rejects_bad_codes() {
        assert!(Currency::new("").is_err());
        assert!(Currency::new("YEN!").is_err());
        assert!(Currency::new("12A").is_err());
    }

    #[test]
    fn money_rejects_negative_amounts() {
        let err = Money::new(-1, Currency::jpy()).unwrap_err();
        assert!(matches!(err, ValidationError::OutOfRange { .. }));
    }

    #[test]
    fn money_accepts_zero_and_positive_amounts() {
        assert_eq!(Money::new(0, Currency::jpy()).unwrap().amount_minor_units(), 0);
        let m = Money::new(98_000, Currency::jpy()).unwrap();
        assert_eq!(m.to_string(), "98000 JPY");
    }
}
