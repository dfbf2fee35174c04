//! Payment processor identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// External payment processor that can confirm a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    /// Card-network processor, signs with `Stripe-Signature`.
    Stripe,
    /// QR / mobile wallet processor, signs with `OPA-Auth`.
    PayPay,
}

impl PaymentProvider {
    pub const ALL: [PaymentProvider; 2] = [PaymentProvider::Stripe, PaymentProvider::PayPay];

    /// Stable lowercase name used in storage and routes.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentProvider::Stripe => "stripe",
            PaymentProvider::PayPay => "paypay",
        }
    }
}

impl fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentProvider {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stripe" => Ok(PaymentProvider::Stripe),
            "paypay" => Ok(PaymentProvider::PayPay),
            other => Err(ValidationError::invalid_format(
                "provider",
                format!("unknown payment provider '{}'", other),
            )),
        }
    }
}
