//! Stripe configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::domain::payment::{SecretEncoding, SigningKey, DEFAULT_TOLERANCE_SECS};

use super::error::ValidationError;

/// Stripe credentials and webhook settings
#[derive(Debug, Clone, Deserialize)]
pub struct StripeConfig {
    /// Secret API key used for Checkout Session lookups
    pub api_key: SecretString,

    /// Webhook endpoint signing secret (`whsec_...`)
    pub webhook_secret: SecretString,

    /// How `webhook_secret` becomes key bytes
    pub secret_encoding: SecretEncoding,

    /// Replay window for `Stripe-Signature` timestamps
    #[serde(default = "default_tolerance")]
    pub tolerance_secs: i64,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

impl StripeConfig {
    /// Check if using Stripe test mode
    pub fn is_test_mode(&self) -> bool {
        self.api_key.expose_secret().starts_with("sk_test_")
    }

    /// Webhook key bytes per the configured encoding.
    pub fn signing_key(&self) -> Result<SigningKey, ValidationError> {
        SigningKey::from_secret(self.webhook_secret.expose_secret(), self.secret_encoding).map_err(
            |e| ValidationError::SecretEncodingMismatch {
                field: "STRIPE__WEBHOOK_SECRET",
                reason: e.to_string(),
            },
        )
    }

    /// Validate Stripe configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        let api_key = self.api_key.expose_secret();
        if api_key.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE__API_KEY"));
        }
        // Restricted keys (rk_) are enough for read-only session lookups.
        if !api_key.starts_with("sk_") && !api_key.starts_with("rk_") {
            return Err(ValidationError::InvalidStripeKey);
        }

        let secret = self.webhook_secret.expose_secret();
        if secret.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE__WEBHOOK_SECRET"));
        }
        if self.secret_encoding == SecretEncoding::Raw && !secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }
        self.signing_key()?;

        validate_tolerance(self.tolerance_secs)
    }
}

pub(super) fn validate_tolerance(tolerance_secs: i64) -> Result<(), ValidationError> {
    if !(1..=3600).contains(&tolerance_secs) {
        return Err(ValidationError::InvalidTolerance);
    }
    Ok(())
}

pub(super) fn default_tolerance() -> i64 {
    DEFAULT_TOLERANCE_SECS
}

fn default_api_base_url() -> String {
    crate::adapters::stripe::DEFAULT_STRIPE_API_BASE.to_string()
}
