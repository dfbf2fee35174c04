//! PayPay configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::domain::payment::{OpaAuthSigner, SecretEncoding, SigningKey};

use super::error::ValidationError;
use super::stripe::{default_tolerance, validate_tolerance};

/// PayPay API credentials and webhook settings
#[derive(Debug, Clone, Deserialize)]
pub struct PayPayConfig {
    /// API key id carried in the OPA-Auth header
    pub api_key_id: String,

    /// API secret shared by webhook verification and API signing
    pub api_secret: SecretString,

    /// How `api_secret` becomes key bytes
    pub secret_encoding: SecretEncoding,

    /// Merchant id expected in `X-ASSUME-MERCHANT`
    pub merchant_id: String,

    /// Path the webhook is served on; part of the signed string
    #[serde(default = "default_webhook_path")]
    pub webhook_path: String,

    #[serde(default = "default_tolerance")]
    pub tolerance_secs: i64,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

impl PayPayConfig {
    pub fn signer(&self) -> Result<OpaAuthSigner, ValidationError> {
        let key = SigningKey::from_secret(self.api_secret.expose_secret(), self.secret_encoding)
            .map_err(|e| ValidationError::SecretEncodingMismatch {
                field: "PAYPAY__API_SECRET",
                reason: e.to_string(),
            })?;
        Ok(OpaAuthSigner::new(self.api_key_id.clone(), key))
    }

    /// Validate PayPay configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.api_key_id.trim().is_empty() {
            return Err(ValidationError::MissingRequired("PAYPAY__API_KEY_ID"));
        }
        if self.api_secret.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("PAYPAY__API_SECRET"));
        }
        if self.merchant_id.trim().is_empty() {
            return Err(ValidationError::MissingRequired("PAYPAY__MERCHANT_ID"));
        }
        if !self.webhook_path.starts_with('/') {
            return Err(ValidationError::InvalidWebhookPath);
        }
        self.signer()?;
        validate_tolerance(self.tolerance_secs)
    }
}

fn default_webhook_path() -> String {
    "/webhooks/paypay".to_string()
}

fn default_api_base_url() -> String {
    crate::adapters::paypay::DEFAULT_PAYPAY_API_BASE.to_string()
}
