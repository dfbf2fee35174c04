//! Stripe webhook signature verification.
//!
//! `Stripe-Signature: t=<unix>,v1=<hex>[,v1=<hex>...]` where each `v1` is
//! HMAC-SHA256 over `"<t>." + body`. Multiple `v1` entries appear while a
//! secret is being rolled; any match is accepted.

use hmac::Mac;

use crate::domain::foundation::Timestamp;

use super::signing_key::SigningKey;
use super::webhook_errors::WebhookError;
use super::webhook_verifier::{check_freshness, constant_time_compare};

pub const STRIPE_SIGNATURE_HEADER: &str = "Stripe-Signature";

/// Parsed components from the Stripe-Signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    /// Unix timestamp when the signature was generated.
    pub timestamp: i64,
    /// All v1 signatures (HMAC-SHA256).
    pub v1_signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    /// Parses a Stripe-Signature header string.
    ///
    /// Unknown schemes (`v0`, future versions) are ignored.
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut timestamp: Option<i64> = None;
        let mut v1_signatures = Vec::new();

        for part in header.split(',') {
            let (key, value) = part.trim().split_once('=').ok_or_else(|| {
                WebhookError::MalformedHeader("invalid header format".to_string())
            })?;

            match key {
                "t" => {
                    timestamp = Some(value.parse().map_err(|_| {
                        WebhookError::MalformedHeader("invalid timestamp".to_string())
                    })?);
                }
                "v1" => {
                    v1_signatures.push(hex::decode(value).map_err(|_| {
                        WebhookError::MalformedHeader("invalid v1 signature hex".to_string())
                    })?);
                }
                _ => {}
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| WebhookError::MalformedHeader("missing timestamp".to_string()))?;
        if v1_signatures.is_empty() {
            return Err(WebhookError::MalformedHeader(
                "missing v1 signature".to_string(),
            ));
        }

        Ok(SignatureHeader {
            timestamp,
            v1_signatures,
        })
    }
}

/// Verifier for Stripe webhook signatures.
#[derive(Debug, Clone)]
pub struct StripeSignatureVerifier {
    key: SigningKey,
    tolerance_secs: i64,
}

impl StripeSignatureVerifier {
    pub fn new(key: SigningKey, tolerance_secs: i64) -> Self {
        Self {
            key,
            tolerance_secs,
        }
    }

    /// Verifies the header against the exact body bytes and parses the JSON.
    ///
    /// # Errors
    ///
    /// - `MalformedHeader` - header could not be parsed
    /// - `TimestampOutOfRange` / `InvalidTimestamp` - outside the tolerance
    /// - `InvalidSignature` - no `v1` entry matched
    /// - `ParseError` - authentic body that is not JSON
    pub fn verify(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: Timestamp,
    ) -> Result<serde_json::Value, WebhookError> {
        let header = SignatureHeader::parse(signature_header)?;

        check_freshness(header.timestamp, now, self.tolerance_secs)?;

        let expected = self.compute_signature(header.timestamp, payload);
        let matched = header
            .v1_signatures
            .iter()
            .fold(false, |acc, candidate| {
                constant_time_compare(&expected, candidate) | acc
            });
        if !matched {
            return Err(WebhookError::InvalidSignature);
        }

        serde_json::from_slice(payload).map_err(|e| WebhookError::ParseError(e.to_string()))
    }

    /// Produces a complete header value for `payload` at `timestamp`.
    pub fn sign(&self, timestamp: i64, payload: &[u8]) -> String {
        format!(
            "t={},v1={}",
            timestamp,
            hex::encode(self.compute_signature(timestamp, payload))
        )
    }

    fn compute_signature(&self, timestamp: i64, payload: &[u8]) -> Vec<u8> {
        let mut mac = self.key.hmac();
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}
