//! Provider-dispatching webhook verifier.
//!
//! One capability, one variant per provider. Nothing downstream of
//! [`WebhookVerifier::verify`] sees an unauthenticated byte.

use axum::http::HeaderMap;
use subtle::ConstantTimeEq;

use crate::domain::foundation::Timestamp;

use super::event::{PaymentEvent, VerifiedEvent};
use super::paypay_signature::MERCHANT_HEADER;
use super::paypay_verifier::PayPayVerifier;
use super::provider::PaymentProvider;
use super::stripe_verifier::{StripeSignatureVerifier, STRIPE_SIGNATURE_HEADER};
use super::webhook_errors::WebhookError;

/// Default replay window (5 minutes).
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Authenticates deliveries for every configured provider.
#[derive(Debug, Clone, Default)]
pub struct WebhookVerifier {
    stripe: Option<StripeSignatureVerifier>,
    paypay: Option<PayPayVerifier>,
}

impl WebhookVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stripe(mut self, verifier: StripeSignatureVerifier) -> Self {
        self.stripe = Some(verifier);
        self
    }

    pub fn with_paypay(mut self, verifier: PayPayVerifier) -> Self {
        self.paypay = Some(verifier);
        self
    }

    pub fn is_configured(&self, provider: PaymentProvider) -> bool {
        match provider {
            PaymentProvider::Stripe => self.stripe.is_some(),
            PaymentProvider::PayPay => self.paypay.is_some(),
        }
    }

    /// Authenticates a raw delivery and returns its parsed JSON.
    pub fn verify(
        &self,
        event: &PaymentEvent,
        headers: &HeaderMap,
        now: Timestamp,
    ) -> Result<VerifiedEvent, WebhookError> {
        let payload = match event.provider {
            PaymentProvider::Stripe => {
                let verifier = self.stripe.as_ref().ok_or_else(not_configured)?;
                let signature = header_str(headers, STRIPE_SIGNATURE_HEADER)?
                    .ok_or(WebhookError::MissingHeader(STRIPE_SIGNATURE_HEADER))?;
                verifier.verify(&event.raw_payload, signature, now)?
            }
            PaymentProvider::PayPay => {
                let verifier = self.paypay.as_ref().ok_or_else(not_configured)?;
                let authorization = header_str(headers, "Authorization")?
                    .ok_or(WebhookError::MissingHeader("Authorization"))?;
                let merchant = header_str(headers, MERCHANT_HEADER)?;
                verifier.verify(&event.raw_payload, authorization, merchant, now)?
            }
        };

        Ok(VerifiedEvent {
            provider: event.provider,
            payload,
            received_at: event.received_at,
        })
    }
}

fn not_configured() -> WebhookError {
    WebhookError::UnknownCredential("provider not configured".to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<Option<&'a str>, WebhookError> {
    headers
        .get(name)
        .map(|v| {
            v.to_str()
                .map_err(|_| WebhookError::MalformedHeader(format!("{} is not ASCII", name)))
        })
        .transpose()
}

/// Rejects timestamps more than `tolerance_secs` away from `now`.
pub(crate) fn check_freshness(
    timestamp: i64,
    now: Timestamp,
    tolerance_secs: i64,
) -> Result<(), WebhookError> {
    let Some(age) = now.as_unix_secs().checked_sub(timestamp) else {
        tracing::warn!(event_timestamp = timestamp, "Rejected webhook with unrepresentable age");
        return Err(WebhookError::TimestampOutOfRange);
    };

    if age > tolerance_secs {
        tracing::warn!(event_timestamp = timestamp, age_secs = age, "Rejected stale webhook");
        return Err(WebhookError::TimestampOutOfRange);
    }
    if age < -tolerance_secs {
        tracing::warn!(event_timestamp = timestamp, age_secs = age, "Rejected future-dated webhook");
        return Err(WebhookError::InvalidTimestamp);
    }

    Ok(())
}

/// Constant-time byte comparison. Length is not secret.
pub(crate) fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
