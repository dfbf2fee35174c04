//! Payment confirmation domain.
//!
//! Turns provider deliveries into ledger facts:
//!
//! 1. [`WebhookVerifier`] proves origin and freshness.
//! 2. [`normalizer`] maps the payload to a [`CanonicalEvent`] or `Ignored`.
//! 3. [`PurchaseStatus`] decides whether the ledger row may move.

mod event;
mod money;
pub mod normalizer;
mod paypay_signature;
mod paypay_verifier;
mod provider;
mod purchase;
mod signing_key;
mod status;
mod stripe_event;
mod stripe_verifier;
mod webhook_errors;
mod webhook_verifier;

pub use event::{Attribution, CanonicalEvent, Normalized, PaymentEvent, StatusReport, VerifiedEvent};
pub use money::{Currency, Money};
pub use paypay_signature::{
    content_digest, OpaAuthHeader, OpaAuthSigner, SignedRequest, JSON_CONTENT_TYPE,
    MERCHANT_HEADER, OPA_AUTH_PREFIX,
};
pub use paypay_verifier::PayPayVerifier;
pub use provider::PaymentProvider;
pub use purchase::{Purchase, PurchaseKey};
pub use signing_key::{SecretEncoding, SigningKey};
pub use status::{CanonicalStatus, PurchaseStatus, TransitionDecision};
pub use stripe_event::{StripeEvent, StripeEventType};
pub use stripe_verifier::{SignatureHeader, StripeSignatureVerifier, STRIPE_SIGNATURE_HEADER};
pub use webhook_errors::WebhookError;
pub use webhook_verifier::{WebhookVerifier, DEFAULT_TOLERANCE_SECS};

#[cfg(test)]
pub(crate) use event::fixtures;
