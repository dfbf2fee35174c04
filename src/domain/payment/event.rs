//! Event shapes along the inbound pipeline.
//!
//! `PaymentEvent` (raw delivery) → `VerifiedEvent` (authenticated JSON) →
//! `CanonicalEvent` (provider-neutral facts the ledger understands).

use serde::Serialize;

use crate::domain::foundation::{DiagnosisId, Timestamp, UserId};

use super::money::Money;
use super::provider::PaymentProvider;
use super::status::CanonicalStatus;

/// A raw delivery as received on the wire. Never persisted.
#[derive(Debug, Clone)]
pub struct PaymentEvent {
    pub provider: PaymentProvider,
    pub raw_payload: Vec<u8>,
    pub received_at: Timestamp,
}

impl PaymentEvent {
    pub fn new(provider: PaymentProvider, raw_payload: impl Into<Vec<u8>>) -> Self {
        Self {
            provider,
            raw_payload: raw_payload.into(),
            received_at: Timestamp::now(),
        }
    }
}

/// A delivery whose origin and freshness have been proven.
#[derive(Debug, Clone)]
pub struct VerifiedEvent {
    pub provider: PaymentProvider,
    pub payload: serde_json::Value,
    pub received_at: Timestamp,
}

/// Who bought what. Known from checkout metadata or a prior pending row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attribution {
    pub user_id: UserId,
    pub diagnosis_id: DiagnosisId,
}

/// Provider-neutral description of one payment state observation.
#[derive(Debug, Clone, Serialize)]
pub struct CanonicalEvent {
    pub provider: PaymentProvider,
    /// Idempotency key within the provider (checkout session / merchant payment id).
    pub external_event_id: String,
    pub attribution: Option<Attribution>,
    pub amount: Option<Money>,
    /// Provider's own status string, kept for audit.
    pub raw_status: String,
    pub status: CanonicalStatus,
    /// Provider-specific extras (transaction id, event type, ...).
    pub metadata: serde_json::Value,
    pub observed_at: Timestamp,
}

/// Answer to an outbound "what is the status of payment X" query.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub provider: PaymentProvider,
    pub external_event_id: String,
    /// Provider status vocabulary (`COMPLETED`, `paid`, `expired`, ...).
    pub raw_status: String,
    pub amount: Option<Money>,
    pub details: serde_json::Value,
}

/// Result of normalizing a verified payload.
#[derive(Debug, Clone)]
pub enum Normalized {
    Event(CanonicalEvent),
    /// Acknowledge and drop; the reason is logged.
    Ignored(String),
}
