//! Purchase ledger row.

use serde::Serialize;
use std::fmt;

use crate::domain::foundation::{
    DiagnosisId, IllegalTransition, PurchaseId, StateMachine, Timestamp, UserId,
    ValidationError,
};

use super::event::CanonicalEvent;
use super::money::Money;
use super::provider::PaymentProvider;
use super::status::PurchaseStatus;

/// Idempotency key: one purchase per provider event identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PurchaseKey {
    pub provider: PaymentProvider,
    pub external_event_id: String,
}

impl PurchaseKey {
    pub fn new(provider: PaymentProvider, external_event_id: impl Into<String>) -> Self {
        Self {
            provider,
            external_event_id: external_event_id.into(),
        }
    }
}

impl fmt::Display for PurchaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.external_event_id)
    }
}

/// Durable record of one payment attempt for one report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Purchase {
    pub id: PurchaseId,
    pub provider: PaymentProvider,
    pub external_event_id: String,
    pub diagnosis_id: DiagnosisId,
    pub user_id: UserId,
    pub amount: Money,
    pub status: PurchaseStatus,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub updated_at: Timestamp,
    /// Last time the reconciler asked the provider about this row.
    pub last_polled_at: Option<Timestamp>,
    pub metadata: serde_json::Value,
}

impl Purchase {
    /// Builds the first row for an event key.
    ///
    /// Requires attribution and amount; an event lacking them can only
    /// advance a row that already exists.
    pub fn first_sight(event: &CanonicalEvent, now: Timestamp) -> Result<Self, ValidationError> {
        let attribution = event
            .attribution
            .as_ref()
            .ok_or_else(|| ValidationError::empty_field("attribution"))?;
        let amount = event
            .amount
            .clone()
            .ok_or_else(|| ValidationError::empty_field("amount"))?;
        let status = event.status.target();

        Ok(Self {
            id: PurchaseId::new(),
            provider: event.provider,
            external_event_id: event.external_event_id.clone(),
            diagnosis_id: attribution.diagnosis_id.clone(),
            user_id: attribution.user_id.clone(),
            amount,
            status,
            created_at: now,
            completed_at: completion_time(status, now),
            updated_at: now,
            last_polled_at: None,
            metadata: event.metadata.clone(),
        })
    }

    pub fn key(&self) -> PurchaseKey {
        PurchaseKey::new(self.provider, self.external_event_id.clone())
    }

    /// Moves the row one legal step forward.
    pub fn advance(
        &mut self,
        target: PurchaseStatus,
        now: Timestamp,
    ) -> Result<(), IllegalTransition<PurchaseStatus>> {
        self.status = self.status.transition_to(target)?;
        if target == PurchaseStatus::Completed {
            self.completed_at = Some(now);
        }
        self.updated_at = now;
        Ok(())
    }

    /// Stale pending row the reconciler should look at.
    pub fn is_stale_pending(&self, cutoff: &Timestamp) -> bool {
        self.status == PurchaseStatus::Pending && self.created_at.is_before(cutoff)
    }

    /// Reconciler queue position: never-polled rows first, then least
    /// recently polled, then oldest.
    pub fn poll_order(&self) -> (Option<Timestamp>, Timestamp) {
        (self.last_polled_at, self.created_at)
    }
}

fn completion_time(status: PurchaseStatus, now: Timestamp) -> Option<Timestamp> {
    match status {
        PurchaseStatus::Completed | PurchaseStatus::Refunded => Some(now),
        _ => None,
    }
}
