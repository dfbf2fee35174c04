//! PurchaseLedger port - Idempotent store of purchase rows.
//!
//! The ledger is the single serialization point for one payment: every
//! delivery, redelivery and reconciler observation goes through
//! [`PurchaseLedger::record_or_advance`], and implementations must make that
//! operation atomic with respect to the `(provider, external_event_id)`
//! uniqueness constraint. Concurrent duplicates never produce two rows.

use async_trait::async_trait;

use crate::domain::foundation::{
    DiagnosisId, DomainError, ErrorCode, PurchaseId, Timestamp, UserId,
};
use crate::domain::payment::{CanonicalEvent, Purchase, PurchaseKey, PurchaseStatus};

/// What `record_or_advance` did.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordOutcome {
    /// Row as stored after the call.
    pub purchase: Purchase,
    /// True if this call moved the row into a new status (including insert
    /// directly into a non-pending status).
    pub transitioned: bool,
    /// True if this call inserted the row.
    pub created: bool,
    /// Status before the call; `None` on insert.
    pub previous_status: Option<PurchaseStatus>,
}

impl RecordOutcome {
    pub fn inserted(purchase: Purchase) -> Self {
        Self {
            transitioned: purchase.status != PurchaseStatus::Pending,
            created: true,
            previous_status: None,
            purchase,
        }
    }

    pub fn advanced(purchase: Purchase, previous: PurchaseStatus) -> Self {
        Self {
            purchase,
            transitioned: true,
            created: false,
            previous_status: Some(previous),
        }
    }

    pub fn unchanged(purchase: Purchase) -> Self {
        Self {
            previous_status: Some(purchase.status),
            purchase,
            transitioned: false,
            created: false,
        }
    }

    /// True if this call moved the row into `status`.
    pub fn transitioned_into(&self, status: PurchaseStatus) -> bool {
        self.transitioned && self.purchase.status == status
    }
}

/// Error for an event that contradicts the stored status.
pub fn integrity_violation(
    key: &PurchaseKey,
    from: PurchaseStatus,
    to: PurchaseStatus,
) -> DomainError {
    DomainError::new(
        ErrorCode::InvalidStateTransition,
        format!("{} cannot move from {} to {}", key, from, to),
    )
    .with_detail("purchase_key", key.to_string())
    .with_detail("from", from.as_str())
    .with_detail("to", to.as_str())
}

/// Error for the first event of a key that cannot build a row.
pub fn unattributed(key: &PurchaseKey, reason: impl std::fmt::Display) -> DomainError {
    DomainError::validation(
        "attribution",
        format!("first event for unknown purchase {} is incomplete: {}", key, reason),
    )
}

/// Port for the durable purchase ledger.
#[async_trait]
pub trait PurchaseLedger: Send + Sync {
    /// Insert on first sight, otherwise advance strictly forward.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` - first sight of a key without attribution or amount
    /// - `InvalidStateTransition` - event contradicts the stored status
    /// - `DatabaseError` - storage failure
    async fn record_or_advance(&self, event: &CanonicalEvent)
        -> Result<RecordOutcome, DomainError>;

    async fn find_by_key(&self, key: &PurchaseKey) -> Result<Option<Purchase>, DomainError>;

    async fn find_by_id(&self, id: &PurchaseId) -> Result<Option<Purchase>, DomainError>;

    /// Pending rows created before `older_than`. Rows never polled come
    /// first, then the least recently polled, so rows that stay pending
    /// cannot hold the batch.
    async fn find_stale_pending(
        &self,
        older_than: Timestamp,
        limit: u32,
    ) -> Result<Vec<Purchase>, DomainError>;

    /// Records that the reconciler queried the provider for this row.
    async fn mark_polled(&self, id: &PurchaseId, at: Timestamp) -> Result<(), DomainError>;

    /// Completed purchases of one report by one user.
    async fn find_completed_for_resource(
        &self,
        user_id: &UserId,
        diagnosis_id: &DiagnosisId,
    ) -> Result<Vec<Purchase>, DomainError>;

    /// All purchases of a user, newest first.
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Purchase>, DomainError>;
}
