//! In-memory purchase ledger.
//!
//! The write lock around the whole map plays the role the unique constraint
//! and conditional `UPDATE` play in PostgreSQL, so concurrent callers observe
//! the same insert-or-advance semantics.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DiagnosisId, DomainError, PurchaseId, Timestamp, UserId};
use crate::domain::payment::{
    CanonicalEvent, Purchase, PurchaseKey, PurchaseStatus, TransitionDecision,
};
use crate::ports::{integrity_violation, unattributed, PurchaseLedger, RecordOutcome};

/// Ledger backed by a `HashMap` keyed on provider event identity.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPurchaseLedger {
    rows: Arc<RwLock<HashMap<PurchaseKey, Purchase>>>,
}

impl InMemoryPurchaseLedger {
    pub fn new() -> Self {
        Self::default()
    }

    // === Test Helpers ===

    /// Number of stored rows.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    /// Moves a row's creation time into the past.
    pub async fn backdate(&self, key: &PurchaseKey, secs: i64) {
        if let Some(row) = self.rows.write().await.get_mut(key) {
            row.created_at = row.created_at.plus_secs(-secs);
        }
    }
}

#[async_trait]
impl PurchaseLedger for InMemoryPurchaseLedger {
    async fn record_or_advance(
        &self,
        event: &CanonicalEvent,
    ) -> Result<RecordOutcome, DomainError> {
        let key = PurchaseKey::new(event.provider, event.external_event_id.clone());
        let now = Timestamp::now();
        let mut rows = self.rows.write().await;

        let Some(current) = rows.get_mut(&key) else {
            let purchase = Purchase::first_sight(event, now).map_err(|e| unattributed(&key, e))?;
            rows.insert(key, purchase.clone());
            return Ok(RecordOutcome::inserted(purchase));
        };

        let target = event.status.target();
        match current.status.classify(target) {
            TransitionDecision::Duplicate | TransitionDecision::Stale => {
                Ok(RecordOutcome::unchanged(current.clone()))
            }
            TransitionDecision::Advance => {
                let previous = current.status;
                current
                    .advance(target, now)
                    .map_err(|_| integrity_violation(&key, previous, target))?;
                Ok(RecordOutcome::advanced(current.clone(), previous))
            }
            TransitionDecision::Illegal => Err(integrity_violation(&key, current.status, target)),
        }
    }

    async fn find_by_key(&self, key: &PurchaseKey) -> Result<Option<Purchase>, DomainError> {
        Ok(self.rows.read().await.get(key).cloned())
    }

    async fn find_by_id(&self, id: &PurchaseId) -> Result<Option<Purchase>, DomainError> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .find(|p| &p.id == id)
            .cloned())
    }

    async fn find_stale_pending(
        &self,
        older_than: Timestamp,
        limit: u32,
    ) -> Result<Vec<Purchase>, DomainError> {
        let rows = self.rows.read().await;
        let mut stale: Vec<Purchase> = rows
            .values()
            .filter(|p| p.is_stale_pending(&older_than))
            .cloned()
            .collect();
        stale.sort_by_key(Purchase::poll_order);
        stale.truncate(limit as usize);
        Ok(stale)
    }

    async fn mark_polled(&self, id: &PurchaseId, at: Timestamp) -> Result<(), DomainError> {
        if let Some(row) = self.rows.write().await.values_mut().find(|p| &p.id == id) {
            row.last_polled_at = Some(at);
        }
        Ok(())
    }

    async fn find_completed_for_resource(
        &self,
        user_id: &UserId,
        diagnosis_id: &DiagnosisId,
    ) -> Result<Vec<Purchase>, DomainError> {
        let rows = self.rows.read().await;
        let mut found: Vec<Purchase> = rows
            .values()
            .filter(|p| {
                p.status == PurchaseStatus::Completed
                    && &p.user_id == user_id
                    && &p.diagnosis_id == diagnosis_id
            })
            .cloned()
            .collect();
        found.sort_by_key(|p| p.completed_at);
        Ok(found)
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Purchase>, DomainError> {
        let rows = self.rows.read().await;
        let mut found: Vec<Purchase> = rows
            .values()
            .filter(|p| &p.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }
}
