//! SettlePaymentHandler - Ledger write followed by the entitlement effect.
//!
//! Shared by the webhook path, the reconciler and admin re-application so all
//! three apply identical semantics to a canonical event.

use std::sync::Arc;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::payment::{CanonicalEvent, Purchase, PurchaseKey, PurchaseStatus};
use crate::ports::{IntegrityAlert, IntegrityAlertSink, PurchaseLedger};

use super::entitlement_granter::{EntitlementChange, EntitlementGranter};

/// Outcome of settling one canonical event.
#[derive(Debug, Clone)]
pub struct SettleOutcome {
    pub purchase: Purchase,
    /// True if the ledger row changed status.
    pub transitioned: bool,
    /// True if the ledger row was created.
    pub created: bool,
    pub entitlement: EntitlementChange,
}

impl SettleOutcome {
    /// Redelivery or stale event; nothing moved in the ledger.
    pub fn is_duplicate(&self) -> bool {
        !self.transitioned && !self.created
    }
}

pub struct SettlePaymentHandler {
    ledger: Arc<dyn PurchaseLedger>,
    granter: Arc<EntitlementGranter>,
    alerts: Arc<dyn IntegrityAlertSink>,
}

impl SettlePaymentHandler {
    pub fn new(
        ledger: Arc<dyn PurchaseLedger>,
        granter: Arc<EntitlementGranter>,
        alerts: Arc<dyn IntegrityAlertSink>,
    ) -> Self {
        Self {
            ledger,
            granter,
            alerts,
        }
    }

    pub fn granter(&self) -> &Arc<EntitlementGranter> {
        &self.granter
    }

    /// Records the event and applies its entitlement effect.
    ///
    /// A transition into `completed` grants, into `refunded` revokes. An event
    /// that moved nothing runs the ensure pass so a grant lost to a crash is
    /// repaired by the provider's redelivery.
    ///
    /// # Errors
    ///
    /// - `InvalidStateTransition` / `DiagnosisNotFound` - alert raised
    /// - `ValidationFailed` - first sight of an unattributed event
    /// - `DatabaseError` - storage failure, safe to redeliver
    pub async fn settle(
        &self,
        event: &CanonicalEvent,
        source: &'static str,
    ) -> Result<SettleOutcome, DomainError> {
        let key = PurchaseKey::new(event.provider, event.external_event_id.clone());

        let recorded = match self.ledger.record_or_advance(event).await {
            Ok(recorded) => recorded,
            Err(e) => return Err(self.escalate(Some(key), e, source).await),
        };

        let purchase = recorded.purchase;
        let effect = if recorded.transitioned {
            match purchase.status {
                PurchaseStatus::Completed => self.granter.grant(&purchase).await,
                PurchaseStatus::Refunded => self.granter.revoke(&purchase).await,
                PurchaseStatus::Pending | PurchaseStatus::Failed => {
                    Ok(EntitlementChange::NotApplicable)
                }
            }
        } else {
            self.granter.ensure(&purchase).await
        };

        let entitlement = match effect {
            Ok(change) => change,
            Err(e) => return Err(self.escalate(Some(key), e, source).await),
        };

        if recorded.transitioned || recorded.created {
            tracing::info!(
                purchase_key = %key,
                purchase_id = %purchase.id,
                status = %purchase.status,
                previous_status = ?recorded.previous_status,
                raw_status = %event.raw_status,
                entitlement = ?entitlement,
                source,
                "purchase settled"
            );
        } else {
            tracing::debug!(
                purchase_key = %key,
                status = %purchase.status,
                entitlement = ?entitlement,
                source,
                "duplicate or stale event"
            );
        }

        Ok(SettleOutcome {
            purchase,
            transitioned: recorded.transitioned,
            created: recorded.created,
            entitlement,
        })
    }

    /// Raises an alert for integrity failures and hands the error back.
    async fn escalate(
        &self,
        key: Option<PurchaseKey>,
        err: DomainError,
        source: &'static str,
    ) -> DomainError {
        if is_integrity_failure(&err) {
            self.alerts
                .raise(IntegrityAlert::new(key, err.message.clone(), source))
                .await;
        }
        err
    }
}

pub(crate) fn is_integrity_failure(err: &DomainError) -> bool {
    matches!(
        err.code,
        ErrorCode::InvalidStateTransition
            | ErrorCode::DiagnosisNotFound
            | ErrorCode::ConflictingPurchase
    )
}
