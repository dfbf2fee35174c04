//! EntitlementGranter - Derives access rights from purchase state.
//!
//! The access right for `(user, diagnosis)` follows the purchases behind it:
//! full while any completed purchase backs it, preview once the backing
//! purchase is refunded and no other completed purchase remains. Rows are
//! never deleted.

use std::sync::Arc;

use crate::domain::entitlement::{AccessRight, AccessRightKey};
use crate::domain::foundation::{DomainError, ErrorCode, PurchaseId, Timestamp};
use crate::domain::payment::{Purchase, PurchaseStatus};
use crate::ports::{
    AccessRightStore, DiagnosisReader, PaymentNotifier, PurchaseLedger, UpsertOutcome,
};

/// What a grant, revoke or ensure pass did to the access right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntitlementChange {
    /// Row set to full through this purchase.
    Granted,
    /// Row was already full through this purchase.
    AlreadyGranted,
    /// Row set to preview.
    Downgraded,
    /// Row moved to another completed purchase of the same report.
    Repointed(PurchaseId),
    /// Row already reflected the purchase state.
    Unchanged,
    /// Purchase status carries no entitlement (pending, failed).
    NotApplicable,
}

pub struct EntitlementGranter {
    diagnoses: Arc<dyn DiagnosisReader>,
    rights: Arc<dyn AccessRightStore>,
    ledger: Arc<dyn PurchaseLedger>,
    notifier: Arc<dyn PaymentNotifier>,
}

impl EntitlementGranter {
    pub fn new(
        diagnoses: Arc<dyn DiagnosisReader>,
        rights: Arc<dyn AccessRightStore>,
        ledger: Arc<dyn PurchaseLedger>,
        notifier: Arc<dyn PaymentNotifier>,
    ) -> Self {
        Self {
            diagnoses,
            rights,
            ledger,
            notifier,
        }
    }

    /// Grants full access for a purchase that just completed and notifies
    /// the buyer.
    ///
    /// # Errors
    ///
    /// - `DiagnosisNotFound` - the purchased report does not exist
    pub async fn grant(&self, purchase: &Purchase) -> Result<EntitlementChange, DomainError> {
        self.write_full(purchase, true).await
    }

    async fn write_full(
        &self,
        purchase: &Purchase,
        notify: bool,
    ) -> Result<EntitlementChange, DomainError> {
        if !self.diagnoses.exists(&purchase.diagnosis_id).await? {
            return Err(DomainError::new(
                ErrorCode::DiagnosisNotFound,
                format!(
                    "purchase {} references unknown diagnosis {}",
                    purchase.key(),
                    purchase.diagnosis_id
                ),
            )
            .with_detail("diagnosis_id", purchase.diagnosis_id.as_str()));
        }

        let right = AccessRight::full(resource_key(purchase), purchase.id, Timestamp::now());
        match self.rights.grant_full(&right).await? {
            UpsertOutcome::Written => {
                tracing::info!(
                    purchase_id = %purchase.id,
                    access_right = %right.key,
                    "granted full access"
                );
                if notify {
                    self.notify(purchase);
                }
                Ok(EntitlementChange::Granted)
            }
            UpsertOutcome::Unchanged => Ok(EntitlementChange::AlreadyGranted),
        }
    }

    /// Repairs a missing or downgraded grant for a completed purchase.
    ///
    /// A row already full through any purchase that is still completed is
    /// left alone, so redeliveries never rewrite it. Repairs do not notify.
    async fn ensure_full(&self, purchase: &Purchase) -> Result<EntitlementChange, DomainError> {
        if let Some(current) = self.rights.find(&resource_key(purchase)).await? {
            if current.is_full_via(&purchase.id) {
                return Ok(EntitlementChange::AlreadyGranted);
            }
            if current.is_full() && self.is_backed(&current).await? {
                return Ok(EntitlementChange::Unchanged);
            }
        }
        self.write_full(purchase, false).await
    }

    async fn is_backed(&self, right: &AccessRight) -> Result<bool, DomainError> {
        let Some(id) = right.purchase_id else {
            return Ok(false);
        };
        Ok(self
            .ledger
            .find_by_id(&id)
            .await?
            .map_or(false, |p| p.status == PurchaseStatus::Completed))
    }

    /// Withdraws the access a refunded purchase provided.
    ///
    /// If another completed purchase of the same report exists, the row is
    /// re-pointed to it and stays full.
    pub async fn revoke(&self, purchase: &Purchase) -> Result<EntitlementChange, DomainError> {
        let key = resource_key(purchase);
        let now = Timestamp::now();

        let other = self
            .ledger
            .find_completed_for_resource(&purchase.user_id, &purchase.diagnosis_id)
            .await?
            .into_iter()
            .find(|p| p.id != purchase.id);

        if let Some(other) = other {
            let current = self.rights.find(&key).await?;
            if current.map_or(false, |r| r.is_full_via(&other.id)) {
                return Ok(EntitlementChange::Unchanged);
            }
            self.rights
                .grant_full(&AccessRight::full(key.clone(), other.id, now))
                .await?;
            tracing::info!(
                refunded_purchase_id = %purchase.id,
                backing_purchase_id = %other.id,
                access_right = %key,
                "access re-pointed to remaining purchase"
            );
            return Ok(EntitlementChange::Repointed(other.id));
        }

        match self
            .rights
            .downgrade(&AccessRight::preview(key.clone(), purchase.id, now))
            .await?
        {
            UpsertOutcome::Written => {
                tracing::info!(purchase_id = %purchase.id, access_right = %key, "downgraded to preview");
                Ok(EntitlementChange::Downgraded)
            }
            UpsertOutcome::Unchanged => Ok(EntitlementChange::Unchanged),
        }
    }

    /// Brings the access right in line with the purchase's current status.
    ///
    /// Repairs rows left behind when a process died between the ledger write
    /// and the grant; a redelivery then finishes the job.
    pub async fn ensure(&self, purchase: &Purchase) -> Result<EntitlementChange, DomainError> {
        match purchase.status {
            PurchaseStatus::Completed => self.ensure_full(purchase).await,
            PurchaseStatus::Refunded => self.revoke(purchase).await,
            PurchaseStatus::Pending | PurchaseStatus::Failed => Ok(EntitlementChange::NotApplicable),
        }
    }

    fn notify(&self, purchase: &Purchase) {
        let notifier = Arc::clone(&self.notifier);
        let purchase = purchase.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.purchase_completed(&purchase).await {
                tracing::warn!(purchase_id = %purchase.id, error = %e, "purchase notification failed");
            }
        });
    }
}

fn resource_key(purchase: &Purchase) -> AccessRightKey {
    AccessRightKey::diagnosis(purchase.user_id.clone(), purchase.diagnosis_id.clone())
}
