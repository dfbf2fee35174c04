//! Operator commands and queries.
//!
//! Every mutation is written to the `audit` log target with the acting
//! operator's label.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::entitlement::AccessRight;
use crate::domain::foundation::{
    DiagnosisId, DomainError, ErrorCode, PurchaseId, Timestamp, UserId,
};
use crate::domain::payment::{
    Attribution, CanonicalEvent, CanonicalStatus, Money, PaymentProvider, Purchase,
};
use crate::ports::{AccessRightStore, DiagnosisReader, PurchaseLedger};

use super::entitlement_granter::EntitlementChange;
use super::settle_payment::SettlePaymentHandler;

/// Registers the pending row a checkout creates before the payment completes.
#[derive(Debug, Clone)]
pub struct RegisterPendingPurchaseCommand {
    pub provider: PaymentProvider,
    pub external_event_id: String,
    pub user_id: UserId,
    pub diagnosis_id: DiagnosisId,
    pub amount: Money,
    pub operator: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterPendingPurchaseResult {
    pub purchase: Purchase,
    pub created: bool,
}

/// A user's ledger rows with the access rights they produced.
#[derive(Debug, Clone, Serialize)]
pub struct UserEntitlements {
    pub purchases: Vec<Purchase>,
    pub access_rights: Vec<AccessRight>,
}

#[derive(Debug, Clone)]
pub struct ReapplyEntitlementCommand {
    pub purchase_id: PurchaseId,
    pub operator: String,
}

#[derive(Debug, Clone)]
pub struct ReapplyEntitlementResult {
    pub purchase: Purchase,
    pub change: EntitlementChange,
}

pub struct AdminHandler {
    ledger: Arc<dyn PurchaseLedger>,
    rights: Arc<dyn AccessRightStore>,
    diagnoses: Arc<dyn DiagnosisReader>,
    settle: Arc<SettlePaymentHandler>,
}

impl AdminHandler {
    pub fn new(
        ledger: Arc<dyn PurchaseLedger>,
        rights: Arc<dyn AccessRightStore>,
        diagnoses: Arc<dyn DiagnosisReader>,
        settle: Arc<SettlePaymentHandler>,
    ) -> Self {
        Self {
            ledger,
            rights,
            diagnoses,
            settle,
        }
    }

    pub async fn register_pending(
        &self,
        cmd: RegisterPendingPurchaseCommand,
    ) -> Result<RegisterPendingPurchaseResult, DomainError> {
        if !self.diagnoses.exists(&cmd.diagnosis_id).await? {
            return Err(DomainError::new(
                ErrorCode::DiagnosisNotFound,
                format!("diagnosis {} does not exist", cmd.diagnosis_id),
            ));
        }

        let event = CanonicalEvent {
            provider: cmd.provider,
            external_event_id: cmd.external_event_id.clone(),
            attribution: Some(Attribution {
                user_id: cmd.user_id.clone(),
                diagnosis_id: cmd.diagnosis_id.clone(),
            }),
            amount: Some(cmd.amount.clone()),
            raw_status: "CREATED".to_string(),
            status: CanonicalStatus::Other,
            metadata: serde_json::json!({ "source": "admin", "operator": cmd.operator }),
            observed_at: Timestamp::now(),
        };

        let outcome = self.settle.settle(&event, "admin").await?;

        tracing::info!(
            target: "audit",
            operator = %cmd.operator,
            action = "register_pending_purchase",
            purchase_id = %outcome.purchase.id,
            purchase_key = %outcome.purchase.key(),
            created = outcome.created,
            "admin action"
        );

        Ok(RegisterPendingPurchaseResult {
            purchase: outcome.purchase,
            created: outcome.created,
        })
    }

    pub async fn list_for_user(&self, user_id: &UserId) -> Result<UserEntitlements, DomainError> {
        Ok(UserEntitlements {
            purchases: self.ledger.list_for_user(user_id).await?,
            access_rights: self.rights.list_for_user(user_id).await?,
        })
    }

    /// Re-runs the entitlement step for one purchase.
    pub async fn reapply(
        &self,
        cmd: ReapplyEntitlementCommand,
    ) -> Result<ReapplyEntitlementResult, DomainError> {
        let purchase = self
            .ledger
            .find_by_id(&cmd.purchase_id)
            .await?
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::PurchaseNotFound,
                    format!("purchase {} not found", cmd.purchase_id),
                )
            })?;

        let change = self.settle.granter().ensure(&purchase).await?;

        tracing::info!(
            target: "audit",
            operator = %cmd.operator,
            action = "reapply_entitlement",
            purchase_id = %purchase.id,
            status = %purchase.status,
            change = ?change,
            "admin action"
        );

        Ok(ReapplyEntitlementResult { purchase, change })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::alert::InMemoryAlertSink;
    use crate::adapters::memory::{
        InMemoryAccessRightStore, InMemoryDiagnosisReader, InMemoryPurchaseLedger,
    };
    use crate::adapters::notify::NoopNotifier;
    use crate::application::handlers::payment::EntitlementGranter;
    use crate::domain::payment::{Currency, PurchaseStatus};

    struct Fixture {
        ledger: InMemoryPurchaseLedger,
        rights: InMemoryAccessRightStore,
        admin: AdminHandler,
    }

    fn fixture() -> Fixture {
        let ledger = InMemoryPurchaseLedger::new();
        let rights = InMemoryAccessRightStore::new();
        let diagnoses = Arc::new(InMemoryDiagnosisReader::with_diagnoses(["d1"]));
        let granter = Arc::new(EntitlementGranter::new(
            diagnoses.clone(),
            Arc::new(rights.clone()),
            Arc::new(ledger.clone()),
            Arc::new(NoopNotifier),
        ));
        let settle = Arc::new(SettlePaymentHandler::new(
            Arc::new(ledger.clone()),
            granter,
            Arc::new(InMemoryAlertSink::new()),
        ));
        let admin = AdminHandler::new(
            Arc::new(ledger.clone()),
            Arc::new(rights.clone()),
            diagnoses,
            settle,
        );
        Fixture {
            ledger,
            rights,
            admin,
        }
    }

    fn register(diagnosis: &str) -> RegisterPendingPurchaseCommand {
        RegisterPendingPurchaseCommand {
            provider: PaymentProvider::PayPay,
            external_event_id: "mp_1".to_string(),
            user_id: UserId::new("u1").unwrap(),
            diagnosis_id: DiagnosisId::new(diagnosis).unwrap(),
            amount: Money::new(98_000, Currency::jpy()).unwrap(),
            operator: "ops".to_string(),
        }
    }

    #[tokio::test]
    async fn register_pending_creates_pending_row_once() {
        let f = fixture();

        let first = f.admin.register_pending(register("d1")).await.unwrap();
        let second = f.admin.register_pending(register("d1")).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.purchase.status, PurchaseStatus::Pending);
        assert_eq!(f.ledger.len().await, 1);
    }

    #[tokio::test]
    async fn register_pending_rejects_unknown_diagnosis() {
        let f = fixture();
        let err = f.admin.register_pending(register("d9")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::DiagnosisNotFound);
        assert!(f.ledger.is_empty().await);
    }

    #[tokio::test]
    async fn reapply_unknown_purchase_is_not_found() {
        let f = fixture();
        let err = f
            .admin
            .reapply(ReapplyEntitlementCommand {
                purchase_id: PurchaseId::new(),
                operator: "ops".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::PurchaseNotFound);
    }

    #[tokio::test]
    async fn reapply_restores_lost_grant() {
        let f = fixture();
        let event = crate::domain::payment::fixtures::canonical(
            PaymentProvider::Stripe,
            "cs_1",
            CanonicalStatus::Completed,
        );
        let purchase = f.ledger.record_or_advance(&event).await.unwrap().purchase;

        let result = f
            .admin
            .reapply(ReapplyEntitlementCommand {
                purchase_id: purchase.id,
                operator: "ops".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(result.change, EntitlementChange::Granted);
        let listing = f.admin.list_for_user(&UserId::new("u1").unwrap()).await.unwrap();
        assert_eq!(listing.purchases.len(), 1);
        assert_eq!(listing.access_rights.len(), 1);
        assert_eq!(f.rights.len().await, 1);
    }
}
