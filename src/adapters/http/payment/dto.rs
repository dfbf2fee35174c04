//! HTTP DTOs for the webhook and admin endpoints.

use serde::{Deserialize, Serialize};

use crate::application::handlers::payment::{
    HandlePaymentWebhookResult, ReapplyEntitlementResult, RegisterPendingPurchaseResult,
    UserEntitlements,
};
use crate::domain::entitlement::{AccessLevel, AccessRight};
use crate::domain::payment::{PaymentProvider, Purchase, PurchaseStatus};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to register the pending purchase a checkout creates.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterPendingPurchaseRequest {
    pub provider: PaymentProvider,
    /// Checkout session id (Stripe) or merchant payment id (PayPay).
    pub external_event_id: String,
    pub user_id: String,
    pub diagnosis_id: String,
    pub amount_minor_units: i64,
    /// ISO-4217 code, defaults to JPY.
    #[serde(default)]
    pub currency: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Acknowledgement returned to the provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebhookAckResponse {
    pub received: bool,
    /// `recorded`, `duplicate` or `ignored`.
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PurchaseStatus>,
}

impl From<HandlePaymentWebhookResult> for WebhookAckResponse {
    fn from(result: HandlePaymentWebhookResult) -> Self {
        let (outcome, purchase_id, status) = match result {
            HandlePaymentWebhookResult::Recorded {
                purchase_id,
                status,
            } => ("recorded", Some(purchase_id), Some(status)),
            HandlePaymentWebhookResult::Duplicate {
                purchase_id,
                status,
            } => ("duplicate", Some(purchase_id), Some(status)),
            HandlePaymentWebhookResult::Ignored(_) => ("ignored", None, None),
        };
        Self {
            received: true,
            outcome: outcome.to_string(),
            purchase_id,
            status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PurchaseResponse {
    pub id: String,
    pub provider: PaymentProvider,
    pub external_event_id: String,
    pub user_id: String,
    pub diagnosis_id: String,
    pub amount_minor_units: i64,
    pub currency: String,
    pub status: PurchaseStatus,
    /// ISO 8601
    pub created_at: String,
    pub completed_at: Option<String>,
}

impl From<Purchase> for PurchaseResponse {
    fn from(purchase: Purchase) -> Self {
        Self {
            id: purchase.id.to_string(),
            provider: purchase.provider,
            external_event_id: purchase.external_event_id,
            user_id: purchase.user_id.to_string(),
            diagnosis_id: purchase.diagnosis_id.to_string(),
            amount_minor_units: purchase.amount.amount_minor_units(),
            currency: purchase.amount.currency().as_str().to_string(),
            status: purchase.status,
            created_at: purchase.created_at.to_string(),
            completed_at: purchase.completed_at.map(|t| t.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessRightResponse {
    pub resource_type: String,
    pub resource_id: String,
    pub access_level: AccessLevel,
    pub purchase_id: Option<String>,
    pub valid_from: String,
    pub valid_until: Option<String>,
}

impl From<AccessRight> for AccessRightResponse {
    fn from(right: AccessRight) -> Self {
        Self {
            resource_type: right.key.resource_type.as_str().to_string(),
            resource_id: right.key.resource_id.to_string(),
            access_level: right.access_level,
            purchase_id: right.purchase_id.map(|id| id.to_string()),
            valid_from: right.valid_from.to_string(),
            valid_until: right.valid_until.map(|t| t.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegisterPendingPurchaseResponse {
    pub purchase: PurchaseResponse,
    /// False when the row already existed.
    pub created: bool,
}

impl From<RegisterPendingPurchaseResult> for RegisterPendingPurchaseResponse {
    fn from(result: RegisterPendingPurchaseResult) -> Self {
        Self {
            purchase: result.purchase.into(),
            created: result.created,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserPurchasesResponse {
    pub user_id: String,
    pub purchases: Vec<PurchaseResponse>,
    pub access_rights: Vec<AccessRightResponse>,
}

impl UserPurchasesResponse {
    pub fn new(user_id: String, entitlements: UserEntitlements) -> Self {
        Self {
            user_id,
            purchases: entitlements.purchases.into_iter().map(Into::into).collect(),
            access_rights: entitlements
                .access_rights
                .into_iter()
                .map(Into::into)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReapplyEntitlementResponse {
    pub purchase: PurchaseResponse,
    /// Debug rendering of the entitlement change, e.g. `Granted`.
    pub change: String,
}

impl From<ReapplyEntitlementResult> for ReapplyEntitlementResponse {
    fn from(result: ReapplyEntitlementResult) -> Self {
        Self {
            purchase: result.purchase.into(),
            change: format!("{:?}", result.change),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error body for every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::PurchaseId;

    #[test]
    fn ack_for_duplicate_carries_purchase() {
        let id = PurchaseId::new().to_string();
        let ack = WebhookAckResponse::from(HandlePaymentWebhookResult::Duplicate {
            purchase_id: id.clone(),
            status: PurchaseStatus::Completed,
        });
        assert!(ack.received);
        assert_eq!(ack.outcome, "duplicate");
        assert_eq!(ack.purchase_id, Some(id));
    }

    #[test]
    fn ack_for_ignored_omits_purchase_fields() {
        let ack = WebhookAckResponse::from(HandlePaymentWebhookResult::Ignored(
            "customer.created".to_string(),
        ));
        let json = serde_json::to_value(&ack).unwrap();
        assert_eq!(json, serde_json::json!({"received": true, "outcome": "ignored"}));
    }

    #[test]
    fn register_request_defaults_currency() {
        let req: RegisterPendingPurchaseRequest = serde_json::from_value(serde_json::json!({
            "provider": "paypay",
            "external_event_id": "mp_1",
            "user_id": "u1",
            "diagnosis_id": "d1",
            "amount_minor_units": 98000
        }))
        .unwrap();
        assert_eq!(req.provider, PaymentProvider::PayPay);
        assert!(req.currency.is_none());
    }
}
