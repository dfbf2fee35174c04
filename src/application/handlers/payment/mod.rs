//! Payment handlers.
//!
//! ## Commands
//! - Processing provider webhooks (verify, normalize, settle)
//! - Reconciling stale pending purchases against provider status APIs
//! - Registering pending purchases and re-applying entitlements (admin)
//!
//! ## Queries
//! - Purchases and access rights of a user (admin)

mod admin;
mod entitlement_granter;
mod handle_payment_webhook;
mod reconciler;
mod settle_payment;

pub use admin::{
    AdminHandler, ReapplyEntitlementCommand, ReapplyEntitlementResult,
    RegisterPendingPurchaseCommand, RegisterPendingPurchaseResult, UserEntitlements,
};
pub use entitlement_granter::{EntitlementChange, EntitlementGranter};
pub use handle_payment_webhook::{
    HandlePaymentWebhookCommand, HandlePaymentWebhookHandler, HandlePaymentWebhookResult,
};
pub use reconciler::{ReconcileReport, Reconciler, ReconcilerConfig};
pub use settle_payment::{SettleOutcome, SettlePaymentHandler};
