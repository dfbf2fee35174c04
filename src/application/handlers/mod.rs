//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations.

pub mod payment;

pub use payment::{
    AdminHandler, EntitlementChange, EntitlementGranter, HandlePaymentWebhookCommand,
    HandlePaymentWebhookHandler, HandlePaymentWebhookResult, ReapplyEntitlementCommand,
    ReapplyEntitlementResult, ReconcileReport, Reconciler, ReconcilerConfig,
    RegisterPendingPurchaseCommand, RegisterPendingPurchaseResult, SettleOutcome,
    SettlePaymentHandler, UserEntitlements,
};
