//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Webhooks, the reconciler and admin commands all funnel into
//! `SettlePaymentHandler`, so every path applies the same ledger semantics.

pub mod handlers;

pub use handlers::{
    AdminHandler, EntitlementChange, EntitlementGranter, HandlePaymentWebhookCommand,
    HandlePaymentWebhookHandler, HandlePaymentWebhookResult, ReapplyEntitlementCommand,
    ReapplyEntitlementResult, ReconcileReport, Reconciler, ReconcilerConfig,
    RegisterPendingPurchaseCommand, RegisterPendingPurchaseResult, SettleOutcome,
    SettlePaymentHandler, UserEntitlements,
};
