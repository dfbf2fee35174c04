//! Entitlement Ledger - Payment confirmation and entitlement reconciliation.
//!
//! Receives payment confirmations from Stripe and PayPay (signed webhooks and
//! reconciler polls), records each payment once in an idempotent ledger, and
//! grants or revokes report access accordingly.

pub mod adapters;
pub mod application;
pub mod bootstrap;
pub mod config;
pub mod domain;
pub mod ports;
