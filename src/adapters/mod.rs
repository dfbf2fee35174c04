//! Adapters - Implementations of port interfaces.
//!
//! - `postgres` / `memory` - Ledger, access-right and diagnosis storage
//! - `stripe` / `paypay` - Outbound status gateways for the reconciler
//! - `notify` - Purchase-completed notifications
//! - `alert` - Integrity alert sinks
//! - `http` - axum routes for webhooks and the operator API

pub mod alert;
pub mod http;
pub mod memory;
pub mod notify;
pub mod paypay;
pub mod postgres;
pub(crate) mod provider_http;
pub mod stripe;

pub use alert::{InMemoryAlertSink, LoggingAlertSink};
pub use memory::{InMemoryAccessRightStore, InMemoryDiagnosisReader, InMemoryPurchaseLedger};
pub use notify::{LineNotifier, NoopNotifier};
pub use paypay::PayPayStatusGateway;
pub use postgres::{PostgresAccessRightStore, PostgresDiagnosisReader, PostgresPurchaseLedger};
pub use stripe::StripeStatusGateway;
