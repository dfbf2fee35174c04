//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Storage Ports
//!
//! - `PurchaseLedger` - Idempotent purchase rows keyed by provider event identity
//! - `AccessRightStore` - Conflict-target upserts on access rights
//! - `DiagnosisReader` - Existence check for purchasable reports
//!
//! ## Provider Ports
//!
//! - `PaymentStatusGateway` - Outbound status queries for the reconciler
//!
//! ## Side Channels
//!
//! - `PaymentNotifier` - Fire-and-forget purchase notifications
//! - `IntegrityAlertSink` - Operator alerts for state contradictions

mod access_right_store;
mod diagnosis_reader;
mod integrity_alert_sink;
mod payment_notifier;
mod payment_status_gateway;
mod purchase_ledger;

pub use access_right_store::{AccessRightStore, UpsertOutcome};
pub use diagnosis_reader::DiagnosisReader;
pub use integrity_alert_sink::{IntegrityAlert, IntegrityAlertSink};
pub use payment_notifier::PaymentNotifier;
pub use payment_status_gateway::{GatewayError, PaymentStatusGateway};
pub use purchase_ledger::{integrity_violation, unattributed, PurchaseLedger, RecordOutcome};
