//! PostgreSQL adapters - Database implementations for storage ports.
//!
//! - `PostgresPurchaseLedger` - Insert-or-advance on the purchases table
//! - `PostgresAccessRightStore` - Conflict-target upserts on access_rights
//! - `PostgresDiagnosisReader` - Existence checks against diagnoses

mod access_right_store;
mod diagnosis_reader;
mod purchase_ledger;

pub use access_right_store::PostgresAccessRightStore;
pub use diagnosis_reader::PostgresDiagnosisReader;
pub use purchase_ledger::PostgresPurchaseLedger;
