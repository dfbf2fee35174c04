//! In-memory port implementations.
//!
//! Used by tests and by `storage = memory` development runs. State lives in
//! the process and is lost on restart.

mod access_right_store;
mod diagnosis_reader;
mod purchase_ledger;

pub use access_right_store::InMemoryAccessRightStore;
pub use diagnosis_reader::InMemoryDiagnosisReader;
pub use purchase_ledger::InMemoryPurchaseLedger;
