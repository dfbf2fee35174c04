//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, timestamps, the state machine contract, and the
//! error types that the payment and entitlement modules build on.

mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ErrorKind, ValidationError};
pub use ids::{DiagnosisId, PurchaseId, UserId};
pub use state_machine::{IllegalTransition, StateMachine};
pub use timestamp::Timestamp;
