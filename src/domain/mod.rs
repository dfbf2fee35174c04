//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors, state machine)
//! - `payment` - Provider verification, normalization and the purchase lifecycle
//! - `entitlement` - Access rights derived from completed purchases

pub mod entitlement;
pub mod foundation;
pub mod payment;
