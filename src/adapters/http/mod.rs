//! HTTP adapters - REST API implementations.

pub mod middleware;
pub mod payment;

pub use payment::{payment_router, PaymentAppState};
