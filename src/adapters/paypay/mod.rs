//! PayPay adapter.
//!
//! Outbound payment detail queries for the reconciler. Inbound webhook
//! verification lives in the domain (`PayPayVerifier`) since it is pure.

mod status_gateway;

pub use status_gateway::{PayPayStatusGateway, DEFAULT_PAYPAY_API_BASE};
