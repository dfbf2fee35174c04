//! Stripe adapter.
//!
//! Outbound checkout session queries for the reconciler. Calls authenticate
//! with the secret API key held in a `secrecy::SecretString`.

mod status_gateway;

pub use status_gateway::{CheckoutSessionStatus, StripeStatusGateway, DEFAULT_STRIPE_API_BASE};
