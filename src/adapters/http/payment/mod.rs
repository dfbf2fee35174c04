//! HTTP adapter for payment confirmation.
//!
//! - `POST /webhooks/stripe` - Stripe deliveries (`Stripe-Signature`)
//! - `POST /webhooks/paypay` - PayPay deliveries (`OPA-Auth`), path configurable
//! - `GET /health` - Liveness
//! - `/admin/...` - Operator API, see [`routes::admin_routes`]

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::{PaymentApiError, PaymentAppState};
pub use routes::{admin_routes, payment_router, webhook_routes, STRIPE_WEBHOOK_PATH};
