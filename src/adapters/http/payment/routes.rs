//! Axum router configuration for the payment endpoints.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::adapters::http::middleware::{admin_auth_middleware, AdminTokenState};

use super::handlers::{
    handle_paypay_webhook, handle_stripe_webhook, health, list_user_purchases,
    reapply_entitlement, register_pending_purchase, PaymentAppState,
};

pub const STRIPE_WEBHOOK_PATH: &str = "/webhooks/stripe";

/// Provider webhook routes. Authenticated by signature, not by token.
///
/// The PayPay path is part of the signed string, so it comes from config.
pub fn webhook_routes(paypay_path: &str) -> Router<PaymentAppState> {
    Router::new()
        .route(STRIPE_WEBHOOK_PATH, post(handle_stripe_webhook))
        .route(paypay_path, post(handle_paypay_webhook))
}

/// Operator routes behind the bearer-token guard.
///
/// - `POST /purchases/pending` - Register a checkout's pending purchase
/// - `GET /users/:user_id/purchases` - Ledger rows and access rights for a user
/// - `POST /purchases/:purchase_id/reapply` - Re-run the entitlement step
pub fn admin_routes(token: AdminTokenState) -> Router<PaymentAppState> {
    Router::new()
        .route("/purchases/pending", post(register_pending_purchase))
        .route("/users/:user_id/purchases", get(list_user_purchases))
        .route("/purchases/:purchase_id/reapply", post(reapply_entitlement))
        .layer(middleware::from_fn_with_state(token, admin_auth_middleware))
}

/// Complete payment router. Admin routes are mounted under `/admin` only when
/// a token is configured.
pub fn payment_router(
    paypay_path: &str,
    admin_token: Option<AdminTokenState>,
) -> Router<PaymentAppState> {
    let router = Router::new()
        .route("/health", get(health))
        .merge(webhook_routes(paypay_path));

    match admin_token {
        Some(token) => router.nest("/admin", admin_routes(token)),
        None => router,
    }
}
