//! Bearer-token guard for the operator API.
//!
//! ```text
//! Request → admin_auth_middleware → injects AdminOperator into extensions
//!                                          ↓
//!                                  Handler → RequireAdmin extractor reads it
//! ```
//!
//! The token is compared in constant time. The acting operator's label comes
//! from `X-Operator` and ends up in audit log lines.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

use crate::adapters::http::payment::dto::ErrorResponse;

pub const OPERATOR_HEADER: &str = "X-Operator";
const DEFAULT_OPERATOR: &str = "admin";
const MAX_OPERATOR_LEN: usize = 64;

/// Middleware state - the configured admin token.
pub type AdminTokenState = Arc<SecretString>;

/// Who performed an admin action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminOperator(pub String);

/// Rejects requests without the configured bearer token.
pub async fn admin_auth_middleware(
    State(token): State<AdminTokenState>,
    mut request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    let authorized = presented
        .map(|p| bool::from(p.as_bytes().ct_eq(token.expose_secret().as_bytes())))
        .unwrap_or(false);

    if !authorized {
        tracing::warn!(
            target: "audit",
            path = %request.uri().path(),
            token_present = presented.is_some(),
            "admin request rejected"
        );
        return AdminRejection.into_response();
    }

    let operator = request
        .headers()
        .get(OPERATOR_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.chars().take(MAX_OPERATOR_LEN).collect::<String>())
        .unwrap_or_else(|| DEFAULT_OPERATOR.to_string());

    request.extensions_mut().insert(AdminOperator(operator));
    next.run(request).await
}

pub struct AdminRejection;

impl IntoResponse for AdminRejection {
    fn into_response(self) -> Response {
        let body = ErrorResponse::new("UNAUTHORIZED", "Admin token required");
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

/// Extractor for handlers mounted behind [`admin_auth_middleware`].
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub AdminOperator);

impl<S> axum::extract::FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AdminRejection;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut axum::http::request::Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            parts
                .extensions
                .get::<AdminOperator>()
                .cloned()
                .map(RequireAdmin)
                .ok_or(AdminRejection)
        })
    }
}
