//! HTTP handlers for webhook delivery, health and the operator API.

use std::str::FromStr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::adapters::http::middleware::RequireAdmin;
use crate::application::handlers::payment::{
    AdminHandler, HandlePaymentWebhookCommand, HandlePaymentWebhookHandler,
    ReapplyEntitlementCommand, RegisterPendingPurchaseCommand,
};
use crate::domain::foundation::{
    DiagnosisId, DomainError, ErrorCode, ErrorKind, PurchaseId, UserId,
};
use crate::domain::payment::{Currency, Money, PaymentProvider, WebhookError};

use super::dto::{
    ErrorResponse, HealthResponse, ReapplyEntitlementResponse, RegisterPendingPurchaseRequest,
    RegisterPendingPurchaseResponse, UserPurchasesResponse, WebhookAckResponse,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state for the payment routes.
#[derive(Clone)]
pub struct PaymentAppState {
    pub webhooks: Arc<HandlePaymentWebhookHandler>,
    pub admin: Arc<AdminHandler>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhooks (no auth, signature verified)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /webhooks/stripe
pub async fn handle_stripe_webhook(
    State(state): State<PaymentAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAckResponse>, PaymentApiError> {
    receive(&state, PaymentProvider::Stripe, headers, body).await
}

/// POST /webhooks/paypay (path configurable)
pub async fn handle_paypay_webhook(
    State(state): State<PaymentAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAckResponse>, PaymentApiError> {
    receive(&state, PaymentProvider::PayPay, headers, body).await
}

async fn receive(
    state: &PaymentAppState,
    provider: PaymentProvider,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAckResponse>, PaymentApiError> {
    let cmd = HandlePaymentWebhookCommand {
        provider,
        payload: body.to_vec(),
        headers,
    };
    let result = state.webhooks.handle(cmd).await?;
    Ok(Json(WebhookAckResponse::from(result)))
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ════════════════════════════════════════════════════════════════════════════════
// Admin (bearer token)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /admin/purchases/pending
pub async fn register_pending_purchase(
    State(state): State<PaymentAppState>,
    RequireAdmin(operator): RequireAdmin,
    payload: Result<Json<RegisterPendingPurchaseRequest>, JsonRejection>,
) -> Result<impl IntoResponse, PaymentApiError> {
    let Json(request) = payload?;

    let currency = match request.currency.as_deref() {
        Some(code) => Currency::new(code)?,
        None => Currency::jpy(),
    };
    let cmd = RegisterPendingPurchaseCommand {
        provider: request.provider,
        external_event_id: non_empty("external_event_id", request.external_event_id)?,
        user_id: UserId::new(request.user_id)?,
        diagnosis_id: DiagnosisId::new(request.diagnosis_id)?,
        amount: Money::new(request.amount_minor_units, currency)?,
        operator: operator.0,
    };

    let result = state.admin.register_pending(cmd).await?;
    let status = if result.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(RegisterPendingPurchaseResponse::from(result))))
}

/// GET /admin/users/:user_id/purchases
pub async fn list_user_purchases(
    State(state): State<PaymentAppState>,
    RequireAdmin(_operator): RequireAdmin,
    Path(user_id): Path<String>,
) -> Result<Json<UserPurchasesResponse>, PaymentApiError> {
    let user_id = UserId::new(user_id)?;
    let entitlements = state.admin.list_for_user(&user_id).await?;
    Ok(Json(UserPurchasesResponse::new(
        user_id.to_string(),
        entitlements,
    )))
}

/// POST /admin/purchases/:purchase_id/reapply
pub async fn reapply_entitlement(
    State(state): State<PaymentAppState>,
    RequireAdmin(operator): RequireAdmin,
    Path(purchase_id): Path<String>,
) -> Result<Json<ReapplyEntitlementResponse>, PaymentApiError> {
    let purchase_id = PurchaseId::from_str(&purchase_id)
        .map_err(|e| DomainError::validation("purchase_id", e.to_string()))?;

    let result = state
        .admin
        .reapply(ReapplyEntitlementCommand {
            purchase_id,
            operator: operator.0,
        })
        .await?;
    Ok(Json(ReapplyEntitlementResponse::from(result)))
}

fn non_empty(field: &'static str, value: String) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(field, format!("{} cannot be empty", field)));
    }
    Ok(trimmed.to_string())
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts pipeline and domain errors to HTTP responses.
#[derive(Debug)]
pub enum PaymentApiError {
    Webhook(WebhookError),
    Domain(DomainError),
    BadRequest(String),
}

impl From<WebhookError> for PaymentApiError {
    fn from(err: WebhookError) -> Self {
        Self::Webhook(err)
    }
}

impl From<DomainError> for PaymentApiError {
    fn from(err: DomainError) -> Self {
        Self::Domain(err)
    }
}

impl From<crate::domain::foundation::ValidationError> for PaymentApiError {
    fn from(err: crate::domain::foundation::ValidationError) -> Self {
        Self::Domain(err.into())
    }
}

impl From<JsonRejection> for PaymentApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl PaymentApiError {
    fn status_and_body(&self) -> (StatusCode, ErrorResponse) {
        match self {
            PaymentApiError::Webhook(err) => {
                let message = match err {
                    WebhookError::Database(_) => "Storage unavailable, retry later".to_string(),
                    other => other.to_string(),
                };
                (err.status_code(), ErrorResponse::new(err.code(), message))
            }
            PaymentApiError::Domain(err) => {
                let status = domain_status(err.code);
                let message = if status.is_server_error() {
                    "Internal error".to_string()
                } else {
                    err.message.clone()
                };
                (status, ErrorResponse::new(err.code.to_string(), message))
            }
            PaymentApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("MALFORMED_PAYLOAD", message.clone()),
            ),
        }
    }
}

fn domain_status(code: ErrorCode) -> StatusCode {
    match code.kind() {
        ErrorKind::Invalid => StatusCode::BAD_REQUEST,
        ErrorKind::Missing => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Denied => StatusCode::UNAUTHORIZED,
        ErrorKind::Infrastructure => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for PaymentApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), code = %body.code, error = ?self, "request failed");
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_errors_keep_their_status() {
        let (status, body) = PaymentApiError::from(WebhookError::InvalidSignature).status_and_body();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.code, "INVALID_SIGNATURE");

        let (status, body) =
            PaymentApiError::from(WebhookError::StateIntegrity("failed -> completed".into()))
                .status_and_body();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.code, "STATE_INTEGRITY");
    }

    #[test]
    fn database_detail_is_not_leaked() {
        let (status, body) =
            PaymentApiError::from(WebhookError::Database("connection refused at 10.0.0.3".into()))
                .status_and_body();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.message.contains("10.0.0.3"));

        let (_, body) =
            PaymentApiError::from(DomainError::database("pool timed out")).status_and_body();
        assert_eq!(body.message, "Internal error");
    }

    #[test]
    fn domain_codes_map_to_http() {
        let cases = [
            (ErrorCode::ValidationFailed, StatusCode::BAD_REQUEST),
            (ErrorCode::PurchaseNotFound, StatusCode::NOT_FOUND),
            (ErrorCode::DiagnosisNotFound, StatusCode::NOT_FOUND),
            (ErrorCode::InvalidStateTransition, StatusCode::CONFLICT),
            (ErrorCode::DatabaseError, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (code, expected) in cases {
            let (status, body) =
                PaymentApiError::from(DomainError::new(code, "x")).status_and_body();
            assert_eq!(status, expected, "{}", code);
            assert_eq!(body.code, code.to_string());
        }
    }

    #[test]
    fn empty_external_id_rejected() {
        let err = non_empty("external_event_id", "  ".to_string()).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
    }
}
