//! Startup wiring shared by the binary and the integration tests.
//!
//! Turns an [`AppConfig`] plus a storage backend into the handler graph and
//! the axum router.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::Request;
use axum::Router;
use secrecy::SecretString;
use thiserror::Error;
use tower_http::timeout::TimeoutLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::adapters::http::{payment_router, PaymentAppState};
use crate::adapters::{
    InMemoryAccessRightStore, InMemoryDiagnosisReader, InMemoryPurchaseLedger, LineNotifier,
    NoopNotifier, PayPayStatusGateway, PostgresAccessRightStore, PostgresDiagnosisReader,
    PostgresPurchaseLedger, StripeStatusGateway,
};
use crate::application::handlers::payment::{
    AdminHandler, EntitlementGranter, HandlePaymentWebhookHandler, Reconciler,
    SettlePaymentHandler,
};
use crate::config::{AppConfig, NotificationConfig, ValidationError};
use crate::domain::payment::{PayPayVerifier, StripeSignatureVerifier, WebhookVerifier};
use crate::ports::{
    AccessRightStore, DiagnosisReader, IntegrityAlertSink, PaymentNotifier, PurchaseLedger,
};

/// Errors that abort startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    #[error("HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Server: {0}")]
    Io(#[from] std::io::Error),
}

/// The three storage ports, backed by one store.
#[derive(Clone)]
pub struct Storage {
    pub ledger: Arc<dyn PurchaseLedger>,
    pub rights: Arc<dyn AccessRightStore>,
    pub diagnoses: Arc<dyn DiagnosisReader>,
}

impl Storage {
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        Self {
            ledger: Arc::new(PostgresPurchaseLedger::new(pool.clone())),
            rights: Arc::new(PostgresAccessRightStore::new(pool.clone())),
            diagnoses: Arc::new(PostgresDiagnosisReader::new(pool)),
        }
    }

    /// Process-local storage. Every diagnosis id is treated as existing.
    pub fn memory() -> Self {
        Self {
            ledger: Arc::new(InMemoryPurchaseLedger::new()),
            rights: Arc::new(InMemoryAccessRightStore::new()),
            diagnoses: Arc::new(InMemoryDiagnosisReader::permissive()),
        }
    }
}

/// Handler graph for one process.
pub struct Services {
    pub settle: Arc<SettlePaymentHandler>,
    pub webhooks: Arc<HandlePaymentWebhookHandler>,
    pub admin: Arc<AdminHandler>,
    pub reconciler: Arc<Reconciler>,
}

/// Builds the inbound verifier with one variant per configured provider.
pub fn build_verifier(config: &AppConfig) -> Result<WebhookVerifier, ValidationError> {
    let mut verifier = WebhookVerifier::new();
    if let Some(stripe) = &config.stripe {
        verifier = verifier.with_stripe(StripeSignatureVerifier::new(
            stripe.signing_key()?,
            stripe.tolerance_secs,
        ));
    }
    if let Some(paypay) = &config.paypay {
        verifier = verifier.with_paypay(PayPayVerifier::new(
            paypay.signer()?,
            paypay.merchant_id.clone(),
            paypay.webhook_path.clone(),
            paypay.tolerance_secs,
        ));
    }
    Ok(verifier)
}

pub fn build_notifier(config: &NotificationConfig) -> Arc<dyn PaymentNotifier> {
    match &config.line_channel_access_token {
        Some(token) => Arc::new(
            LineNotifier::new(token.clone()).with_push_url(config.line_push_url.clone()),
        ),
        None => Arc::new(NoopNotifier),
    }
}

pub fn build_services(
    config: &AppConfig,
    storage: Storage,
    notifier: Arc<dyn PaymentNotifier>,
    alerts: Arc<dyn IntegrityAlertSink>,
) -> Result<Services, StartupError> {
    let granter = Arc::new(EntitlementGranter::new(
        storage.diagnoses.clone(),
        storage.rights.clone(),
        storage.ledger.clone(),
        notifier,
    ));
    let settle = Arc::new(SettlePaymentHandler::new(
        storage.ledger.clone(),
        granter,
        alerts,
    ));
    let webhooks = Arc::new(HandlePaymentWebhookHandler::new(
        Arc::new(build_verifier(config)?),
        settle.clone(),
    ));
    let admin = Arc::new(AdminHandler::new(
        storage.ledger.clone(),
        storage.rights,
        storage.diagnoses,
        settle.clone(),
    ));

    // reqwest's own deadline sits just past the reconciler's, which owns the timeout.
    let client = reqwest::Client::builder()
        .timeout(config.reconciler.call_timeout() + Duration::from_millis(250))
        .build()?;

    let mut reconciler = Reconciler::new(
        storage.ledger,
        settle.clone(),
        config.reconciler.to_reconciler_config(),
    );
    if let Some(stripe) = &config.stripe {
        reconciler = reconciler.with_gateway(Arc::new(
            StripeStatusGateway::new(stripe.api_key.clone(), stripe.api_base_url.clone())
                .with_client(client.clone()),
        ));
    }
    if let Some(paypay) = &config.paypay {
        reconciler = reconciler.with_gateway(Arc::new(
            PayPayStatusGateway::new(
                paypay.signer()?,
                paypay.merchant_id.clone(),
                paypay.api_base_url.clone(),
            )
            .with_client(client),
        ));
    }

    Ok(Services {
        settle,
        webhooks,
        admin,
        reconciler: Arc::new(reconciler),
    })
}

/// Routes plus the HTTP layers. `/health` and the webhooks are always mounted.
pub fn build_router(config: &AppConfig, services: &Services) -> Router {
    let paypay_path = config
        .paypay
        .as_ref()
        .map(|p| p.webhook_path.as_str())
        .unwrap_or("/webhooks/paypay");
    let admin_token: Option<Arc<SecretString>> = config.admin.token.clone().map(Arc::new);

    let state = PaymentAppState {
        webhooks: services.webhooks.clone(),
        admin: services.admin.clone(),
    };

    payment_router(paypay_path, admin_token)
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.server.max_body_bytes))
        .layer(TimeoutLayer::new(config.server.request_timeout()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Span carrying the `x-request-id` assigned by `SetRequestIdLayer`, so audit
/// and settlement logs can be joined with the access log.
fn request_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    tracing::info_span!(
        "http",
        method = %request.method(),
        path = %request.uri().path(),
        request_id,
    )
}
