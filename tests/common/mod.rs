//! Shared fixtures for the integration tests: an in-memory app, signed
//! deliveries for both providers, and JSON helpers.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use secrecy::SecretString;
use serde_json::{json, Value};
use tower::ServiceExt;

use entitlement_ledger::adapters::{
    InMemoryAccessRightStore, InMemoryAlertSink, InMemoryDiagnosisReader, InMemoryPurchaseLedger,
};
use entitlement_ledger::bootstrap::{build_router, build_services, Services, Storage};
use entitlement_ledger::config::{
    AdminConfig, AppConfig, NotificationConfig, PayPayConfig, ReconcilerSettings, ServerConfig,
    StorageMode, StripeConfig,
};
use entitlement_ledger::domain::foundation::{DomainError, Timestamp};
use entitlement_ledger::domain::payment::{
    OpaAuthSigner, PayPayVerifier, Purchase, SecretEncoding, SigningKey,
    StripeSignatureVerifier,
};
use entitlement_ledger::ports::PaymentNotifier;

pub const STRIPE_SECRET: &str = "whsec_integration_secret";
pub const PAYPAY_KEY_ID: &str = "key_integration";
/// base64 of "paypay-integration-secret"
pub const PAYPAY_SECRET_B64: &str = "cGF5cGF5LWludGVncmF0aW9uLXNlY3JldA==";
pub const PAYPAY_MERCHANT: &str = "merchant_1";
pub const PAYPAY_PATH: &str = "/webhooks/paypay";
pub const ADMIN_TOKEN: &str = "admin-token-0123456789abcdef";

// ════════════════════════════════════════════════════════════════════════════════
// Configuration
// ════════════════════════════════════════════════════════════════════════════════

pub fn test_config(admin: bool) -> AppConfig {
    AppConfig {
        server: ServerConfig::default(),
        storage: StorageMode::Memory,
        database: None,
        stripe: Some(StripeConfig {
            api_key: SecretString::new("sk_test_integration".to_string()),
            webhook_secret: SecretString::new(STRIPE_SECRET.to_string()),
            secret_encoding: SecretEncoding::Raw,
            tolerance_secs: 300,
            api_base_url: "http://127.0.0.1:9".to_string(),
        }),
        paypay: Some(PayPayConfig {
            api_key_id: PAYPAY_KEY_ID.to_string(),
            api_secret: SecretString::new(PAYPAY_SECRET_B64.to_string()),
            secret_encoding: SecretEncoding::Base64,
            merchant_id: PAYPAY_MERCHANT.to_string(),
            webhook_path: PAYPAY_PATH.to_string(),
            tolerance_secs: 300,
            api_base_url: "http://127.0.0.1:9".to_string(),
        }),
        reconciler: ReconcilerSettings::default(),
        notification: NotificationConfig::default(),
        admin: AdminConfig {
            token: admin.then(|| SecretString::new(ADMIN_TOKEN.to_string())),
        },
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// App
// ════════════════════════════════════════════════════════════════════════════════

/// Counts completion notifications sent to buyers.
#[derive(Clone, Default)]
pub struct CountingNotifier {
    calls: Arc<AtomicUsize>,
}

impl CountingNotifier {
    /// Count after letting spawned notification tasks run.
    pub async fn sent(&self) -> usize {
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentNotifier for CountingNotifier {
    async fn purchase_completed(&self, _purchase: &Purchase) -> Result<(), DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub services: Services,
    pub ledger: InMemoryPurchaseLedger,
    pub rights: InMemoryAccessRightStore,
    pub alerts: InMemoryAlertSink,
    pub notifier: CountingNotifier,
}

impl TestApp {
    /// App over in-memory storage where diagnoses `d1` and `d2` exist.
    pub fn new() -> Self {
        Self::with_config(test_config(true))
    }

    pub fn with_config(config: AppConfig) -> Self {
        let ledger = InMemoryPurchaseLedger::new();
        let rights = InMemoryAccessRightStore::new();
        let alerts = InMemoryAlertSink::new();
        let notifier = CountingNotifier::default();
        let storage = Storage {
            ledger: Arc::new(ledger.clone()),
            rights: Arc::new(rights.clone()),
            diagnoses: Arc::new(InMemoryDiagnosisReader::with_diagnoses(["d1", "d2"])),
        };
        let services = build_services(
            &config,
            storage,
            Arc::new(notifier.clone()),
            Arc::new(alerts.clone()),
        )
        .expect("test services");
        let router = build_router(&config, &services);
        Self {
            router,
            services,
            ledger,
            rights,
            alerts,
            notifier,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        read_json(response).await
    }
}

pub async fn read_json(response: Response<Body>) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

// ════════════════════════════════════════════════════════════════════════════════
// Stripe deliveries
// ════════════════════════════════════════════════════════════════════════════════

pub fn stripe_signer() -> StripeSignatureVerifier {
    StripeSignatureVerifier::new(
        SigningKey::from_secret(STRIPE_SECRET, SecretEncoding::Raw).unwrap(),
        300,
    )
}

pub fn checkout_completed(session_id: &str, diagnosis_id: &str, user_id: &str) -> Value {
    json!({
        "id": format!("evt_{}", session_id),
        "type": "checkout.session.completed",
        "created": 1_700_000_000,
        "data": {"object": {
            "id": session_id,
            "object": "checkout.session",
            "status": "complete",
            "payment_status": "paid",
            "amount_total": 98000,
            "currency": "jpy",
            "payment_intent": "pi_1",
            "metadata": {"diagnosis_id": diagnosis_id, "user_id": user_id}
        }}
    })
}

pub fn charge_refunded(session_id: &str) -> Value {
    json!({
        "id": format!("evt_refund_{}", session_id),
        "type": "charge.refunded",
        "created": 1_700_000_100,
        "data": {"object": {
            "id": "ch_1",
            "object": "charge",
            "amount": 98000,
            "amount_refunded": 98000,
            "currency": "jpy",
            "refunded": true,
            "metadata": {"checkout_session_id": session_id}
        }}
    })
}

/// Signed with the shared secret at `timestamp`.
pub fn stripe_request_at(body: &Value, timestamp: i64) -> Request<Body> {
    let payload = serde_json::to_vec(body).unwrap();
    let signature = stripe_signer().sign(timestamp, &payload);
    stripe_request_with_signature(payload, &signature)
}

pub fn stripe_request(body: &Value) -> Request<Body> {
    stripe_request_at(body, Timestamp::now().as_unix_secs())
}

pub fn stripe_request_with_signature(payload: Vec<u8>, signature: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhooks/stripe")
        .header("content-type", "application/json")
        .header("Stripe-Signature", signature)
        .body(Body::from(payload))
        .unwrap()
}

// ════════════════════════════════════════════════════════════════════════════════
// PayPay deliveries
// ════════════════════════════════════════════════════════════════════════════════

pub fn paypay_signer() -> PayPayVerifier {
    let key = SigningKey::from_secret(PAYPAY_SECRET_B64, SecretEncoding::Base64).unwrap();
    PayPayVerifier::new(
        OpaAuthSigner::new(PAYPAY_KEY_ID, key),
        PAYPAY_MERCHANT,
        PAYPAY_PATH,
        300,
    )
}

pub fn paypay_transaction(merchant_order_id: &str, state: &str) -> Value {
    json!({
        "notification_type": "Transaction",
        "merchant_order_id": merchant_order_id,
        "state": state,
        "order_amount": "98000",
        "order_id": "order_1",
        "paid_at": "2026-10-19T10:00:00Z",
        "metadata": {"diagnosis_id": "d2", "user_id": "u2"}
    })
}

pub fn paypay_request(body: &Value, merchant: &str) -> Request<Body> {
    let payload = serde_json::to_vec(body).unwrap();
    let authorization = paypay_signer().sign(&payload, Timestamp::now().as_unix_secs(), "n0nce");
    Request::builder()
        .method("POST")
        .uri(PAYPAY_PATH)
        .header("content-type", "application/json")
        .header("Authorization", authorization)
        .header("X-ASSUME-MERCHANT", merchant)
        .body(Body::from(payload))
        .unwrap()
}

// ════════════════════════════════════════════════════════════════════════════════
// Admin
// ════════════════════════════════════════════════════════════════════════════════

pub fn admin_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {}", ADMIN_TOKEN))
        .header("X-Operator", "ops-oncall");
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}
