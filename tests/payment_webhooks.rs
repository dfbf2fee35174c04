//! End-to-end webhook flows through the axum router over in-memory storage.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;

use common::*;
use entitlement_ledger::domain::entitlement::{AccessLevel, AccessRightKey};
use entitlement_ledger::domain::foundation::{DiagnosisId, Timestamp, UserId};
use entitlement_ledger::domain::payment::{PaymentProvider, PurchaseKey, PurchaseStatus};
use entitlement_ledger::ports::{AccessRightStore, PurchaseLedger};

fn right_key(user: &str, diagnosis: &str) -> AccessRightKey {
    AccessRightKey::diagnosis(UserId::new(user).unwrap(), DiagnosisId::new(diagnosis).unwrap())
}

fn stripe_key(session: &str) -> PurchaseKey {
    PurchaseKey::new(PaymentProvider::Stripe, session)
}

// ════════════════════════════════════════════════════════════════════════════════
// Stripe
// ════════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn completed_checkout_records_purchase_and_grants_full_access() {
    let app = TestApp::new();

    let (status, body) = app.send(stripe_request(&checkout_completed("cs_1", "d1", "u1"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "recorded");
    assert_eq!(body["status"], "completed");

    let purchase = app.ledger.find_by_key(&stripe_key("cs_1")).await.unwrap().unwrap();
    assert_eq!(purchase.status, PurchaseStatus::Completed);
    assert_eq!(purchase.amount.amount_minor_units(), 98_000);
    assert_eq!(purchase.amount.currency().as_str(), "JPY");
    assert!(purchase.completed_at.is_some());

    let right = app.rights.find(&right_key("u1", "d1")).await.unwrap().unwrap();
    assert_eq!(right.access_level, AccessLevel::Full);
    assert_eq!(right.purchase_id, Some(purchase.id));
}

#[tokio::test]
async fn redelivered_checkout_changes_nothing() {
    let app = TestApp::new();
    let event = checkout_completed("cs_1", "d1", "u1");
    app.send(stripe_request(&event)).await;
    let right_before = app.rights.find(&right_key("u1", "d1")).await.unwrap();

    for _ in 0..3 {
        let (status, body) = app.send(stripe_request(&event)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "duplicate");
    }

    assert_eq!(app.ledger.len().await, 1);
    assert_eq!(app.rights.len().await, 1);
    assert_eq!(app.rights.find(&right_key("u1", "d1")).await.unwrap(), right_before);
}

#[tokio::test]
async fn redelivering_either_of_two_purchases_leaves_the_right_alone() {
    let app = TestApp::new();
    let first = checkout_completed("cs_a", "d1", "u1");
    let second = checkout_completed("cs_b", "d1", "u1");
    app.send(stripe_request(&first)).await;
    app.send(stripe_request(&second)).await;
    let notified = app.notifier.sent().await;
    let right_before = app.rights.find(&right_key("u1", "d1")).await.unwrap().unwrap();

    for _ in 0..3 {
        for event in [&first, &second] {
            let (status, body) = app.send(stripe_request(event)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["outcome"], "duplicate");
        }
    }

    let right_after = app.rights.find(&right_key("u1", "d1")).await.unwrap().unwrap();
    assert_eq!(right_after.purchase_id, right_before.purchase_id);
    assert_eq!(right_after.valid_from, right_before.valid_from);
    assert_eq!(app.notifier.sent().await, notified);
}

#[tokio::test]
async fn forged_signature_is_rejected_without_writes() {
    let app = TestApp::new();
    let payload = serde_json::to_vec(&checkout_completed("cs_1", "d1", "u1")).unwrap();
    let forged = format!("t={},v1={}", Timestamp::now().as_unix_secs(), "ab".repeat(32));

    let (status, body) = app.send(stripe_request_with_signature(payload, &forged)).await;

    assert!(status.is_client_error());
    assert_eq!(body["code"], "INVALID_SIGNATURE");
    assert!(app.ledger.is_empty().await);
    assert!(app.rights.is_empty().await);
}

#[tokio::test]
async fn signature_header_with_extreme_timestamp_is_rejected() {
    let app = TestApp::new();

    for timestamp in [i64::MIN, i64::MAX] {
        let payload = serde_json::to_vec(&checkout_completed("cs_1", "d1", "u1")).unwrap();
        let forged = format!("t={},v1={}", timestamp, "ab".repeat(32));

        let (status, _) = app.send(stripe_request_with_signature(payload, &forged)).await;

        assert!(status.is_client_error());
    }
    assert!(app.ledger.is_empty().await);
}

#[tokio::test]
async fn missing_signature_header_is_rejected() {
    let app = TestApp::new();
    let request = Request::builder()
        .method("POST")
        .uri("/webhooks/stripe")
        .body(Body::from(
            serde_json::to_vec(&checkout_completed("cs_1", "d1", "u1")).unwrap(),
        ))
        .unwrap();

    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "MISSING_HEADER");
    assert!(app.ledger.is_empty().await);
}

#[tokio::test]
async fn replayed_delivery_outside_tolerance_is_rejected() {
    let app = TestApp::new();
    let stale = Timestamp::now().as_unix_secs() - 301;

    let (status, body) = app
        .send(stripe_request_at(&checkout_completed("cs_1", "d1", "u1"), stale))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "TIMESTAMP_OUT_OF_RANGE");
    assert!(app.ledger.is_empty().await);
}

#[tokio::test]
async fn refund_downgrades_to_preview_and_keeps_the_row() {
    let app = TestApp::new();
    app.send(stripe_request(&checkout_completed("cs_1", "d1", "u1"))).await;

    let (status, body) = app.send(stripe_request(&charge_refunded("cs_1"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "refunded");
    let purchase = app.ledger.find_by_key(&stripe_key("cs_1")).await.unwrap().unwrap();
    assert_eq!(purchase.status, PurchaseStatus::Refunded);

    let right = app.rights.find(&right_key("u1", "d1")).await.unwrap().unwrap();
    assert_eq!(right.access_level, AccessLevel::Preview);
    assert_eq!(app.rights.len().await, 1);
}

#[tokio::test]
async fn completion_arriving_after_refund_is_stale() {
    let app = TestApp::new();
    app.send(stripe_request(&checkout_completed("cs_1", "d1", "u1"))).await;
    app.send(stripe_request(&charge_refunded("cs_1"))).await;

    let (status, body) = app.send(stripe_request(&checkout_completed("cs_1", "d1", "u1"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "duplicate");
    let right = app.rights.find(&right_key("u1", "d1")).await.unwrap().unwrap();
    assert_eq!(right.access_level, AccessLevel::Preview);
}

#[tokio::test]
async fn unknown_diagnosis_is_a_state_integrity_failure() {
    let app = TestApp::new();

    let (status, body) = app.send(stripe_request(&checkout_completed("cs_9", "d404", "u1"))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "STATE_INTEGRITY");
    assert!(app.rights.is_empty().await);
    assert_eq!(app.alerts.alerts().await.len(), 1);
}

#[tokio::test]
async fn checkout_without_metadata_is_bad_request() {
    let app = TestApp::new();
    let mut event = checkout_completed("cs_1", "d1", "u1");
    event["data"]["object"]["metadata"] = json!({});

    let (status, body) = app.send(stripe_request(&event)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_METADATA");
    assert!(app.ledger.is_empty().await);
}

#[tokio::test]
async fn unrelated_event_type_is_acknowledged() {
    let app = TestApp::new();
    let event = json!({"id": "evt_x", "type": "customer.created", "data": {"object": {"id": "cus_1"}}});

    let (status, body) = app.send(stripe_request(&event)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "ignored");
    assert!(app.ledger.is_empty().await);
}

#[tokio::test]
async fn concurrent_purchases_of_one_report_converge_on_one_full_right() {
    let app = TestApp::new();
    let first = app.send(stripe_request(&checkout_completed("cs_a", "d1", "u1")));
    let second = app.send(stripe_request(&checkout_completed("cs_b", "d1", "u1")));

    let ((s1, _), (s2, _)) = tokio::join!(first, second);

    assert_eq!(s1, StatusCode::OK);
    assert_eq!(s2, StatusCode::OK);
    assert_eq!(app.ledger.len().await, 2);
    assert_eq!(app.rights.len().await, 1);
    let right = app.rights.find(&right_key("u1", "d1")).await.unwrap().unwrap();
    assert_eq!(right.access_level, AccessLevel::Full);
}

// ════════════════════════════════════════════════════════════════════════════════
// PayPay
// ════════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn paypay_completion_grants_access() {
    let app = TestApp::new();

    let (status, body) = app
        .send(paypay_request(&paypay_transaction("mp_1", "COMPLETED"), PAYPAY_MERCHANT))
        .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["outcome"], "recorded");
    let key = PurchaseKey::new(PaymentProvider::PayPay, "mp_1");
    let purchase = app.ledger.find_by_key(&key).await.unwrap().unwrap();
    assert_eq!(purchase.status, PurchaseStatus::Completed);
    assert_eq!(purchase.amount.amount_minor_units(), 98_000);
    assert!(app.rights.find(&right_key("u2", "d2")).await.unwrap().unwrap().is_full());
}

#[tokio::test]
async fn paypay_wrong_merchant_is_rejected() {
    let app = TestApp::new();

    let (status, body) = app
        .send(paypay_request(&paypay_transaction("mp_1", "COMPLETED"), "someone_else"))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNKNOWN_CREDENTIAL");
    assert!(app.ledger.is_empty().await);
}

#[tokio::test]
async fn paypay_tampered_body_is_rejected() {
    let app = TestApp::new();
    let signed = paypay_request(&paypay_transaction("mp_1", "COMPLETED"), PAYPAY_MERCHANT);
    let (parts, _) = signed.into_parts();
    let tampered = serde_json::to_vec(&paypay_transaction("mp_1", "REFUNDED")).unwrap();

    let (status, _) = app.send(Request::from_parts(parts, Body::from(tampered))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(app.ledger.is_empty().await);
}

#[tokio::test]
async fn paypay_failure_after_completion_raises_alert() {
    let app = TestApp::new();
    app.send(paypay_request(&paypay_transaction("mp_1", "COMPLETED"), PAYPAY_MERCHANT))
        .await;

    let (status, body) = app
        .send(paypay_request(&paypay_transaction("mp_1", "FAILED"), PAYPAY_MERCHANT))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "STATE_INTEGRITY");
    assert_eq!(app.alerts.alerts().await.len(), 1);
    assert!(app.rights.find(&right_key("u2", "d2")).await.unwrap().unwrap().is_full());
}

// ════════════════════════════════════════════════════════════════════════════════
// Health
// ════════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn health_reports_ok() {
    let app = TestApp::new();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn responses_carry_request_id() {
    use tower::ServiceExt;

    let app = TestApp::new();
    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "req-42")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-42");

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn oversized_webhook_body_is_refused_before_verification() {
    use tower::ServiceExt;

    let mut config = test_config(false);
    config.server.max_body_bytes = 1024;
    let app = TestApp::with_config(config);
    let body = json!({"padding": "x".repeat(4096)});

    let response = app
        .router
        .clone()
        .oneshot(stripe_request(&body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(app.ledger.is_empty().await);
}
