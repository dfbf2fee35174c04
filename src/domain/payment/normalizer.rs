//! Maps verified provider payloads onto [`CanonicalEvent`].
//!
//! Pure functions: no I/O, no clock other than the one passed in.

use serde::Deserialize;

use crate::domain::foundation::{DiagnosisId, Timestamp, UserId};

use super::event::{Attribution, CanonicalEvent, Normalized, StatusReport, VerifiedEvent};
use super::money::{Currency, Money};
use super::provider::PaymentProvider;
use super::purchase::Purchase;
use super::status::CanonicalStatus;
use super::stripe_event::{
    ChargeObject, CheckoutSessionObject, StripeEvent, StripeEventType, StripeMetadata,
};
use super::webhook_errors::WebhookError;

/// Normalizes a verified delivery for any provider.
pub fn normalize(event: &VerifiedEvent) -> Result<Normalized, WebhookError> {
    match event.provider {
        PaymentProvider::Stripe => normalize_stripe(&event.payload, event.received_at),
        PaymentProvider::PayPay => normalize_paypay(&event.payload, event.received_at),
    }
}

/// Maps a Stripe status vocabulary word.
///
/// Covers both `payment_status` values and the session `status` words the
/// status gateway reports.
pub fn stripe_status(raw: &str) -> CanonicalStatus {
    match raw {
        "paid" | "no_payment_required" => CanonicalStatus::Completed,
        "expired" | "failed" => CanonicalStatus::Failed,
        "refunded" => CanonicalStatus::Refunded,
        _ => CanonicalStatus::Other,
    }
}

/// Maps a PayPay payment state.
pub fn paypay_status(raw: &str) -> CanonicalStatus {
    match raw {
        "COMPLETED" => CanonicalStatus::Completed,
        "FAILED" | "CANCELED" | "EXPIRED" => CanonicalStatus::Failed,
        "REFUNDED" => CanonicalStatus::Refunded,
        _ => CanonicalStatus::Other,
    }
}

/// Turns a reconciler status query result into an event for a known row.
///
/// Attribution comes from the stored purchase; the provider status API does
/// not echo it.
pub fn normalize_status_report(
    report: &StatusReport,
    purchase: &Purchase,
    now: Timestamp,
) -> CanonicalEvent {
    let status = match report.provider {
        PaymentProvider::Stripe => stripe_status(&report.raw_status),
        PaymentProvider::PayPay => paypay_status(&report.raw_status),
    };

    CanonicalEvent {
        provider: report.provider,
        external_event_id: report.external_event_id.clone(),
        attribution: Some(Attribution {
            user_id: purchase.user_id.clone(),
            diagnosis_id: purchase.diagnosis_id.clone(),
        }),
        amount: report.amount.clone().or_else(|| Some(purchase.amount.clone())),
        raw_status: report.raw_status.clone(),
        status,
        metadata: serde_json::json!({
            "source": "reconciler",
            "details": report.details,
        }),
        observed_at: now,
    }
}

// ══════════════════════════════════════════════════════════════
// Stripe
// ══════════════════════════════════════════════════════════════

fn normalize_stripe(
    payload: &serde_json::Value,
    received_at: Timestamp,
) -> Result<Normalized, WebhookError> {
    let event: StripeEvent = serde_json::from_value(payload.clone())
        .map_err(|e| WebhookError::ParseError(format!("stripe event: {}", e)))?;
    let event_type = event.parsed_type();

    if event_type.is_checkout_session() {
        let session: CheckoutSessionObject = event
            .deserialize_object()
            .map_err(|e| WebhookError::ParseError(format!("checkout session: {}", e)))?;
        return checkout_session_event(&event, event_type, session, received_at)
            .map(Normalized::Event);
    }

    if event_type == StripeEventType::ChargeRefunded {
        let charge: ChargeObject = event
            .deserialize_object()
            .map_err(|e| WebhookError::ParseError(format!("charge: {}", e)))?;
        return refund_event(&event, charge, received_at);
    }

    Ok(Normalized::Ignored(format!(
        "unhandled stripe event type {}",
        event.event_type
    )))
}

fn checkout_session_event(
    event: &StripeEvent,
    event_type: StripeEventType,
    session: CheckoutSessionObject,
    received_at: Timestamp,
) -> Result<CanonicalEvent, WebhookError> {
    let session_id = session
        .id
        .filter(|id| !id.is_empty())
        .ok_or(WebhookError::MissingField("data.object.id"))?;
    let attribution = required_attribution(&session.metadata)?;

    let (status, raw_status) = match event_type {
        StripeEventType::CheckoutSessionCompleted => {
            let raw = session
                .payment_status
                .clone()
                .ok_or(WebhookError::MissingField("data.object.payment_status"))?;
            (stripe_status(&raw), raw)
        }
        StripeEventType::CheckoutSessionAsyncPaymentSucceeded => {
            (CanonicalStatus::Completed, "paid".to_string())
        }
        StripeEventType::CheckoutSessionAsyncPaymentFailed => {
            (CanonicalStatus::Failed, "failed".to_string())
        }
        _ => (CanonicalStatus::Failed, "expired".to_string()),
    };

    Ok(CanonicalEvent {
        provider: PaymentProvider::Stripe,
        external_event_id: session_id,
        attribution: Some(attribution),
        amount: money(session.amount_total, session.currency.as_deref())?,
        raw_status,
        status,
        metadata: serde_json::json!({
            "stripe_event_id": event.id,
            "event_type": event.event_type,
            "payment_intent": session.payment_intent,
        }),
        observed_at: received_at,
    })
}

fn refund_event(
    event: &StripeEvent,
    charge: ChargeObject,
    received_at: Timestamp,
) -> Result<Normalized, WebhookError> {
    if !charge.refunded {
        return Ok(Normalized::Ignored("partial refund".to_string()));
    }
    let session_id = charge
        .metadata
        .checkout_session_id
        .clone()
        .filter(|id| !id.is_empty())
        .ok_or(WebhookError::MissingMetadata("checkout_session_id"))?;

    Ok(Normalized::Event(CanonicalEvent {
        provider: PaymentProvider::Stripe,
        external_event_id: session_id,
        attribution: optional_attribution(
            charge.metadata.user_id.as_deref(),
            charge.metadata.diagnosis_id.as_deref(),
        ),
        amount: money(charge.amount, charge.currency.as_deref())?,
        raw_status: "refunded".to_string(),
        status: CanonicalStatus::Refunded,
        metadata: serde_json::json!({
            "stripe_event_id": event.id,
            "event_type": event.event_type,
            "charge_id": charge.id,
            "amount_refunded": charge.amount_refunded,
        }),
        observed_at: received_at,
    }))
}

fn required_attribution(metadata: &StripeMetadata) -> Result<Attribution, WebhookError> {
    let diagnosis_id = metadata
        .diagnosis_id
        .as_deref()
        .ok_or(WebhookError::MissingMetadata("diagnosis_id"))?;
    let user_id = metadata
        .user_id
        .as_deref()
        .ok_or(WebhookError::MissingMetadata("user_id"))?;

    Ok(Attribution {
        diagnosis_id: DiagnosisId::new(diagnosis_id)
            .map_err(|_| WebhookError::MissingMetadata("diagnosis_id"))?,
        user_id: UserId::new(user_id).map_err(|_| WebhookError::MissingMetadata("user_id"))?,
    })
}

// ══════════════════════════════════════════════════════════════
// PayPay
// ══════════════════════════════════════════════════════════════

/// PayPay transaction notification fields we read.
#[derive(Debug, Clone, Deserialize)]
struct PayPayNotification {
    #[serde(default)]
    notification_type: Option<String>,
    #[serde(default)]
    merchant_order_id: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    order_amount: Option<serde_json::Value>,
    #[serde(default)]
    order_id: Option<String>,
    #[serde(default)]
    paid_at: Option<String>,
    #[serde(default)]
    metadata: Option<PayPayMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PayPayMetadata {
    diagnosis_id: Option<String>,
    user_id: Option<String>,
}

fn normalize_paypay(
    payload: &serde_json::Value,
    received_at: Timestamp,
) -> Result<Normalized, WebhookError> {
    let notification: PayPayNotification = serde_json::from_value(payload.clone())
        .map_err(|e| WebhookError::ParseError(format!("paypay notification: {}", e)))?;

    if let Some(kind) = notification.notification_type.as_deref() {
        if kind != "Transaction" {
            return Ok(Normalized::Ignored(format!(
                "unhandled paypay notification type {}",
                kind
            )));
        }
    }

    let merchant_order_id = notification
        .merchant_order_id
        .filter(|id| !id.is_empty())
        .ok_or(WebhookError::MissingField("merchant_order_id"))?;
    let state = notification
        .state
        .ok_or(WebhookError::MissingField("state"))?;
    let amount = match &notification.order_amount {
        Some(value) => Some(paypay_amount(value)?),
        None => None,
    };
    let metadata = notification.metadata.unwrap_or_default();

    Ok(Normalized::Event(CanonicalEvent {
        provider: PaymentProvider::PayPay,
        external_event_id: merchant_order_id,
        attribution: optional_attribution(
            metadata.user_id.as_deref(),
            metadata.diagnosis_id.as_deref(),
        ),
        amount,
        status: paypay_status(&state),
        raw_status: state,
        metadata: serde_json::json!({
            "order_id": notification.order_id,
            "paid_at": notification.paid_at,
        }),
        observed_at: received_at,
    }))
}

/// PayPay sends amounts as numbers or numeric strings, always in yen.
fn paypay_amount(value: &serde_json::Value) -> Result<Money, WebhookError> {
    let amount = match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| WebhookError::ParseError("order_amount is not an integer".to_string()))?;

    Money::new(amount, Currency::jpy()).map_err(|e| WebhookError::ParseError(e.to_string()))
}

// ══════════════════════════════════════════════════════════════
// Shared
// ══════════════════════════════════════════════════════════════

fn optional_attribution(user_id: Option<&str>, diagnosis_id: Option<&str>) -> Option<Attribution> {
    Some(Attribution {
        user_id: UserId::new(user_id?).ok()?,
        diagnosis_id: DiagnosisId::new(diagnosis_id?).ok()?,
    })
}

fn money(amount: Option<i64>, currency: Option<&str>) -> Result<Option<Money>, WebhookError> {
    match (amount, currency) {
        (Some(amount), Some(currency)) => {
            let currency =
                Currency::new(currency).map_err(|e| WebhookError::ParseError(e.to_string()))?;
            Money::new(amount, currency)
                .map(Some)
                .map_err(|e| WebhookError::ParseError(e.to_string()))
        }
        _ => Ok(None),
    }
}
