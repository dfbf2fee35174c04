//! Stripe webhook event types.
//!
//! Only fields relevant to purchase settlement are captured; the rest of
//! Stripe's schema is ignored on deserialization.

use serde::{Deserialize, Serialize};

/// Envelope of every Stripe webhook delivery.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEvent {
    pub id: String,

    #[serde(rename = "type")]
    pub event_type: String,

    /// Unix seconds.
    #[serde(default)]
    pub created: i64,

    pub data: StripeEventData,

    #[serde(default)]
    pub livemode: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripeEventData {
    /// `checkout.session` or `charge`, depending on the type.
    pub object: serde_json::Value,
}

impl StripeEvent {
    pub fn parsed_type(&self) -> StripeEventType {
        StripeEventType::from_str(&self.event_type)
    }

    pub fn deserialize_object<T: serde::de::DeserializeOwned>(
        &self,
    ) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.object.clone())
    }
}

/// Stripe event types that affect a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StripeEventType {
    CheckoutSessionCompleted,
    CheckoutSessionAsyncPaymentSucceeded,
    CheckoutSessionAsyncPaymentFailed,
    CheckoutSessionExpired,
    ChargeRefunded,
    /// Anything else. Acknowledged and dropped.
    Unknown,
}

impl StripeEventType {
    pub fn from_str(s: &str) -> Self {
        match s {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "checkout.session.async_payment_succeeded" => Self::CheckoutSessionAsyncPaymentSucceeded,
            "checkout.session.async_payment_failed" => Self::CheckoutSessionAsyncPaymentFailed,
            "checkout.session.expired" => Self::CheckoutSessionExpired,
            "charge.refunded" => Self::ChargeRefunded,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckoutSessionCompleted => "checkout.session.completed",
            Self::CheckoutSessionAsyncPaymentSucceeded => "checkout.session.async_payment_succeeded",
            Self::CheckoutSessionAsyncPaymentFailed => "checkout.session.async_payment_failed",
            Self::CheckoutSessionExpired => "checkout.session.expired",
            Self::ChargeRefunded => "charge.refunded",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_checkout_session(&self) -> bool {
        matches!(
            self,
            Self::CheckoutSessionCompleted
                | Self::CheckoutSessionAsyncPaymentSucceeded
                | Self::CheckoutSessionAsyncPaymentFailed
                | Self::CheckoutSessionExpired
        )
    }
}

/// `checkout.session` object fields we read.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSessionObject {
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub metadata: StripeMetadata,
}

/// `charge` object fields we read on refunds.
#[derive(Debug, Clone, Deserialize)]
pub struct ChargeObject {
    pub id: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub amount_refunded: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub refunded: bool,
    #[serde(default)]
    pub metadata: StripeMetadata,
}

/// Metadata attached at checkout creation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StripeMetadata {
    pub diagnosis_id: Option<String>,
    pub user_id: Option<String>,
    pub checkout_session_id: Option<String>,
}

/// Builder for creating test StripeEvent payloads.
#[cfg(test)]
pub struct StripeEventBuilder {
    id: String,
    event_type: String,
    object: serde_json::Value,
}

#[cfg(test)]
impl StripeEventBuilder {
    pub fn checkout_completed(session_id: &str) -> Self {
        Self {
            id: "evt_test_123".to_string(),
            event_type: "checkout.session.completed".to_string(),
            object: serde_json::json!({
                "id": session_id,
                "object": "checkout.session",
                "status": "complete",
                "payment_status": "paid",
                "amount_total": 98000,
                "currency": "jpy",
                "payment_intent": "pi_test_1",
                "metadata": { "diagnosis_id": "d1", "user_id": "u1" }
            }),
        }
    }

    pub fn event_type(mut self, event_type: &str) -> Self {
        self.event_type = event_type.to_string();
        self
    }

    pub fn object(mut self, object: serde_json::Value) -> Self {
        self.object = object;
        self
    }

    pub fn set(mut self, key: &str, value: serde_json::Value) -> Self {
        self.object[key] = value;
        self
    }

    pub fn build_value(self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "type": self.event_type,
            "created": 1_700_000_000,
            "livemode": false,
            "data": { "object": self.object }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_round_trips() {
        for t in [
            StripeEventType::CheckoutSessionCompleted,
            StripeEventType::CheckoutSessionAsyncPaymentSucceeded,
            StripeEventType::CheckoutSessionAsyncPaymentFailed,
            StripeEventType::CheckoutSessionExpired,
            StripeEventType::ChargeRefunded,
        ] {
            assert_eq!(StripeEventType::from_str(t.as_str()), t);
        }
    }

    #[test]
    fn unhandled_type_is_unknown() {
        assert_eq!(
            StripeEventType::from_str("customer.created"),
            StripeEventType::Unknown
        );
    }

    #[test]
    fn deserializes_minimal_event() {
        let value = StripeEventBuilder::checkout_completed("cs_1").build_value();
        let event: StripeEvent = serde_json::from_value(value).unwrap();
        let session: CheckoutSessionObject = event.deserialize_object().unwrap();

        assert_eq!(event.parsed_type(), StripeEventType::CheckoutSessionCompleted);
        assert_eq!(session.id.as_deref(), Some("cs_1"));
        assert_eq!(session.metadata.diagnosis_id.as_deref(), Some("d1"));
    }
}
