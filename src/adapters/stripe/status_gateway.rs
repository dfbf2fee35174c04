//! Stripe checkout session status queries.
//!
//! The reconciler asks Stripe for the checkout session behind a pending
//! purchase. Calls authenticate with the secret API key as HTTP basic auth
//! username, as the Stripe API expects.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::adapters::provider_http::{send_error, status_error};
use crate::domain::payment::{Currency, Money, PaymentProvider, StatusReport};
use crate::ports::{GatewayError, PaymentStatusGateway};

pub const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";

/// Subset of a Stripe checkout session needed to judge payment state.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSessionStatus {
    pub id: String,
    /// `open`, `complete` or `expired`.
    #[serde(default)]
    pub status: Option<String>,
    /// `paid`, `unpaid` or `no_payment_required`.
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
}

impl CheckoutSessionStatus {
    /// Collapses `status` and `payment_status` into one word for the normalizer.
    ///
    /// A completed session reports its payment status; an expired one reports
    /// `expired`; anything else reports whichever field is present.
    pub fn raw_status(&self) -> String {
        let status = self.status.as_deref();
        let payment = self.payment_status.as_deref();
        match (status, payment) {
            (Some("complete"), Some(p @ ("paid" | "no_payment_required"))) => p.to_string(),
            (Some("expired"), _) => "expired".to_string(),
            (_, Some(p)) => p.to_string(),
            (Some(s), None) => s.to_string(),
            (None, None) => "unknown".to_string(),
        }
    }

    /// Stripe currencies are lowercase ISO codes.
    pub fn amount(&self) -> Option<Money> {
        let currency = Currency::new(self.currency.as_deref()?).ok()?;
        Money::new(self.amount_total?, currency).ok()
    }
}

pub struct StripeStatusGateway {
    api_key: SecretString,
    api_base_url: String,
    http_client: reqwest::Client,
}

impl StripeStatusGateway {
    pub fn new(api_key: SecretString, api_base_url: impl Into<String>) -> Self {
        Self {
            api_key,
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
        }
    }

    /// Replaces the default client, e.g. with one carrying a request timeout.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = client;
        self
    }
}

#[async_trait]
impl PaymentStatusGateway for StripeStatusGateway {
    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Stripe
    }

    async fn fetch_status(&self, external_event_id: &str) -> Result<StatusReport, GatewayError> {
        let url = format!(
            "{}/v1/checkout/sessions/{}",
            self.api_base_url, external_event_id
        );

        let response = self
            .http_client
            .get(&url)
            .basic_auth(self.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await
            .map_err(send_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, external_event_id, &body));
        }

        let session: CheckoutSessionStatus = response
            .json()
            .await
            .map_err(|e| GatewayError::Permanent(format!("Failed to parse Stripe response: {}", e)))?;

        Ok(StatusReport {
            provider: PaymentProvider::Stripe,
            external_event_id: session.id.clone(),
            raw_status: session.raw_status(),
            amount: session.amount(),
            details: serde_json::json!({
                "status": session.status,
                "payment_status": session.payment_status,
            }),
        })
    }
}
