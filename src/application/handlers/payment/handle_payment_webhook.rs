//! HandlePaymentWebhookHandler - Verify, normalize and settle one delivery.

use std::sync::Arc;

use axum::http::HeaderMap;

use crate::domain::foundation::Timestamp;
use crate::domain::payment::{
    normalizer, Normalized, PaymentEvent, PaymentProvider, PurchaseStatus, WebhookError,
    WebhookVerifier,
};

use super::settle_payment::SettlePaymentHandler;

/// Command to handle a provider webhook delivery.
#[derive(Debug, Clone)]
pub struct HandlePaymentWebhookCommand {
    pub provider: PaymentProvider,
    /// Raw body exactly as received; signatures cover these bytes.
    pub payload: Vec<u8>,
    pub headers: HeaderMap,
}

/// Result of webhook processing. Every variant is acknowledged with `200`.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlePaymentWebhookResult {
    /// Ledger row created or advanced.
    Recorded {
        purchase_id: String,
        status: PurchaseStatus,
    },
    /// Redelivery or stale event; ledger unchanged.
    Duplicate {
        purchase_id: String,
        status: PurchaseStatus,
    },
    /// Authentic but irrelevant event.
    Ignored(String),
}

pub struct HandlePaymentWebhookHandler {
    verifier: Arc<WebhookVerifier>,
    settle: Arc<SettlePaymentHandler>,
}

impl HandlePaymentWebhookHandler {
    pub fn new(verifier: Arc<WebhookVerifier>, settle: Arc<SettlePaymentHandler>) -> Self {
        Self { verifier, settle }
    }

    pub async fn handle(
        &self,
        cmd: HandlePaymentWebhookCommand,
    ) -> Result<HandlePaymentWebhookResult, WebhookError> {
        let provider = cmd.provider;
        let event = PaymentEvent::new(provider, cmd.payload);

        // 1. Prove origin and freshness; nothing is written before this.
        let verified = self
            .verifier
            .verify(&event, &cmd.headers, Timestamp::now())
            .map_err(|e| {
                if e.is_auth_failure() {
                    tracing::warn!(provider = %provider, error = %e, "webhook rejected");
                }
                e
            })?;

        // 2. Map to canonical form
        let canonical = match normalizer::normalize(&verified)? {
            Normalized::Event(canonical) => canonical,
            Normalized::Ignored(reason) => {
                tracing::info!(provider = %provider, reason = %reason, "webhook ignored");
                return Ok(HandlePaymentWebhookResult::Ignored(reason));
            }
        };

        // 3. Ledger + entitlement
        let outcome = self.settle.settle(&canonical, "webhook").await?;

        let purchase_id = outcome.purchase.id.to_string();
        let status = outcome.purchase.status;
        Ok(if outcome.is_duplicate() {
            HandlePaymentWebhookResult::Duplicate {
                purchase_id,
                status,
            }
        } else {
            HandlePaymentWebhookResult::Recorded {
                purchase_id,
                status,
            }
        })
    }
}
