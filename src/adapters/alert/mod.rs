//! Integrity alert sinks.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::ports::{IntegrityAlert, IntegrityAlertSink};

/// Emits alerts as `error` events with `alert = true` for log-based paging.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingAlertSink;

#[async_trait]
impl IntegrityAlertSink for LoggingAlertSink {
    async fn raise(&self, alert: IntegrityAlert) {
        let key = alert
            .key
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "-".to_string());
        tracing::error!(
            alert = true,
            purchase_key = %key,
            source = alert.source,
            occurred_at = %alert.occurred_at,
            reason = %alert.reason,
            "payment state integrity violation"
        );
    }
}

/// Keeps alerts in memory and logs them. For tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAlertSink {
    alerts: Arc<Mutex<Vec<IntegrityAlert>>>,
}

impl InMemoryAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn alerts(&self) -> Vec<IntegrityAlert> {
        self.alerts.lock().await.clone()
    }
}

#[async_trait]
impl IntegrityAlertSink for InMemoryAlertSink {
    async fn raise(&self, alert: IntegrityAlert) {
        LoggingAlertSink.raise(alert.clone()).await;
        self.alerts.lock().await.push(alert);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::{PaymentProvider, PurchaseKey};

    #[tokio::test]
    async fn in_memory_sink_records_alerts() {
        let sink = InMemoryAlertSink::new();
        sink.raise(IntegrityAlert::new(
            Some(PurchaseKey::new(PaymentProvider::Stripe, "cs_1")),
            "failed -> completed",
            "webhook",
        ))
        .await;

        let alerts = sink.alerts().await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].source, "webhook");
    }
}
