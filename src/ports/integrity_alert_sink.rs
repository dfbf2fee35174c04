//! IntegrityAlertSink port - Operator-visible channel for state contradictions.

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::foundation::Timestamp;
use crate::domain::payment::PurchaseKey;

/// An event the system refused because it contradicts stored state.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityAlert {
    pub key: Option<PurchaseKey>,
    pub reason: String,
    /// `webhook`, `reconciler` or `admin`.
    pub source: &'static str,
    pub occurred_at: Timestamp,
}

impl IntegrityAlert {
    pub fn new(key: Option<PurchaseKey>, reason: impl Into<String>, source: &'static str) -> Self {
        Self {
            key,
            reason: reason.into(),
            source,
            occurred_at: Timestamp::now(),
        }
    }
}

/// Alerts are never dropped silently; sinks that cannot deliver must log.
#[async_trait]
pub trait IntegrityAlertSink: Send + Sync {
    async fn raise(&self, alert: IntegrityAlert);
}
