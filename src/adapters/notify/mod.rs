//! Purchase completion notifiers.

mod line;

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::domain::payment::Purchase;
use crate::ports::PaymentNotifier;

pub use line::{completion_message, LineNotifier, DEFAULT_LINE_PUSH_URL};

/// Notifier used when no channel is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl PaymentNotifier for NoopNotifier {
    async fn purchase_completed(&self, purchase: &Purchase) -> Result<(), DomainError> {
        tracing::debug!(purchase_id = %purchase.id, "notification channel disabled");
        Ok(())
    }
}
