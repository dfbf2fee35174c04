//! PaymentNotifier port - Optional "your report is unlocked" message.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::domain::payment::Purchase;

/// Fire-and-forget; a failure here never affects the ledger or the grant.
#[async_trait]
pub trait PaymentNotifier: Send + Sync {
    async fn purchase_completed(&self, purchase: &Purchase) -> Result<(), DomainError>;
}
