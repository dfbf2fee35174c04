//! PaymentStatusGateway port - Outbound "status of payment X" queries.
//!
//! Used only by the reconciler. Calls are authenticated by the adapter and
//! bypass the webhook verifier.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::payment::{PaymentProvider, StatusReport};

/// Errors from provider status queries.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// Network failure, 5xx or 429. Worth another attempt.
    #[error("Transient provider error: {0}")]
    Transient(String),

    /// Call exceeded its deadline. Treated as transient.
    #[error("Provider call timed out after {0} ms")]
    Timeout(u64),

    /// Provider does not know this payment.
    #[error("Payment not found: {0}")]
    NotFound(String),

    /// Authentication or request error. Retrying will not help.
    #[error("Permanent provider error: {0}")]
    Permanent(String),
}

impl GatewayError {
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Transient(_) | GatewayError::Timeout(_))
    }
}

#[async_trait]
pub trait PaymentStatusGateway: Send + Sync {
    fn provider(&self) -> PaymentProvider;

    async fn fetch_status(&self, external_event_id: &str) -> Result<StatusReport, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_and_transient_errors_are_retryable() {
        assert!(GatewayError::Transient("503".to_string()).is_transient());
        assert!(GatewayError::Timeout(5_000).is_transient());
        assert!(!GatewayError::NotFound("mp_1".to_string()).is_transient());
        assert!(!GatewayError::Permanent("401".to_string()).is_transient());
    }
}
