//! DiagnosisReader port - Read-only view of generated reports.

use async_trait::async_trait;

use crate::domain::foundation::{DiagnosisId, DomainError};

/// Reports are produced elsewhere; this core only checks they exist.
#[async_trait]
pub trait DiagnosisReader: Send + Sync {
    async fn exists(&self, id: &DiagnosisId) -> Result<bool, DomainError>;
}
