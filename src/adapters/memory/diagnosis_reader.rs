//! In-memory diagnosis catalogue.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DiagnosisId, DomainError};
use crate::ports::DiagnosisReader;

#[derive(Debug, Clone, Default)]
pub struct InMemoryDiagnosisReader {
    known: Arc<RwLock<HashSet<DiagnosisId>>>,
    /// Every id exists. Development mode only.
    permissive: bool,
}

impl InMemoryDiagnosisReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn permissive() -> Self {
        Self {
            permissive: true,
            ..Self::default()
        }
    }

    pub fn with_diagnoses<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let known = ids
            .into_iter()
            .filter_map(|id| DiagnosisId::new(id).ok())
            .collect();
        Self {
            known: Arc::new(RwLock::new(known)),
            permissive: false,
        }
    }

    pub async fn insert(&self, id: DiagnosisId) {
        self.known.write().await.insert(id);
    }
}

#[async_trait]
impl DiagnosisReader for InMemoryDiagnosisReader {
    async fn exists(&self, id: &DiagnosisId) -> Result<bool, DomainError> {
        Ok(self.permissive || self.known.read().await.contains(id))
    }
}
