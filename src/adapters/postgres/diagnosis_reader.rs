//! PostgreSQL implementation of DiagnosisReader.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::{DiagnosisId, DomainError};
use crate::ports::DiagnosisReader;

pub struct PostgresDiagnosisReader {
    pool: PgPool,
}

impl PostgresDiagnosisReader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DiagnosisReader for PostgresDiagnosisReader {
    async fn exists(&self, id: &DiagnosisId) -> Result<bool, DomainError> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM diagnoses WHERE id = $1)")
                .bind(id.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    DomainError::database(format!("Failed to look up diagnosis {}: {}", id, e))
                })?;
        Ok(exists)
    }
}
