//! PostgreSQL implementation of PurchaseLedger.
//!
//! Idempotency rests on the `purchases_provider_event_key` unique constraint:
//! the first sight of a key is an `INSERT ... ON CONFLICT DO NOTHING`, and
//! every later status change is a conditional `UPDATE` guarded by the
//! predecessor status. A conditional update that matches no row means another
//! writer moved the row first, so the current row is re-read and classified
//! again.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{
    DiagnosisId, DomainError, ErrorCode, PurchaseId, Timestamp, UserId,
};
use crate::domain::payment::{
    CanonicalEvent, Currency, Money, PaymentProvider, Purchase, PurchaseKey, PurchaseStatus,
    TransitionDecision,
};
use crate::ports::{integrity_violation, unattributed, PurchaseLedger, RecordOutcome};

/// Statuses move at most two steps, so a row can lose at most two races.
const MAX_ADVANCE_ATTEMPTS: usize = 3;

const PURCHASE_COLUMNS: &str = "id, provider, external_event_id, diagnosis_id, user_id, \
     amount_minor_units, currency, status, metadata, created_at, completed_at, updated_at, \
     last_polled_at";

pub struct PostgresPurchaseLedger {
    pool: PgPool,
}

impl PostgresPurchaseLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_if_absent(&self, purchase: &Purchase) -> Result<Option<Purchase>, DomainError> {
        let row: Option<PurchaseRow> = sqlx::query_as(&format!(
            r#"
            INSERT INTO purchases (
                id, provider, external_event_id, diagnosis_id, user_id,
                amount_minor_units, currency, status, metadata,
                created_at, completed_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (provider, external_event_id) DO NOTHING
            RETURNING {PURCHASE_COLUMNS}
            "#
        ))
        .bind(purchase.id.as_uuid())
        .bind(purchase.provider.as_str())
        .bind(&purchase.external_event_id)
        .bind(purchase.diagnosis_id.as_str())
        .bind(purchase.user_id.as_str())
        .bind(purchase.amount.amount_minor_units())
        .bind(purchase.amount.currency().as_str())
        .bind(purchase.status.as_str())
        .bind(&purchase.metadata)
        .bind(purchase.created_at.as_datetime())
        .bind(purchase.completed_at.map(|t| *t.as_datetime()))
        .bind(purchase.updated_at.as_datetime())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("insert purchase", e))?;

        row.map(Purchase::try_from).transpose()
    }

    /// Moves the row to `target` only if it is still at `expected`.
    async fn advance_if_at(
        &self,
        key: &PurchaseKey,
        expected: PurchaseStatus,
        target: PurchaseStatus,
    ) -> Result<Option<Purchase>, DomainError> {
        let row: Option<PurchaseRow> = sqlx::query_as(&format!(
            r#"
            UPDATE purchases SET
                status = $4,
                completed_at = CASE WHEN $4 = 'completed' THEN $5 ELSE completed_at END,
                updated_at = $5
            WHERE provider = $1 AND external_event_id = $2 AND status = $3
            RETURNING {PURCHASE_COLUMNS}
            "#
        ))
        .bind(key.provider.as_str())
        .bind(&key.external_event_id)
        .bind(expected.as_str())
        .bind(target.as_str())
        .bind(Timestamp::now().as_datetime())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("advance purchase", e))?;

        row.map(Purchase::try_from).transpose()
    }

    async fn fetch_many(
        &self,
        sql: String,
        binds: &[&str],
    ) -> Result<Vec<Purchase>, DomainError> {
        let mut query = sqlx::query_as::<_, PurchaseRow>(&sql);
        for value in binds {
            query = query.bind(*value);
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("list purchases", e))?;
        rows.into_iter().map(Purchase::try_from).collect()
    }
}

/// Database row representation of a purchase.
#[derive(Debug, sqlx::FromRow)]
struct PurchaseRow {
    id: Uuid,
    provider: String,
    external_event_id: String,
    diagnosis_id: String,
    user_id: String,
    amount_minor_units: i64,
    currency: String,
    status: String,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
    last_polled_at: Option<DateTime<Utc>>,
}

impl TryFrom<PurchaseRow> for Purchase {
    type Error = DomainError;

    fn try_from(row: PurchaseRow) -> Result<Self, Self::Error> {
        let corrupt = |field: &str, e: crate::domain::foundation::ValidationError| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid {} in purchases row {}: {}", field, row.id, e),
            )
        };

        let provider: PaymentProvider = row.provider.parse().map_err(|e| corrupt("provider", e))?;
        let status: PurchaseStatus = row.status.parse().map_err(|e| corrupt("status", e))?;
        let currency = Currency::new(&row.currency).map_err(|e| corrupt("currency", e))?;
        let amount =
            Money::new(row.amount_minor_units, currency).map_err(|e| corrupt("amount", e))?;
        let diagnosis_id =
            DiagnosisId::new(row.diagnosis_id.clone()).map_err(|e| corrupt("diagnosis_id", e))?;
        let user_id = UserId::new(row.user_id.clone()).map_err(|e| corrupt("user_id", e))?;

        Ok(Purchase {
            id: PurchaseId::from_uuid(row.id),
            provider,
            external_event_id: row.external_event_id,
            diagnosis_id,
            user_id,
            amount,
            status,
            created_at: Timestamp::from_datetime(row.created_at),
            completed_at: row.completed_at.map(Timestamp::from_datetime),
            updated_at: Timestamp::from_datetime(row.updated_at),
            last_polled_at: row.last_polled_at.map(Timestamp::from_datetime),
            metadata: row.metadata,
        })
    }
}

fn db_error(action: &str, e: sqlx::Error) -> DomainError {
    DomainError::database(format!("Failed to {}: {}", action, e))
}

#[async_trait]
impl PurchaseLedger for PostgresPurchaseLedger {
    async fn record_or_advance(
        &self,
        event: &CanonicalEvent,
    ) -> Result<RecordOutcome, DomainError> {
        let key = PurchaseKey::new(event.provider, event.external_event_id.clone());
        let target = event.status.target();

        let first_sight = Purchase::first_sight(event, Timestamp::now());
        if let Ok(candidate) = &first_sight {
            if let Some(inserted) = self.insert_if_absent(candidate).await? {
                return Ok(RecordOutcome::inserted(inserted));
            }
        }

        for _ in 0..MAX_ADVANCE_ATTEMPTS {
            let current = match self.find_by_key(&key).await? {
                Some(current) => current,
                None => {
                    return Err(match first_sight {
                        Err(reason) => unattributed(&key, reason),
                        Ok(_) => DomainError::database(format!(
                            "purchase {} vanished after conflicting insert",
                            key
                        )),
                    });
                }
            };

            match current.status.classify(target) {
                TransitionDecision::Duplicate | TransitionDecision::Stale => {
                    return Ok(RecordOutcome::unchanged(current));
                }
                TransitionDecision::Illegal => {
                    return Err(integrity_violation(&key, current.status, target));
                }
                TransitionDecision::Advance => {
                    if let Some(advanced) = self.advance_if_at(&key, current.status, target).await? {
                        return Ok(RecordOutcome::advanced(advanced, current.status));
                    }
                    tracing::debug!(purchase_key = %key, "conditional update lost race, re-reading");
                }
            }
        }

        Err(DomainError::database(format!(
            "purchase {} kept changing under concurrent writers",
            key
        )))
    }

    async fn find_by_key(&self, key: &PurchaseKey) -> Result<Option<Purchase>, DomainError> {
        let row: Option<PurchaseRow> = sqlx::query_as(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases WHERE provider = $1 AND external_event_id = $2"
        ))
        .bind(key.provider.as_str())
        .bind(&key.external_event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find purchase", e))?;

        row.map(Purchase::try_from).transpose()
    }

    async fn find_by_id(&self, id: &PurchaseId) -> Result<Option<Purchase>, DomainError> {
        let row: Option<PurchaseRow> =
            sqlx::query_as(&format!("SELECT {PURCHASE_COLUMNS} FROM purchases WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("find purchase", e))?;

        row.map(Purchase::try_from).transpose()
    }

    async fn find_stale_pending(
        &self,
        older_than: Timestamp,
        limit: u32,
    ) -> Result<Vec<Purchase>, DomainError> {
        let rows: Vec<PurchaseRow> = sqlx::query_as(&format!(
            r#"
            SELECT {PURCHASE_COLUMNS} FROM purchases
            WHERE status = 'pending' AND created_at < $1
            ORDER BY last_polled_at ASC NULLS FIRST, created_at ASC
            LIMIT $2
            "#
        ))
        .bind(older_than.as_datetime())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("find stale pending purchases", e))?;

        rows.into_iter().map(Purchase::try_from).collect()
    }

    async fn mark_polled(&self, id: &PurchaseId, at: Timestamp) -> Result<(), DomainError> {
        sqlx::query("UPDATE purchases SET last_polled_at = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(at.as_datetime())
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("mark purchase polled", e))?;
        Ok(())
    }

    async fn find_completed_for_resource(
        &self,
        user_id: &UserId,
        diagnosis_id: &DiagnosisId,
    ) -> Result<Vec<Purchase>, DomainError> {
        self.fetch_many(
            format!(
                "SELECT {PURCHASE_COLUMNS} FROM purchases \
                 WHERE user_id = $1 AND diagnosis_id = $2 AND status = 'completed' \
                 ORDER BY completed_at ASC"
            ),
            &[user_id.as_str(), diagnosis_id.as_str()],
        )
        .await
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Purchase>, DomainError> {
        self.fetch_many(
            format!(
                "SELECT {PURCHASE_COLUMNS} FROM purchases WHERE user_id = $1 \
                 ORDER BY created_at DESC"
            ),
            &[user_id.as_str()],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> PurchaseRow {
        let now = Utc::now();
        PurchaseRow {
            id: Uuid::new_v4(),
            provider: "stripe".to_string(),
            external_event_id: "cs_1".to_string(),
            diagnosis_id: "d1".to_string(),
            user_id: "u1".to_string(),
            amount_minor_units: 98_000,
            currency: "JPY".to_string(),
            status: "completed".to_string(),
            metadata: serde_json::json!({}),
            created_at: now,
            completed_at: Some(now),
            updated_at: now,
            last_polled_at: None,
        }
    }

    #[test]
    fn row_converts_to_purchase() {
        let purchase = Purchase::try_from(row()).unwrap();
        assert_eq!(purchase.key().to_string(), "stripe:cs_1");
        assert_eq!(purchase.status, PurchaseStatus::Completed);
        assert_eq!(purchase.amount.to_string(), "98000 JPY");
    }

    #[test]
    fn unknown_status_is_database_error() {
        let mut bad = row();
        bad.status = "settled".to_string();
        let err = Purchase::try_from(bad).unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }

    #[test]
    fn unknown_provider_is_database_error() {
        let mut bad = row();
        bad.provider = "square".to_string();
        assert!(Purchase::try_from(bad).is_err());
    }
}
