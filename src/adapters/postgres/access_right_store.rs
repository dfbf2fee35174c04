//! PostgreSQL implementation of AccessRightStore.
//!
//! Both writes are single `INSERT ... ON CONFLICT DO UPDATE ... WHERE`
//! statements on `access_rights_user_resource_key`. The `WHERE` clause on the
//! update arm carries the no-op and precedence rules; `RETURNING` tells the
//! caller whether anything was written.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entitlement::{AccessLevel, AccessRight, AccessRightKey, ResourceType};
use crate::domain::foundation::{
    DiagnosisId, DomainError, ErrorCode, PurchaseId, Timestamp, UserId,
};
use crate::ports::{AccessRightStore, UpsertOutcome};

pub struct PostgresAccessRightStore {
    pool: PgPool,
}

impl PostgresAccessRightStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn upsert(&self, sql: &str, right: &AccessRight) -> Result<UpsertOutcome, DomainError> {
        let written: Option<(String,)> = sqlx::query_as(sql)
            .bind(right.key.user_id.as_str())
            .bind(right.key.resource_type.as_str())
            .bind(right.key.resource_id.as_str())
            .bind(right.access_level.as_str())
            .bind(right.purchase_id.map(|id| *id.as_uuid()))
            .bind(right.valid_from.as_datetime())
            .bind(right.valid_until.map(|t| *t.as_datetime()))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Failed to write access right {}: {}", right.key, e),
                )
            })?;

        Ok(match written {
            Some(_) => UpsertOutcome::Written,
            None => UpsertOutcome::Unchanged,
        })
    }
}

const GRANT_FULL_SQL: &str = r#"
    INSERT INTO access_rights (
        user_id, resource_type, resource_id, access_level, purchase_id,
        valid_from, valid_until, updated_at
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
    ON CONFLICT (user_id, resource_type, resource_id) DO UPDATE SET
        access_level = EXCLUDED.access_level,
        purchase_id = EXCLUDED.purchase_id,
        valid_from = EXCLUDED.valid_from,
        valid_until = EXCLUDED.valid_until,
        updated_at = NOW()
    WHERE NOT (
        access_rights.access_level = 'full'
        AND access_rights.purchase_id IS NOT DISTINCT FROM EXCLUDED.purchase_id
    )
    RETURNING user_id
"#;

const DOWNGRADE_SQL: &str = r#"
    INSERT INTO access_rights (
        user_id, resource_type, resource_id, access_level, purchase_id,
        valid_from, valid_until, updated_at
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
    ON CONFLICT (user_id, resource_type, resource_id) DO UPDATE SET
        access_level = EXCLUDED.access_level,
        purchase_id = EXCLUDED.purchase_id,
        valid_from = EXCLUDED.valid_from,
        valid_until = EXCLUDED.valid_until,
        updated_at = NOW()
    WHERE (
        access_rights.access_level <> 'full'
        OR access_rights.purchase_id IS NOT DISTINCT FROM EXCLUDED.purchase_id
    )
    AND NOT (
        access_rights.access_level = EXCLUDED.access_level
        AND access_rights.purchase_id IS NOT DISTINCT FROM EXCLUDED.purchase_id
    )
    RETURNING user_id
"#;

/// Database row representation of an access right.
#[derive(Debug, sqlx::FromRow)]
struct AccessRightRow {
    user_id: String,
    resource_type: String,
    resource_id: String,
    access_level: String,
    purchase_id: Option<Uuid>,
    valid_from: DateTime<Utc>,
    valid_until: Option<DateTime<Utc>>,
}

impl TryFrom<AccessRightRow> for AccessRight {
    type Error = DomainError;

    fn try_from(row: AccessRightRow) -> Result<Self, Self::Error> {
        let invalid = |e: crate::domain::foundation::ValidationError| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid access_rights row: {}", e),
            )
        };

        let resource_type: ResourceType = row.resource_type.parse().map_err(invalid)?;
        let key = match resource_type {
            ResourceType::Diagnosis => AccessRightKey::diagnosis(
                UserId::new(row.user_id).map_err(invalid)?,
                DiagnosisId::new(row.resource_id).map_err(invalid)?,
            ),
        };

        Ok(AccessRight {
            key,
            access_level: row.access_level.parse::<AccessLevel>().map_err(invalid)?,
            purchase_id: row.purchase_id.map(PurchaseId::from_uuid),
            valid_from: Timestamp::from_datetime(row.valid_from),
            valid_until: row.valid_until.map(Timestamp::from_datetime),
        })
    }
}

#[async_trait]
impl AccessRightStore for PostgresAccessRightStore {
    async fn find(&self, key: &AccessRightKey) -> Result<Option<AccessRight>, DomainError> {
        let row: Option<AccessRightRow> = sqlx::query_as(
            r#"
            SELECT user_id, resource_type, resource_id, access_level, purchase_id,
                   valid_from, valid_until
            FROM access_rights
            WHERE user_id = $1 AND resource_type = $2 AND resource_id = $3
            "#,
        )
        .bind(key.user_id.as_str())
        .bind(key.resource_type.as_str())
        .bind(key.resource_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to find access right: {}", e)))?;

        row.map(AccessRight::try_from).transpose()
    }

    async fn grant_full(&self, right: &AccessRight) -> Result<UpsertOutcome, DomainError> {
        self.upsert(GRANT_FULL_SQL, right).await
    }

    async fn downgrade(&self, right: &AccessRight) -> Result<UpsertOutcome, DomainError> {
        self.upsert(DOWNGRADE_SQL, right).await
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<AccessRight>, DomainError> {
        let rows: Vec<AccessRightRow> = sqlx::query_as(
            r#"
            SELECT user_id, resource_type, resource_id, access_level, purchase_id,
                   valid_from, valid_until
            FROM access_rights
            WHERE user_id = $1
            ORDER BY resource_id
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to list access rights: {}", e)))?;

        rows.into_iter().map(AccessRight::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_converts_to_access_right() {
        let row = AccessRightRow {
            user_id: "u1".to_string(),
            resource_type: "diagnosis".to_string(),
            resource_id: "d1".to_string(),
            access_level: "full".to_string(),
            purchase_id: Some(Uuid::new_v4()),
            valid_from: Utc::now(),
            valid_until: None,
        };

        let right = AccessRight::try_from(row).unwrap();
        assert!(right.is_full());
        assert_eq!(right.key.to_string(), "u1/diagnosis/d1");
    }

    #[test]
    fn unknown_level_is_database_error() {
        let row = AccessRightRow {
            user_id: "u1".to_string(),
            resource_type: "diagnosis".to_string(),
            resource_id: "d1".to_string(),
            access_level: "admin".to_string(),
            purchase_id: None,
            valid_from: Utc::now(),
            valid_until: None,
        };

        let err = AccessRight::try_from(row).unwrap_err();
        assert_eq!(err.code, ErrorCode::DatabaseError);
    }

    #[test]
    fn grant_statement_skips_same_purchase() {
        assert!(GRANT_FULL_SQL.contains("IS NOT DISTINCT FROM EXCLUDED.purchase_id"));
        assert!(DOWNGRADE_SQL.contains("access_level <> 'full'"));
    }
}
