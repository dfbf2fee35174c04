//! AccessRightStore port - Conflict-target upserts on access rights.
//!
//! `(user_id, resource_type, resource_id)` is the upsert key. Implementations
//! perform each write as one atomic statement; no application locks.

use async_trait::async_trait;

use crate::domain::entitlement::{AccessRight, AccessRightKey};
use crate::domain::foundation::{DomainError, UserId};

/// Whether an upsert changed the stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Written,
    Unchanged,
}

#[async_trait]
pub trait AccessRightStore: Send + Sync {
    async fn find(&self, key: &AccessRightKey) -> Result<Option<AccessRight>, DomainError>;

    /// Sets `full` from `right.purchase_id`.
    ///
    /// No-op when the row is already full through the same purchase, so a
    /// redelivered grant leaves `valid_from` untouched.
    async fn grant_full(&self, right: &AccessRight) -> Result<UpsertOutcome, DomainError>;

    /// Sets `preview`, never deleting.
    ///
    /// Only applies when the row is not full, or is full through
    /// `right.purchase_id`; a full grant backed by another purchase wins.
    async fn downgrade(&self, right: &AccessRight) -> Result<UpsertOutcome, DomainError>;

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<AccessRight>, DomainError>;
}
