//! In-memory access right store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::entitlement::{AccessLevel, AccessRight, AccessRightKey};
use crate::domain::foundation::{DomainError, UserId};
use crate::ports::{AccessRightStore, UpsertOutcome};

#[derive(Debug, Clone, Default)]
pub struct InMemoryAccessRightStore {
    rights: Arc<RwLock<HashMap<AccessRightKey, AccessRight>>>,
}

impl InMemoryAccessRightStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rights.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rights.read().await.is_empty()
    }

    /// Drops a row. Simulates a crash between ledger write and grant.
    pub async fn forget(&self, key: &AccessRightKey) {
        self.rights.write().await.remove(key);
    }
}

#[async_trait]
impl AccessRightStore for InMemoryAccessRightStore {
    async fn find(&self, key: &AccessRightKey) -> Result<Option<AccessRight>, DomainError> {
        Ok(self.rights.read().await.get(key).cloned())
    }

    async fn grant_full(&self, right: &AccessRight) -> Result<UpsertOutcome, DomainError> {
        let mut rights = self.rights.write().await;
        if let (Some(existing), Some(purchase_id)) = (rights.get(&right.key), &right.purchase_id) {
            if existing.is_full_via(purchase_id) {
                return Ok(UpsertOutcome::Unchanged);
            }
        }
        rights.insert(right.key.clone(), right.clone());
        Ok(UpsertOutcome::Written)
    }

    async fn downgrade(&self, right: &AccessRight) -> Result<UpsertOutcome, DomainError> {
        let mut rights = self.rights.write().await;
        if let Some(existing) = rights.get(&right.key) {
            let backed_by_other = existing.is_full() && existing.purchase_id != right.purchase_id;
            let already_downgraded = existing.access_level == AccessLevel::Preview
                && existing.purchase_id == right.purchase_id;
            if backed_by_other || already_downgraded {
                return Ok(UpsertOutcome::Unchanged);
            }
        }
        rights.insert(right.key.clone(), right.clone());
        Ok(UpsertOutcome::Written)
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<AccessRight>, DomainError> {
        Ok(self
            .rights
            .read()
            .await
            .values()
            .filter(|r| &r.key.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{DiagnosisId, PurchaseId, Timestamp};

    fn key() -> AccessRightKey {
        AccessRightKey::diagnosis(UserId::new("u1").unwrap(), DiagnosisId::new("d1").unwrap())
    }

    #[tokio::test]
    async fn regrant_through_same_purchase_is_unchanged() {
        let store = InMemoryAccessRightStore::new();
        let purchase = PurchaseId::new();
        let first = AccessRight::full(key(), purchase, Timestamp::now());
        store.grant_full(&first).await.unwrap();

        let again = AccessRight::full(key(), purchase, Timestamp::now().plus_secs(30));
        let outcome = store.grant_full(&again).await.unwrap();

        assert_eq!(outcome, UpsertOutcome::Unchanged);
        assert_eq!(store.find(&key()).await.unwrap().unwrap(), first);
    }

    #[tokio::test]
    async fn grant_from_second_purchase_repoints_row() {
        let store = InMemoryAccessRightStore::new();
        store
            .grant_full(&AccessRight::full(key(), PurchaseId::new(), Timestamp::now()))
            .await
            .unwrap();
        let second = PurchaseId::new();

        store
            .grant_full(&AccessRight::full(key(), second, Timestamp::now()))
            .await
            .unwrap();

        assert_eq!(store.len().await, 1);
        assert_eq!(store.find(&key()).await.unwrap().unwrap().purchase_id, Some(second));
    }

    #[tokio::test]
    async fn downgrade_of_own_grant_sets_preview() {
        let store = InMemoryAccessRightStore::new();
        let purchase = PurchaseId::new();
        store
            .grant_full(&AccessRight::full(key(), purchase, Timestamp::now()))
            .await
            .unwrap();

        let outcome = store
            .downgrade(&AccessRight::preview(key(), purchase, Timestamp::now()))
            .await
            .unwrap();

        assert_eq!(outcome, UpsertOutcome::Written);
        assert_eq!(
            store.find(&key()).await.unwrap().unwrap().access_level,
            AccessLevel::Preview
        );
    }

    #[tokio::test]
    async fn downgrade_never_clobbers_grant_backed_by_other_purchase() {
        let store = InMemoryAccessRightStore::new();
        let other = PurchaseId::new();
        store
            .grant_full(&AccessRight::full(key(), other, Timestamp::now()))
            .await
            .unwrap();

        let outcome = store
            .downgrade(&AccessRight::preview(key(), PurchaseId::new(), Timestamp::now()))
            .await
            .unwrap();

        assert_eq!(outcome, UpsertOutcome::Unchanged);
        assert!(store.find(&key()).await.unwrap().unwrap().is_full_via(&other));
    }

    #[tokio::test]
    async fn downgrade_without_row_creates_preview() {
        let store = InMemoryAccessRightStore::new();
        store
            .downgrade(&AccessRight::preview(key(), PurchaseId::new(), Timestamp::now()))
            .await
            .unwrap();
        assert_eq!(
            store.find(&key()).await.unwrap().unwrap().access_level,
            AccessLevel::Preview
        );
    }
}
