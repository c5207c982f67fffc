use std::collections::BTreeSet;

use async_trait::async_trait;
use sharegate_application::{GrantChange, GrantChangeSet, GrantRepository};
use sharegate_core::AppResult;
use sharegate_domain::{GrantRecord, Identity, ResourceRef};
use tokio::sync::RwLock;

/// In-memory grant store.
///
/// A change set is applied under one write lock, so readers observe it
/// entirely or not at all.
#[derive(Debug, Default)]
pub struct InMemoryGrantRepository {
    records: RwLock<BTreeSet<GrantRecord>>,
}

impl InMemoryGrantRepository {
    /// Creates an empty grant store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns whether no records are stored.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl GrantRepository for InMemoryGrantRepository {
    async fn list_for_resource(&self, resource: &ResourceRef) -> AppResult<Vec<GrantRecord>> {
        let records = self.records.read().await;

        Ok(records
            .iter()
            .filter(|record| record.resource() == resource)
            .cloned()
            .collect())
    }

    async fn list_for_identity(&self, identity: &Identity) -> AppResult<Vec<GrantRecord>> {
        let records = self.records.read().await;

        Ok(records
            .iter()
            .filter(|record| record.identity() == identity)
            .cloned()
            .collect())
    }

    async fn apply_changes(&self, changes: GrantChangeSet) -> AppResult<()> {
        let mut records = self.records.write().await;

        for change in changes {
            match change {
                GrantChange::Insert(record) => {
                    records.insert(record);
                }
                GrantChange::Delete(filter) => records.retain(|record| !filter.matches(record)),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use sharegate_application::{GrantChange, GrantChangeSet, GrantRepository};
    use sharegate_domain::{
        GrantFilter, GrantRecord, Identity, PermissionKind, ResourceRef, ResourceType, UserId,
    };

    use super::InMemoryGrantRepository;

    fn survey(id: &str) -> ResourceRef {
        ResourceRef::new(ResourceType::Survey, id).unwrap_or_else(|_| unreachable!())
    }

    #[tokio::test]
    async fn change_set_applies_in_order() {
        let repository = InMemoryGrantRepository::new();
        let identity = Identity::User(UserId::new());
        let view = PermissionKind::from_static("view");

        let mut changes = GrantChangeSet::new();
        changes.push(GrantChange::Insert(GrantRecord::inherited_grant(
            identity.clone(),
            survey("s1"),
            view.clone(),
        )));
        changes.push(GrantChange::Delete(GrantFilter::inherited(survey("s1"))));
        changes.push(GrantChange::Insert(GrantRecord::explicit(
            identity.clone(),
            survey("s1"),
            view.clone(),
            false,
        )));
        changes.push(GrantChange::Insert(GrantRecord::explicit(
            Identity::Anonymous,
            survey("s2"),
            view,
            false,
        )));

        let applied = repository.apply_changes(changes).await;
        assert!(applied.is_ok());

        let s1 = repository
            .list_for_resource(&survey("s1"))
            .await
            .unwrap_or_default();
        assert_eq!(s1.len(), 1);
        assert!(s1.iter().all(|record| !record.is_inherited()));

        let for_identity = repository
            .list_for_identity(&identity)
            .await
            .unwrap_or_default();
        assert_eq!(for_identity.len(), 1);
        assert_eq!(repository.len().await, 2);
    }

    #[tokio::test]
    async fn duplicate_insert_is_ignored() {
        let repository = InMemoryGrantRepository::new();
        let record = GrantRecord::explicit(
            Identity::Anonymous,
            survey("s1"),
            PermissionKind::from_static("view"),
            false,
        );

        let mut changes = GrantChangeSet::new();
        changes.push(GrantChange::Insert(record.clone()));
        changes.push(GrantChange::Insert(record));

        assert!(repository.apply_changes(changes).await.is_ok());
        assert_eq!(repository.len().await, 1);
    }
}
