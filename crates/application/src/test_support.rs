use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use sharegate_core::{AppError, AppResult};
use sharegate_domain::{
    GrantRecord, Identity, PermissionKind, Resource, ResourceRef, ResourceType, UserId,
};
use tokio::sync::Mutex;

use crate::{
    AuditEvent, AuditRepository, GrantChange, GrantChangeSet, GrantRepository, PermissionEngine,
    PermissionEngineConfig, ResourceHierarchy,
};

#[derive(Default)]
pub(crate) struct FakeGrantRepository {
    pub(crate) records: Mutex<BTreeSet<GrantRecord>>,
    pub(crate) applied_batches: Mutex<usize>,
    pub(crate) fail_next_batch: AtomicBool,
}

impl FakeGrantRepository {
    pub(crate) async fn snapshot(&self) -> BTreeSet<GrantRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl GrantRepository for FakeGrantRepository {
    async fn list_for_resource(&self, resource: &ResourceRef) -> AppResult<Vec<GrantRecord>> {
        Ok(self
            .records
            .lock()
            .await
            .iter()
            .filter(|record| record.resource() == resource)
            .cloned()
            .collect())
    }

    async fn list_for_identity(&self, identity: &Identity) -> AppResult<Vec<GrantRecord>> {
        Ok(self
            .records
            .lock()
            .await
            .iter()
            .filter(|record| record.identity() == identity)
            .cloned()
            .collect())
    }

    async fn apply_changes(&self, changes: GrantChangeSet) -> AppResult<()> {
        if self.fail_next_batch.swap(false, Ordering::SeqCst) {
            return Err(AppError::Internal("grant store unavailable".to_owned()));
        }

        let mut records = self.records.lock().await;
        let mut staged = records.clone();
        for change in changes {
            match change {
                GrantChange::Insert(record) => {
                    staged.insert(record);
                }
                GrantChange::Delete(filter) => staged.retain(|record| !filter.matches(record)),
            }
        }

        *records = staged;
        *self.applied_batches.lock().await += 1;
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeResourceHierarchy {
    resources: Mutex<BTreeMap<ResourceRef, Resource>>,
}

impl FakeResourceHierarchy {
    pub(crate) async fn save(&self, resource: Resource) {
        self.resources
            .lock()
            .await
            .insert(resource.resource_ref().clone(), resource);
    }
}

#[async_trait]
impl ResourceHierarchy for FakeResourceHierarchy {
    async fn find_resource(&self, resource: &ResourceRef) -> AppResult<Resource> {
        self.resources
            .lock()
            .await
            .get(resource)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("resource '{resource}' does not exist")))
    }

    async fn children(&self, resource: &ResourceRef) -> AppResult<Vec<ResourceRef>> {
        Ok(self
            .resources
            .lock()
            .await
            .values()
            .filter(|candidate| candidate.parent() == Some(resource))
            .map(|candidate| candidate.resource_ref().clone())
            .collect())
    }
}

#[derive(Default)]
pub(crate) struct FakeAuditRepository {
    pub(crate) events: Mutex<Vec<AuditEvent>>,
    pub(crate) fail_next_append: AtomicBool,
}

#[async_trait]
impl AuditRepository for FakeAuditRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        if self.fail_next_append.swap(false, Ordering::SeqCst) {
            return Err(AppError::Internal("audit log unavailable".to_owned()));
        }

        self.events.lock().await.push(event);
        Ok(())
    }
}

pub(crate) struct Fixture {
    pub(crate) engine: PermissionEngine,
    pub(crate) grants: Arc<FakeGrantRepository>,
    pub(crate) hierarchy: Arc<FakeResourceHierarchy>,
    pub(crate) audit: Arc<FakeAuditRepository>,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        Self::with_config(PermissionEngineConfig::default())
    }

    pub(crate) fn with_config(config: PermissionEngineConfig) -> Self {
        let grants = Arc::new(FakeGrantRepository::default());
        let hierarchy = Arc::new(FakeResourceHierarchy::default());
        let audit = Arc::new(FakeAuditRepository::default());
        let engine =
            PermissionEngine::from_config(config, grants.clone(), hierarchy.clone(), audit.clone())
                .unwrap_or_else(|_| unreachable!());

        Self {
            engine,
            grants,
            hierarchy,
            audit,
        }
    }

    /// Saves the resource and lets the engine derive its inherited records.
    pub(crate) async fn create(&self, resource: Resource) -> ResourceRef {
        let resource_ref = resource.resource_ref().clone();
        self.hierarchy.save(resource).await;
        self.engine
            .recalculate_inherited_permissions(&resource_ref)
            .await
            .unwrap_or_else(|_| unreachable!());
        resource_ref
    }
}

pub(crate) fn permission(name: &'static str) -> PermissionKind {
    PermissionKind::from_static(name)
}

pub(crate) fn survey(id: &str) -> ResourceRef {
    ResourceRef::new(ResourceType::Survey, id).unwrap_or_else(|_| unreachable!())
}

pub(crate) fn collection(id: &str) -> ResourceRef {
    ResourceRef::new(ResourceType::Collection, id).unwrap_or_else(|_| unreachable!())
}

pub(crate) fn user() -> Identity {
    Identity::User(UserId::new())
}
