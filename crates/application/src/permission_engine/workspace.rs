use std::collections::HashMap;
use std::sync::Arc;

use sharegate_core::{AppError, AppResult};
use sharegate_domain::{GrantFilter, GrantRecord, ResourceRef};

use crate::{GrantChange, GrantChangeSet, GrantRepository};

/// Unit of work for one mutation and its cascade.
///
/// Records are read once per resource, mutated in memory, and written back
/// as a single change set on commit. Nothing reaches the repository when the
/// workspace is dropped without committing.
pub(crate) struct GrantWorkspace {
    repository: Arc<dyn GrantRepository>,
    records: HashMap<ResourceRef, Vec<GrantRecord>>,
    changes: GrantChangeSet,
}

impl GrantWorkspace {
    pub(crate) fn new(repository: Arc<dyn GrantRepository>) -> Self {
        Self {
            repository,
            records: HashMap::new(),
            changes: GrantChangeSet::new(),
        }
    }

    pub(crate) async fn load(&mut self, resource: &ResourceRef) -> AppResult<()> {
        if !self.records.contains_key(resource) {
            let records = self.repository.list_for_resource(resource).await?;
            self.records.insert(resource.clone(), records);
        }

        Ok(())
    }

    pub(crate) fn records(&self, resource: &ResourceRef) -> AppResult<&[GrantRecord]> {
        self.records
            .get(resource)
            .map(Vec::as_slice)
            .ok_or_else(|| not_loaded(resource))
    }

    /// Inserts a record unless the exact key is already present.
    pub(crate) fn insert(&mut self, record: GrantRecord) -> AppResult<bool> {
        let records = self
            .records
            .get_mut(record.resource())
            .ok_or_else(|| not_loaded(record.resource()))?;

        if records.contains(&record) {
            return Ok(false);
        }

        records.push(record.clone());
        self.changes.push(GrantChange::Insert(record));
        Ok(true)
    }

    pub(crate) fn delete_matching(&mut self, filter: GrantFilter) -> AppResult<usize> {
        let records = self
            .records
            .get_mut(&filter.resource)
            .ok_or_else(|| not_loaded(&filter.resource))?;

        let before = records.len();
        records.retain(|record| !filter.matches(record));
        let removed = before - records.len();

        if removed > 0 {
            self.changes.push(GrantChange::Delete(filter));
        }

        Ok(removed)
    }

    /// Applies every pending write atomically and returns their count.
    pub(crate) async fn commit(self) -> AppResult<usize> {
        if self.changes.is_empty() {
            return Ok(0);
        }

        let count = self.changes.len();
        self.repository.apply_changes(self.changes).await?;
        Ok(count)
    }
}

fn not_loaded(resource: &ResourceRef) -> AppError {
    AppError::Internal(format!(
        "grant records of '{resource}' were not loaded into the workspace"
    ))
}
