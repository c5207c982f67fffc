use async_trait::async_trait;
use sharegate_core::AppResult;
use sharegate_domain::{GrantFilter, GrantRecord, Identity, ResourceRef};

/// One write against the grant store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantChange {
    /// Inserts a record. Inserting an existing key is a no-op.
    Insert(GrantRecord),
    /// Deletes every record matching the filter.
    Delete(GrantFilter),
}

/// Ordered batch of grant writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantChangeSet {
    changes: Vec<GrantChange>,
}

impl GrantChangeSet {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one write.
    pub fn push(&mut self, change: GrantChange) {
        self.changes.push(change);
    }

    /// Returns whether the batch holds no writes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Returns the number of writes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Iterates writes in application order.
    pub fn iter(&self) -> impl Iterator<Item = &GrantChange> {
        self.changes.iter()
    }
}

impl IntoIterator for GrantChangeSet {
    type Item = GrantChange;
    type IntoIter = std::vec::IntoIter<GrantChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

/// Repository port for the grant record table.
#[async_trait]
pub trait GrantRepository: Send + Sync {
    /// Lists every record stored for a resource, explicit and inherited.
    async fn list_for_resource(&self, resource: &ResourceRef) -> AppResult<Vec<GrantRecord>>;

    /// Lists every record held by an identity across all resources.
    async fn list_for_identity(&self, identity: &Identity) -> AppResult<Vec<GrantRecord>>;

    /// Applies the batch in order as one atomic unit.
    ///
    /// Readers must observe either none or all of the batch. A failed batch
    /// leaves the store unchanged.
    async fn apply_changes(&self, changes: GrantChangeSet) -> AppResult<()>;
}
