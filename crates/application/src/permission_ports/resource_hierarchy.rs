use std::collections::VecDeque;

use async_trait::async_trait;
use sharegate_core::AppResult;
use sharegate_domain::{Resource, ResourceRef};

/// Read-only view of the host's resource tree.
///
/// Errors returned here reach callers of the engine unchanged.
#[async_trait]
pub trait ResourceHierarchy: Send + Sync {
    /// Loads owner, parent and policy flags of a resource.
    async fn find_resource(&self, resource: &ResourceRef) -> AppResult<Resource>;

    /// Lists direct children of a resource.
    async fn children(&self, resource: &ResourceRef) -> AppResult<Vec<ResourceRef>>;

    /// Lists every transitive descendant, breadth-first, so each resource
    /// comes after its parent.
    async fn descendants(&self, resource: &ResourceRef) -> AppResult<Vec<ResourceRef>> {
        let mut descendants = Vec::new();
        let mut pending = VecDeque::from(self.children(resource).await?);

        while let Some(next) = pending.pop_front() {
            pending.extend(self.children(&next).await?);
            descendants.push(next);
        }

        Ok(descendants)
    }
}
