use std::collections::BTreeMap;

use async_trait::async_trait;
use sharegate_application::ResourceHierarchy;
use sharegate_core::{AppError, AppResult};
use sharegate_domain::{Resource, ResourceRef};
use tokio::sync::RwLock;

/// In-memory resource tree.
#[derive(Debug, Default)]
pub struct InMemoryResourceHierarchy {
    resources: RwLock<BTreeMap<ResourceRef, Resource>>,
}

impl InMemoryResourceHierarchy {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or replaces a resource.
    ///
    /// The parent must already exist and must not be the resource itself or
    /// one of its descendants.
    pub async fn save_resource(&self, resource: &Resource) -> AppResult<()> {
        let mut resources = self.resources.write().await;

        let mut ancestor = resource.parent().cloned();
        while let Some(current) = ancestor {
            if &current == resource.resource_ref() {
                return Err(AppError::Validation(format!(
                    "resource '{}' cannot be moved below its own descendant",
                    resource.resource_ref()
                )));
            }

            let stored = resources.get(&current).ok_or_else(|| {
                AppError::NotFound(format!("parent resource '{current}' does not exist"))
            })?;
            ancestor = stored.parent().cloned();
        }

        resources.insert(resource.resource_ref().clone(), resource.clone());
        Ok(())
    }
}

#[async_trait]
impl ResourceHierarchy for InMemoryResourceHierarchy {
    async fn find_resource(&self, resource: &ResourceRef) -> AppResult<Resource> {
        self.resources
            .read()
            .await
            .get(resource)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("resource '{resource}' does not exist")))
    }

    async fn children(&self, resource: &ResourceRef) -> AppResult<Vec<ResourceRef>> {
        let resources = self.resources.read().await;

        Ok(resources
            .values()
            .filter(|candidate| candidate.parent() == Some(resource))
            .map(|candidate| candidate.resource_ref().clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use sharegate_application::ResourceHierarchy;
    use sharegate_core::AppError;
    use sharegate_domain::{Resource, ResourceRef, ResourceType};

    use super::InMemoryResourceHierarchy;

    fn collection(id: &str) -> ResourceRef {
        ResourceRef::new(ResourceType::Collection, id).unwrap_or_else(|_| unreachable!())
    }

    fn child(id: &str, parent: &str) -> Resource {
        Resource::new(collection(id))
            .with_parent(collection(parent))
            .unwrap_or_else(|_| unreachable!())
    }

    #[tokio::test]
    async fn descendants_are_listed_parents_first() {
        let hierarchy = InMemoryResourceHierarchy::new();
        for resource in [
            Resource::new(collection("root")),
            child("a", "root"),
            child("b", "root"),
            child("a1", "a"),
        ] {
            assert!(hierarchy.save_resource(&resource).await.is_ok());
        }

        let descendants = hierarchy
            .descendants(&collection("root"))
            .await
            .unwrap_or_default();

        assert_eq!(
            descendants,
            vec![collection("a"), collection("b"), collection("a1")]
        );
    }

    #[tokio::test]
    async fn moving_below_own_descendant_is_rejected() {
        let hierarchy = InMemoryResourceHierarchy::new();
        assert!(
            hierarchy
                .save_resource(&Resource::new(collection("root")))
                .await
                .is_ok()
        );
        assert!(hierarchy.save_resource(&child("a", "root")).await.is_ok());

        let result = hierarchy.save_resource(&child("root", "a")).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn unknown_parent_and_resource_are_not_found() {
        let hierarchy = InMemoryResourceHierarchy::new();

        let saved = hierarchy.save_resource(&child("a", "missing")).await;
        let found = hierarchy.find_resource(&collection("a")).await;

        assert!(matches!(saved, Err(AppError::NotFound(_))));
        assert!(matches!(found, Err(AppError::NotFound(_))));
    }
}
