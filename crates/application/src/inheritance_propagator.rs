use std::sync::Arc;

use sharegate_core::AppResult;
use sharegate_domain::{GrantFilter, GrantRecord, PermissionCatalog, Resource, ResourceRef};
use tracing::debug;

use crate::permission_engine::effective::{EffectiveQuery, effective_grants};
use crate::permission_engine::workspace::GrantWorkspace;
use crate::{IdentityResolver, ResourceHierarchy};

/// Keeps inherited records a regenerated copy of each parent's stored
/// effective grants, down the whole resource tree.
#[derive(Clone)]
pub(crate) struct InheritancePropagator {
    catalog: Arc<PermissionCatalog>,
    identity_resolver: Arc<IdentityResolver>,
    hierarchy: Arc<dyn ResourceHierarchy>,
}

impl InheritancePropagator {
    pub(crate) fn new(
        catalog: Arc<PermissionCatalog>,
        identity_resolver: Arc<IdentityResolver>,
        hierarchy: Arc<dyn ResourceHierarchy>,
    ) -> Self {
        Self {
            catalog,
            identity_resolver,
            hierarchy,
        }
    }

    /// Recalculates `resource` and then its descendants. Returns the number
    /// of resources visited.
    pub(crate) async fn recalculate_subtree(
        &self,
        workspace: &mut GrantWorkspace,
        resource: &Resource,
    ) -> AppResult<usize> {
        self.recalculate_resource(workspace, resource).await?;
        let descendants = self
            .recalculate_descendants(workspace, resource.resource_ref())
            .await?;

        Ok(descendants + 1)
    }

    /// Recalculates every descendant of `resource`, parents before children.
    pub(crate) async fn recalculate_descendants(
        &self,
        workspace: &mut GrantWorkspace,
        resource: &ResourceRef,
    ) -> AppResult<usize> {
        let descendants = self.hierarchy.descendants(resource).await?;

        for descendant in &descendants {
            let descendant = self.hierarchy.find_resource(descendant).await?;
            self.recalculate_resource(workspace, &descendant).await?;
        }

        Ok(descendants.len())
    }

    /// Regenerates the inherited records of one resource from its parent's
    /// current workspace state and from its owner.
    async fn recalculate_resource(
        &self,
        workspace: &mut GrantWorkspace,
        resource: &Resource,
    ) -> AppResult<()> {
        let resource_ref = resource.resource_ref();
        let permissions = self.catalog.for_type(resource.resource_type())?;

        workspace.load(resource_ref).await?;
        let removed = workspace.delete_matching(GrantFilter::inherited(resource_ref.clone()))?;
        let mut inserted = 0_usize;

        if let Some(parent_ref) = resource.parent() {
            let parent = self.hierarchy.find_resource(parent_ref).await?;
            let parent_permissions = self.catalog.for_type(parent.resource_type())?;
            self.catalog
                .ensure_parent_mapping(resource.resource_type(), parent.resource_type())?;
            workspace.load(parent_ref).await?;

            let parent_grants = effective_grants(
                &parent,
                parent_permissions,
                workspace.records(parent_ref)?,
                EffectiveQuery::stored_only(),
            );

            for (identity, parent_permission) in parent_grants {
                let Some(permission) = self.catalog.mapped_parent_permission(
                    resource.resource_type(),
                    parent.resource_type(),
                    &parent_permission,
                )?
                else {
                    continue;
                };

                if !permissions.is_assignable(&permission)
                    || !self.identity_resolver.permits(&identity, &permission)
                {
                    continue;
                }

                if workspace.insert(GrantRecord::inherited_grant(
                    identity,
                    resource_ref.clone(),
                    permission,
                ))? {
                    inserted += 1;
                }
            }
        }

        if let Some(owner) = resource.owner() {
            for permission in permissions.assignable_permissions() {
                if !self.identity_resolver.permits(owner, permission) {
                    continue;
                }

                if workspace.insert(GrantRecord::inherited_grant(
                    owner.clone(),
                    resource_ref.clone(),
                    permission.clone(),
                ))? {
                    inserted += 1;
                }
            }
        }

        debug!(
            resource = %resource_ref,
            removed,
            inserted,
            "regenerated inherited records"
        );

        Ok(())
    }
}
