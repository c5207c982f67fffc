use std::collections::BTreeSet;
use std::sync::Arc;

use sharegate_core::{AppError, AppResult};
use sharegate_domain::{
    AuditAction, GrantRecord, Identity, PermissionCatalog, PermissionKind, Resource, ResourceRef,
    ResourceTypePermissions,
};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::inheritance_propagator::InheritancePropagator;
use crate::{
    AuditEvent, AuditRepository, GrantRepository, IdentityResolver, PermissionEngineConfig,
    ResourceHierarchy,
};

use effective::{EffectiveQuery, effective_grants};
use workspace::GrantWorkspace;

pub(crate) mod effective;
mod mutations;
mod queries;
pub(crate) mod workspace;


pub use mutations::Recalculation;
pub use queries::{IdentitiesWithPermission, PermissionResolution};

/// Object-level permission engine.
///
/// Mutations are serialized through a write gate and each one, cascade
/// included, reaches the grant repository as a single atomic change set.
/// Reads take no lock: they observe one bulk read per resource.
///
/// The audit event is appended before the change set is committed. A failed
/// append leaves the grant store untouched, while a failed commit may leave
/// an event describing a change that never landed.
#[derive(Clone)]
pub struct PermissionEngine {
    catalog: Arc<PermissionCatalog>,
    identity_resolver: Arc<IdentityResolver>,
    grant_repository: Arc<dyn GrantRepository>,
    resource_hierarchy: Arc<dyn ResourceHierarchy>,
    audit_repository: Arc<dyn AuditRepository>,
    propagator: InheritancePropagator,
    write_gate: Arc<Mutex<()>>,
}

impl PermissionEngine {
    /// Creates an engine from its collaborators.
    #[must_use]
    pub fn new(
        catalog: Arc<PermissionCatalog>,
        identity_resolver: Arc<IdentityResolver>,
        grant_repository: Arc<dyn GrantRepository>,
        resource_hierarchy: Arc<dyn ResourceHierarchy>,
        audit_repository: Arc<dyn AuditRepository>,
    ) -> Self {
        let propagator = InheritancePropagator::new(
            catalog.clone(),
            identity_resolver.clone(),
            resource_hierarchy.clone(),
        );

        Self {
            catalog,
            identity_resolver,
            grant_repository,
            resource_hierarchy,
            audit_repository,
            propagator,
            write_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Validates the configuration and creates an engine from it.
    pub fn from_config(
        config: PermissionEngineConfig,
        grant_repository: Arc<dyn GrantRepository>,
        resource_hierarchy: Arc<dyn ResourceHierarchy>,
        audit_repository: Arc<dyn AuditRepository>,
    ) -> AppResult<Self> {
        config.validate()?;
        let identity_resolver = Arc::new(IdentityResolver::from_config(&config));

        Ok(Self::new(
            Arc::new(config.catalog),
            identity_resolver,
            grant_repository,
            resource_hierarchy,
            audit_repository,
        ))
    }

    /// Returns the permission catalog.
    #[must_use]
    pub fn catalog(&self) -> &PermissionCatalog {
        self.catalog.as_ref()
    }

    /// Returns the identity resolver sharing this engine's allow-list.
    #[must_use]
    pub fn identity_resolver(&self) -> &IdentityResolver {
        self.identity_resolver.as_ref()
    }

    /// Regenerates the inherited records of `resource` and of every
    /// descendant.
    ///
    /// Hosts call this after creating a resource or after changing its
    /// parent or owner, and after mutations made with
    /// [`Recalculation::Deferred`].
    pub async fn recalculate_inherited_permissions(&self, resource: &ResourceRef) -> AppResult<()> {
        let _guard = self.write_gate.lock().await;
        let mut workspace = GrantWorkspace::new(self.grant_repository.clone());

        let resource = self.resource_hierarchy.find_resource(resource).await?;
        let recalculated = self
            .propagator
            .recalculate_subtree(&mut workspace, &resource)
            .await
            .inspect_err(log_configuration_error)?;
        let writes = workspace.commit().await?;

        debug!(
            resource = %resource.resource_ref(),
            recalculated,
            writes,
            "recalculated inherited permissions"
        );

        Ok(())
    }

    fn assignable_permissions(
        &self,
        resource: &ResourceRef,
        permission: &PermissionKind,
    ) -> AppResult<&ResourceTypePermissions> {
        let permissions = self
            .catalog
            .for_type(resource.resource_type())
            .inspect_err(log_configuration_error)?;

        if !permissions.is_assignable(permission) {
            return Err(AppError::NotAssignable(format!(
                "permission '{permission}' cannot be assigned on '{}' resources",
                resource.resource_type()
            )));
        }

        Ok(permissions)
    }

    fn ensure_anonymous_allowed(
        &self,
        identity: &Identity,
        permission: &PermissionKind,
    ) -> AppResult<()> {
        if self.identity_resolver.permits(identity, permission) {
            return Ok(());
        }

        warn!(%permission, "rejected permission outside the anonymous allow-list");
        Err(AppError::AnonymousNotAllowed(format!(
            "permission '{permission}' is not in the anonymous allow-list"
        )))
    }

    async fn append_audit_event(
        &self,
        action: AuditAction,
        resource: &Resource,
        identity: Option<&Identity>,
        permission: Option<&PermissionKind>,
        detail: Option<String>,
    ) -> AppResult<()> {
        self.audit_repository
            .append_event(AuditEvent {
                action,
                resource: resource.resource_ref().clone(),
                identity: identity.cloned(),
                permission: permission.cloned(),
                detail,
            })
            .await
    }

    fn effective_permissions_of(
        &self,
        resource: &Resource,
        permissions: &ResourceTypePermissions,
        records: &[GrantRecord],
        identity: &Identity,
    ) -> BTreeSet<PermissionKind> {
        let known = permissions.all_permissions();

        effective_grants(
            resource,
            permissions,
            records,
            EffectiveQuery::for_identity(identity),
        )
        .into_iter()
        .map(|(_, permission)| permission)
        .filter(|permission| {
            known.contains(permission) && self.identity_resolver.permits(identity, permission)
        })
        .collect()
    }
}

fn log_configuration_error(error: &AppError) {
    if let AppError::Configuration(message) = error {
        error!(%message, "permission catalog cannot resolve inheritance");
    }
}
