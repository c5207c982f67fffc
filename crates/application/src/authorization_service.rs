use std::collections::BTreeSet;

use sharegate_core::{AppError, AppResult, Principal};
use sharegate_domain::{PermissionKind, ResourceRef, Subject};

use crate::{IdentitiesWithPermission, PermissionEngine, PermissionResolution};

#[cfg(test)]
mod tests;

/// Authorization entry point for request handlers.
///
/// Resolves authentication principals into subjects and answers
/// object-level access decisions through the permission engine.
#[derive(Clone)]
pub struct AuthorizationService {
    engine: PermissionEngine,
}

impl AuthorizationService {
    /// Creates a new authorization service over the permission engine.
    #[must_use]
    pub fn new(engine: PermissionEngine) -> Self {
        Self { engine }
    }

    /// Returns the subject a principal is checked as.
    #[must_use]
    pub fn resolve_subject(&self, principal: &Principal) -> Subject {
        self.engine.identity_resolver().resolve(principal)
    }

    /// Returns whether the principal currently has the permission.
    pub async fn has_permission(
        &self,
        principal: &Principal,
        resource: &ResourceRef,
        permission: &PermissionKind,
    ) -> AppResult<bool> {
        let subject = self.resolve_subject(principal);
        self.engine
            .has_permission(resource, &subject, permission)
            .await
    }

    /// Ensures the principal has the permission on the resource.
    pub async fn require_permission(
        &self,
        principal: &Principal,
        resource: &ResourceRef,
        permission: &PermissionKind,
    ) -> AppResult<()> {
        let subject = self.resolve_subject(principal);
        match self
            .engine
            .resolve_permission(resource, &subject, permission)
            .await?
        {
            PermissionResolution::Superuser
            | PermissionResolution::Granted
            | PermissionResolution::Public => Ok(()),
            PermissionResolution::Missing => Err(AppError::Forbidden(format!(
                "'{}' is missing permission '{permission}' on '{resource}'",
                subject.identity()
            ))),
        }
    }

    /// Returns every permission the principal's own identity holds on the
    /// resource.
    pub async fn get_all_permissions(
        &self,
        principal: &Principal,
        resource: &ResourceRef,
    ) -> AppResult<BTreeSet<PermissionKind>> {
        let subject = self.resolve_subject(principal);
        self.engine
            .get_permissions(resource, subject.identity())
            .await
    }

    /// Group grants do not exist in this engine, so this is always empty.
    #[must_use]
    pub fn get_group_permissions(
        &self,
        _principal: &Principal,
        _resource: &ResourceRef,
    ) -> BTreeSet<PermissionKind> {
        BTreeSet::new()
    }

    /// Lists resources the principal may access with the permission.
    pub async fn resources_with_permission(
        &self,
        principal: &Principal,
        permission: &PermissionKind,
    ) -> AppResult<Vec<ResourceRef>> {
        let subject = self.resolve_subject(principal);
        self.engine
            .resources_with_permission(&subject, permission)
            .await
    }

    /// Lists identities sharing the resource.
    pub async fn get_identities_with_permission(
        &self,
        resource: &ResourceRef,
        attach_permissions: bool,
    ) -> AppResult<IdentitiesWithPermission> {
        self.engine
            .get_identities_with_permission(resource, attach_permissions)
            .await
    }
}
