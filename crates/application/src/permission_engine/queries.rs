use std::collections::BTreeMap;

use sharegate_domain::Subject;

use super::*;

/// Outcome of one object-level permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionResolution {
    /// Superusers bypass object-level checks.
    Superuser,
    /// The subject's own identity holds the permission.
    Granted,
    /// The resource is shared publicly with the anonymous identity.
    Public,
    /// Nothing grants the permission.
    Missing,
}

impl PermissionResolution {
    /// Returns whether access is allowed.
    #[must_use]
    pub fn is_granted(self) -> bool {
        !matches!(self, Self::Missing)
    }
}

/// Identities holding at least one effective permission on a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentitiesWithPermission {
    /// Identities only.
    Identities(BTreeSet<Identity>),
    /// Identities with their effective permissions, sorted by name.
    WithPermissions(BTreeMap<Identity, Vec<PermissionKind>>),
}

impl IdentitiesWithPermission {
    /// Returns the identities regardless of the attached permissions.
    #[must_use]
    pub fn identities(&self) -> BTreeSet<Identity> {
        match self {
            Self::Identities(identities) => identities.clone(),
            Self::WithPermissions(map) => map.keys().cloned().collect(),
        }
    }
}

impl PermissionEngine {
    /// Returns whether `subject` holds `permission` on `resource`.
    pub async fn has_permission(
        &self,
        resource: &ResourceRef,
        subject: &Subject,
        permission: &PermissionKind,
    ) -> AppResult<bool> {
        Ok(self
            .resolve_permission(resource, subject, permission)
            .await?
            .is_granted())
    }

    /// Resolves how, if at all, `subject` holds `permission` on `resource`.
    ///
    /// Superusers are granted without reading the store. Anyone else falls
    /// back to what the anonymous identity holds, and the anonymous
    /// identity never holds a permission outside its allow-list.
    pub async fn resolve_permission(
        &self,
        resource: &ResourceRef,
        subject: &Subject,
        permission: &PermissionKind,
    ) -> AppResult<PermissionResolution> {
        if subject.is_superuser() {
            return Ok(PermissionResolution::Superuser);
        }

        let resource = self.resource_hierarchy.find_resource(resource).await?;
        let permissions = self
            .catalog
            .for_type(resource.resource_type())
            .inspect_err(log_configuration_error)?;
        let records = self
            .grant_repository
            .list_for_resource(resource.resource_ref())
            .await?;

        let holds = |identity: &Identity| {
            self.identity_resolver.permits(identity, permission)
                && !effective_grants(
                    &resource,
                    permissions,
                    &records,
                    EffectiveQuery::for_permission(identity, permission),
                )
                .is_empty()
        };

        let resolution = if holds(subject.identity()) {
            PermissionResolution::Granted
        } else if !subject.is_anonymous() && holds(&Identity::Anonymous) {
            PermissionResolution::Public
        } else {
            PermissionResolution::Missing
        };

        Ok(resolution)
    }

    /// Returns every permission `identity` effectively holds on `resource`.
    ///
    /// Superuser status and public sharing are not considered.
    pub async fn get_permissions(
        &self,
        resource: &ResourceRef,
        identity: &Identity,
    ) -> AppResult<BTreeSet<PermissionKind>> {
        let resource = self.resource_hierarchy.find_resource(resource).await?;
        let permissions = self
            .catalog
            .for_type(resource.resource_type())
            .inspect_err(log_configuration_error)?;
        let records = self
            .grant_repository
            .list_for_resource(resource.resource_ref())
            .await?;

        Ok(self.effective_permissions_of(&resource, permissions, &records, identity))
    }

    /// Lists identities holding at least one effective permission on
    /// `resource`, optionally with those permissions attached.
    pub async fn get_identities_with_permission(
        &self,
        resource: &ResourceRef,
        attach_permissions: bool,
    ) -> AppResult<IdentitiesWithPermission> {
        let resource = self.resource_hierarchy.find_resource(resource).await?;
        let permissions = self
            .catalog
            .for_type(resource.resource_type())
            .inspect_err(log_configuration_error)?;
        let records = self
            .grant_repository
            .list_for_resource(resource.resource_ref())
            .await?;
        let known = permissions.all_permissions();

        let mut holders: BTreeMap<Identity, Vec<PermissionKind>> = BTreeMap::new();
        for (identity, permission) in
            effective_grants(&resource, permissions, &records, EffectiveQuery::all())
        {
            if known.contains(&permission) && self.identity_resolver.permits(&identity, &permission)
            {
                holders.entry(identity).or_default().push(permission);
            }
        }

        if attach_permissions {
            return Ok(IdentitiesWithPermission::WithPermissions(holders));
        }

        Ok(IdentitiesWithPermission::Identities(
            holders.into_keys().collect(),
        ))
    }

    /// Lists resources on which `subject` holds `permission`.
    ///
    /// Candidates are the resources with stored records for the subject's
    /// identity or for the anonymous identity, so public shares are
    /// included.
    pub async fn resources_with_permission(
        &self,
        subject: &Subject,
        permission: &PermissionKind,
    ) -> AppResult<Vec<ResourceRef>> {
        let mut candidates: BTreeSet<ResourceRef> = self
            .grant_repository
            .list_for_identity(subject.identity())
            .await?
            .into_iter()
            .map(|record| record.resource().clone())
            .collect();

        if !subject.is_anonymous() {
            candidates.extend(
                self.grant_repository
                    .list_for_identity(&Identity::Anonymous)
                    .await?
                    .into_iter()
                    .map(|record| record.resource().clone()),
            );
        }

        let mut resources = Vec::new();
        for candidate in candidates {
            if self
                .resolve_permission(&candidate, subject, permission)
                .await?
                .is_granted()
            {
                resources.push(candidate);
            }
        }

        Ok(resources)
    }
}
