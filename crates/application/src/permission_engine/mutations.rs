use tracing::info;

use sharegate_domain::GrantFilter;

use super::*;

/// Whether a mutation cascades into the descendants of its resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recalculation {
    /// Regenerate inherited records of every descendant before committing.
    Descendants,
    /// Leave descendants untouched. The caller recalculates later through
    /// [`PermissionEngine::recalculate_inherited_permissions`].
    Deferred,
}

/// Source of one assignment step inside a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AssignmentOrigin {
    /// Requested by the engine's caller. Allow-list violations fail.
    Caller,
    /// Produced by an implication rule. Allow-list violations are skipped.
    Implied,
}

/// Resource and configuration shared by every step of one mutation.
#[derive(Clone, Copy)]
struct MutationScope<'a> {
    resource: &'a ResourceRef,
    permissions: &'a ResourceTypePermissions,
    identity_resolver: &'a IdentityResolver,
}

impl PermissionEngine {
    /// Grants or denies `permission` to `identity` and cascades the change
    /// to descendants.
    pub async fn assign_permission(
        &self,
        resource: &ResourceRef,
        identity: &Identity,
        permission: &PermissionKind,
        deny: bool,
    ) -> AppResult<()> {
        self.assign_permission_with(
            resource,
            identity,
            permission,
            deny,
            Recalculation::Descendants,
        )
        .await
    }

    /// Grants or denies `permission` with explicit cascade control.
    ///
    /// The explicit record replaces a contradictory one for the same pair.
    /// Granting also grants every implied permission; denying also denies
    /// every permission implying it. Assigning an existing record changes
    /// nothing and skips the cascade.
    pub async fn assign_permission_with(
        &self,
        resource: &ResourceRef,
        identity: &Identity,
        permission: &PermissionKind,
        deny: bool,
        recalculation: Recalculation,
    ) -> AppResult<()> {
        let permissions = self.assignable_permissions(resource, permission)?;
        self.ensure_anonymous_allowed(identity, permission)?;

        let _guard = self.write_gate.lock().await;
        let target = self.resource_hierarchy.find_resource(resource).await?;
        let mut workspace = GrantWorkspace::new(self.grant_repository.clone());
        workspace.load(resource).await?;

        let scope = MutationScope {
            resource,
            permissions,
            identity_resolver: self.identity_resolver.as_ref(),
        };
        if !apply_assignment(
            &mut workspace,
            scope,
            identity,
            permission,
            deny,
            AssignmentOrigin::Caller,
        )? {
            return Ok(());
        }

        self.cascade(&mut workspace, resource, recalculation).await?;

        let action = if deny {
            AuditAction::PermissionDenied
        } else {
            AuditAction::PermissionGranted
        };
        self.append_audit_event(action, &target, Some(identity), Some(permission), None)
            .await?;
        let writes = workspace.commit().await?;

        info!(
            resource = %resource,
            %identity,
            %permission,
            deny,
            writes,
            "assigned permission"
        );

        Ok(())
    }

    /// Deletes the explicit record for the pair and cascades to descendants.
    /// Removing a record that does not exist is not an error.
    pub async fn remove_permission(
        &self,
        resource: &ResourceRef,
        identity: &Identity,
        permission: &PermissionKind,
        deny: bool,
    ) -> AppResult<()> {
        self.remove_permission_with(
            resource,
            identity,
            permission,
            deny,
            Recalculation::Descendants,
        )
        .await
    }

    /// Deletes the explicit record with explicit cascade control.
    pub async fn remove_permission_with(
        &self,
        resource: &ResourceRef,
        identity: &Identity,
        permission: &PermissionKind,
        deny: bool,
        recalculation: Recalculation,
    ) -> AppResult<()> {
        self.assignable_permissions(resource, permission)?;

        let _guard = self.write_gate.lock().await;
        let target = self.resource_hierarchy.find_resource(resource).await?;
        let mut workspace = GrantWorkspace::new(self.grant_repository.clone());
        workspace.load(resource).await?;

        let removed = workspace.delete_matching(GrantFilter::explicit(
            resource.clone(),
            identity.clone(),
            permission.clone(),
            deny,
        ))?;

        self.cascade(&mut workspace, resource, recalculation).await?;

        if removed == 0 {
            workspace.commit().await?;
            return Ok(());
        }

        self.append_audit_event(
            AuditAction::PermissionRemoved,
            &target,
            Some(identity),
            Some(permission),
            None,
        )
        .await?;
        let writes = workspace.commit().await?;

        info!(
            resource = %resource,
            %identity,
            %permission,
            deny,
            writes,
            "removed permission"
        );

        Ok(())
    }

    /// Takes `permission` away from `identity`, including access it holds
    /// through inheritance.
    ///
    /// Every permission implying `permission` is revoked first. The explicit
    /// grant is deleted, and an explicit deny is recorded when an inherited
    /// grant would otherwise keep the permission effective.
    pub async fn revoke_permission(
        &self,
        resource: &ResourceRef,
        identity: &Identity,
        permission: &PermissionKind,
    ) -> AppResult<()> {
        let permissions = self.assignable_permissions(resource, permission)?;

        let _guard = self.write_gate.lock().await;
        let target = self.resource_hierarchy.find_resource(resource).await?;
        let mut workspace = GrantWorkspace::new(self.grant_repository.clone());
        workspace.load(resource).await?;

        let scope = MutationScope {
            resource,
            permissions,
            identity_resolver: self.identity_resolver.as_ref(),
        };
        apply_revocation(&mut workspace, scope, identity, permission)?;

        self.cascade(&mut workspace, resource, Recalculation::Descendants)
            .await?;

        self.append_audit_event(
            AuditAction::PermissionRevoked,
            &target,
            Some(identity),
            Some(permission),
            None,
        )
        .await?;
        let writes = workspace.commit().await?;

        info!(
            resource = %resource,
            %identity,
            %permission,
            writes,
            "revoked permission"
        );

        Ok(())
    }

    /// Replaces the explicit records of `target` with those of `source`.
    ///
    /// Records of the target's owner are kept. Source records whose
    /// permission is not assignable on the target type, or that the
    /// anonymous allow-list forbids, are skipped.
    pub async fn copy_permissions_from(
        &self,
        source: &ResourceRef,
        target: &ResourceRef,
    ) -> AppResult<()> {
        if source == target {
            return Err(AppError::Validation(format!(
                "cannot copy permissions of '{source}' onto itself"
            )));
        }

        let _guard = self.write_gate.lock().await;
        let target_resource = self.resource_hierarchy.find_resource(target).await?;
        let target_permissions = self
            .catalog
            .for_type(target.resource_type())
            .inspect_err(log_configuration_error)?;

        let mut workspace = GrantWorkspace::new(self.grant_repository.clone());
        workspace.load(source).await?;
        workspace.load(target).await?;

        let owner = target_resource.owner();
        let replaced: BTreeSet<Identity> = workspace
            .records(target)?
            .iter()
            .filter(|record| !record.is_inherited() && Some(record.identity()) != owner)
            .map(|record| record.identity().clone())
            .collect();

        for identity in replaced {
            workspace.delete_matching(GrantFilter {
                identity: Some(identity),
                inherited: Some(false),
                ..GrantFilter::for_resource(target.clone())
            })?;
        }

        let copied: Vec<GrantRecord> = workspace
            .records(source)?
            .iter()
            .filter(|record| {
                !record.is_inherited()
                    && Some(record.identity()) != owner
                    && target_permissions.is_assignable(record.permission())
                    && self
                        .identity_resolver
                        .permits(record.identity(), record.permission())
            })
            .map(|record| {
                GrantRecord::explicit(
                    record.identity().clone(),
                    target.clone(),
                    record.permission().clone(),
                    record.is_deny(),
                )
            })
            .collect();
        let copied_count = copied.len();

        for record in copied {
            workspace.insert(record)?;
        }

        self.cascade(&mut workspace, target, Recalculation::Descendants)
            .await?;

        self.append_audit_event(
            AuditAction::PermissionsCopied,
            &target_resource,
            None,
            None,
            Some(format!("copied {copied_count} explicit records from '{source}'")),
        )
        .await?;
        let writes = workspace.commit().await?;

        info!(
            %source,
            %target,
            copied = copied_count,
            writes,
            "copied permissions"
        );

        Ok(())
    }

    async fn cascade(
        &self,
        workspace: &mut GrantWorkspace,
        resource: &ResourceRef,
        recalculation: Recalculation,
    ) -> AppResult<()> {
        if recalculation == Recalculation::Deferred {
            return Ok(());
        }

        let recalculated = self
            .propagator
            .recalculate_descendants(workspace, resource)
            .await
            .inspect_err(log_configuration_error)?;

        debug!(resource = %resource, recalculated, "cascaded to descendants");
        Ok(())
    }
}

/// Applies one explicit assignment and its implications to the workspace.
///
/// Returns whether anything changed.
fn apply_assignment(
    workspace: &mut GrantWorkspace,
    scope: MutationScope<'_>,
    identity: &Identity,
    permission: &PermissionKind,
    deny: bool,
    origin: AssignmentOrigin,
) -> AppResult<bool> {
    if !scope.identity_resolver.permits(identity, permission) {
        return match origin {
            AssignmentOrigin::Caller => Err(AppError::AnonymousNotAllowed(format!(
                "permission '{permission}' is not in the anonymous allow-list"
            ))),
            AssignmentOrigin::Implied => Ok(false),
        };
    }

    let record = GrantRecord::explicit(
        identity.clone(),
        scope.resource.clone(),
        permission.clone(),
        deny,
    );
    if workspace.records(scope.resource)?.contains(&record) {
        return Ok(false);
    }

    workspace.delete_matching(GrantFilter::explicit(
        scope.resource.clone(),
        identity.clone(),
        permission.clone(),
        !deny,
    ))?;
    workspace.insert(record)?;

    let follow_ups = if deny {
        scope.permissions.reverse_implied_permissions(permission)
    } else {
        scope.permissions.implied_permissions(permission)
    };
    for follow_up in &follow_ups {
        apply_assignment(
            workspace,
            scope,
            identity,
            follow_up,
            deny,
            AssignmentOrigin::Implied,
        )?;
    }

    Ok(true)
}

fn apply_revocation(
    workspace: &mut GrantWorkspace,
    scope: MutationScope<'_>,
    identity: &Identity,
    permission: &PermissionKind,
) -> AppResult<()> {
    for implying in &scope.permissions.reverse_implied_permissions(permission) {
        apply_revocation(workspace, scope, identity, implying)?;
    }

    workspace.delete_matching(GrantFilter::explicit(
        scope.resource.clone(),
        identity.clone(),
        permission.clone(),
        false,
    ))?;

    let still_inherited = workspace.records(scope.resource)?.iter().any(|record| {
        record.is_inherited()
            && !record.is_deny()
            && record.identity() == identity
            && record.permission() == permission
    });
    if still_inherited {
        apply_assignment(
            workspace,
            scope,
            identity,
            permission,
            true,
            AssignmentOrigin::Implied,
        )?;
    }

    Ok(())
}
