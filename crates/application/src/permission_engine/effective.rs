use std::collections::BTreeSet;

use sharegate_domain::{
    CalculatedRule, GrantRecord, Identity, PermissionKind, Resource, ResourceTypePermissions,
};

/// One effective `(identity, permission)` pair.
pub(crate) type GrantPair = (Identity, PermissionKind);

/// Restrictions applied when computing an effective grant set.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EffectiveQuery<'a> {
    pub(crate) identity: Option<&'a Identity>,
    pub(crate) permission: Option<&'a PermissionKind>,
    pub(crate) include_calculated: bool,
}

impl<'a> EffectiveQuery<'a> {
    /// Every identity and permission, calculated rules included.
    pub(crate) fn all() -> Self {
        Self {
            identity: None,
            permission: None,
            include_calculated: true,
        }
    }

    /// Stored grants only, as read by the inheritance propagator.
    pub(crate) fn stored_only() -> Self {
        Self {
            include_calculated: false,
            ..Self::all()
        }
    }

    pub(crate) fn for_identity(identity: &'a Identity) -> Self {
        Self {
            identity: Some(identity),
            ..Self::all()
        }
    }

    pub(crate) fn for_permission(identity: &'a Identity, permission: &'a PermissionKind) -> Self {
        Self {
            identity: Some(identity),
            permission: Some(permission),
            include_calculated: true,
        }
    }
}

/// Computes the effective grant set of one resource from its stored records.
///
/// Deny rows always win over grant rows for the same pair, whether either is
/// explicit or inherited. Calculated rules are evaluated only when the query
/// could include the permission they produce.
pub(crate) fn effective_grants(
    resource: &Resource,
    permissions: &ResourceTypePermissions,
    records: &[GrantRecord],
    query: EffectiveQuery<'_>,
) -> BTreeSet<GrantPair> {
    // A calculated permission is never read from storage; its rules need the
    // identity's other stored permissions instead.
    let stored_permission = query
        .permission
        .filter(|permission| !permissions.is_calculated(permission));

    let stored = |deny: bool| -> BTreeSet<GrantPair> {
        records
            .iter()
            .filter(|record| {
                record.is_deny() == deny
                    && !permissions.is_calculated(record.permission())
                    && query
                        .identity
                        .is_none_or(|identity| identity == record.identity())
                    && stored_permission.is_none_or(|permission| permission == record.permission())
            })
            .map(|record| (record.identity().clone(), record.permission().clone()))
            .collect()
    };

    let denies = stored(true);
    let mut effective: BTreeSet<GrantPair> = stored(false)
        .into_iter()
        .filter(|pair| !denies.contains(pair))
        .collect();

    if query.include_calculated {
        let calculated = calculated_grants(resource, permissions, &effective, query);
        effective.extend(calculated);
    }

    if let Some(permission) = query.permission {
        effective.retain(|(_, held)| held == permission);
    }

    effective
}

fn calculated_grants(
    resource: &Resource,
    permissions: &ResourceTypePermissions,
    effective: &BTreeSet<GrantPair>,
    query: EffectiveQuery<'_>,
) -> Vec<GrantPair> {
    let mut calculated = Vec::new();

    for rule in permissions.calculated_rules() {
        if query
            .permission
            .is_some_and(|permission| permission != rule.permission())
        {
            continue;
        }

        match rule {
            CalculatedRule::Owner { permission } => {
                if let Some(owner) = resource.owner()
                    && query.identity.is_none_or(|identity| identity == owner)
                {
                    calculated.push((owner.clone(), permission.clone()));
                }
            }
            CalculatedRule::Editors { source, permission } => {
                if !resource.editors_can_change_permissions() {
                    continue;
                }

                calculated.extend(
                    effective
                        .iter()
                        .filter(|(_, held)| held == source)
                        .map(|(identity, _)| (identity.clone(), permission.clone())),
                );
            }
        }
    }

    calculated
}
