use serde::{Deserialize, Serialize};

use crate::{Identity, PermissionKind, ResourceRef};

/// Stored permission record.
///
/// The full tuple is the key: two records differing only in `deny` or
/// `inherited` are distinct rows. Inherited rows belong to the inheritance
/// propagator and are regenerated wholesale; explicit rows belong to API
/// callers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GrantRecord {
    identity: Identity,
    resource: ResourceRef,
    permission: PermissionKind,
    deny: bool,
    inherited: bool,
}

impl GrantRecord {
    /// Creates a record from all key parts.
    #[must_use]
    pub fn new(
        identity: Identity,
        resource: ResourceRef,
        permission: PermissionKind,
        deny: bool,
        inherited: bool,
    ) -> Self {
        Self {
            identity,
            resource,
            permission,
            deny,
            inherited,
        }
    }

    /// Creates a record owned by an explicit API caller.
    #[must_use]
    pub fn explicit(
        identity: Identity,
        resource: ResourceRef,
        permission: PermissionKind,
        deny: bool,
    ) -> Self {
        Self::new(identity, resource, permission, deny, false)
    }

    /// Creates an inherited grant owned by the propagator.
    #[must_use]
    pub fn inherited_grant(
        identity: Identity,
        resource: ResourceRef,
        permission: PermissionKind,
    ) -> Self {
        Self::new(identity, resource, permission, false, true)
    }

    /// Returns the identity holding the record.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Returns the resource the record applies to.
    #[must_use]
    pub fn resource(&self) -> &ResourceRef {
        &self.resource
    }

    /// Returns the permission name.
    #[must_use]
    pub fn permission(&self) -> &PermissionKind {
        &self.permission
    }

    /// Returns whether this record denies rather than grants.
    #[must_use]
    pub fn is_deny(&self) -> bool {
        self.deny
    }

    /// Returns whether the propagator owns this record.
    #[must_use]
    pub fn is_inherited(&self) -> bool {
        self.inherited
    }
}

/// Delete criteria for grant records of one resource.
///
/// Unset fields match any value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantFilter {
    /// Resource whose records are matched.
    pub resource: ResourceRef,
    /// Optional identity restriction.
    pub identity: Option<Identity>,
    /// Optional permission restriction.
    pub permission: Option<PermissionKind>,
    /// Optional deny flag restriction.
    pub deny: Option<bool>,
    /// Optional inherited flag restriction.
    pub inherited: Option<bool>,
}

impl GrantFilter {
    /// Matches every record of the resource.
    #[must_use]
    pub fn for_resource(resource: ResourceRef) -> Self {
        Self {
            resource,
            identity: None,
            permission: None,
            deny: None,
            inherited: None,
        }
    }

    /// Matches exactly one explicit record key.
    #[must_use]
    pub fn explicit(
        resource: ResourceRef,
        identity: Identity,
        permission: PermissionKind,
        deny: bool,
    ) -> Self {
        Self {
            resource,
            identity: Some(identity),
            permission: Some(permission),
            deny: Some(deny),
            inherited: Some(false),
        }
    }

    /// Matches every inherited record of the resource.
    #[must_use]
    pub fn inherited(resource: ResourceRef) -> Self {
        Self {
            inherited: Some(true),
            ..Self::for_resource(resource)
        }
    }

    /// Returns whether the record satisfies every set criterion.
    #[must_use]
    pub fn matches(&self, record: &GrantRecord) -> bool {
        record.resource == self.resource
            && self
                .identity
                .as_ref()
                .is_none_or(|identity| identity == &record.identity)
            && self
                .permission
                .as_ref()
                .is_none_or(|permission| permission == &record.permission)
            && self.deny.is_none_or(|deny| deny == record.deny)
            && self
                .inherited
                .is_none_or(|inherited| inherited == record.inherited)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Identity, PermissionKind, ResourceRef, ResourceType, UserId};

    use super::{GrantFilter, GrantRecord};

    fn survey() -> ResourceRef {
        ResourceRef::new(ResourceType::Survey, "s1").unwrap_or_else(|_| unreachable!())
    }

    fn view() -> PermissionKind {
        PermissionKind::new("view").unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn explicit_filter_ignores_inherited_rows() {
        let identity = Identity::User(UserId::new());
        let filter = GrantFilter::explicit(survey(), identity.clone(), view(), false);

        assert!(filter.matches(&GrantRecord::explicit(
            identity.clone(),
            survey(),
            view(),
            false
        )));
        assert!(!filter.matches(&GrantRecord::inherited_grant(identity, survey(), view())));
    }

    #[test]
    fn inherited_filter_matches_any_identity() {
        let filter = GrantFilter::inherited(survey());
        assert!(filter.matches(&GrantRecord::inherited_grant(
            Identity::Anonymous,
            survey(),
            view()
        )));
        assert!(!filter.matches(&GrantRecord::explicit(
            Identity::Anonymous,
            survey(),
            view(),
            true
        )));
    }
}
