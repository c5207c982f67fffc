use std::collections::BTreeSet;

use sharegate_core::Principal;
use sharegate_domain::{Identity, PermissionKind, Subject, UserId};

use crate::PermissionEngineConfig;

/// Maps authentication principals to identities and owns the anonymous
/// allow-list.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    allowed_anonymous_permissions: BTreeSet<PermissionKind>,
    reserved_anonymous_user_id: Option<UserId>,
}

impl IdentityResolver {
    /// Creates a resolver from the anonymous policy.
    #[must_use]
    pub fn new(
        allowed_anonymous_permissions: BTreeSet<PermissionKind>,
        reserved_anonymous_user_id: Option<UserId>,
    ) -> Self {
        Self {
            allowed_anonymous_permissions,
            reserved_anonymous_user_id,
        }
    }

    /// Creates a resolver from engine configuration.
    #[must_use]
    pub fn from_config(config: &PermissionEngineConfig) -> Self {
        Self::new(
            config.allowed_anonymous_permissions.clone(),
            config.reserved_anonymous_user_id,
        )
    }

    /// Resolves a principal into the subject of permission checks.
    ///
    /// Unauthenticated principals and the reserved anonymous user id both
    /// resolve to the anonymous identity, which never bypasses checks.
    #[must_use]
    pub fn resolve(&self, principal: &Principal) -> Subject {
        match principal {
            Principal::Unauthenticated => Subject::anonymous(),
            Principal::Authenticated(user) => {
                let user_id = UserId::from_uuid(user.user_id());
                if self.reserved_anonymous_user_id == Some(user_id) {
                    return Subject::anonymous();
                }

                Subject::new(Identity::User(user_id), user.is_superuser())
            }
        }
    }

    /// Returns the permissions the anonymous identity may hold.
    #[must_use]
    pub fn allowed_anonymous_permissions(&self) -> &BTreeSet<PermissionKind> {
        &self.allowed_anonymous_permissions
    }

    /// Returns whether `identity` may hold `permission` at all. Only the
    /// anonymous identity is restricted.
    #[must_use]
    pub fn permits(&self, identity: &Identity, permission: &PermissionKind) -> bool {
        !identity.is_anonymous() || self.allowed_anonymous_permissions.contains(permission)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use sharegate_core::Principal;
    use sharegate_domain::{Identity, PermissionKind, UserId};
    use uuid::Uuid;

    use super::IdentityResolver;

    fn resolver(reserved: Option<UserId>) -> IdentityResolver {
        IdentityResolver::new(
            BTreeSet::from([PermissionKind::from_static("view")]),
            reserved,
        )
    }

    #[test]
    fn unauthenticated_principal_resolves_to_anonymous() {
        let subject = resolver(None).resolve(&Principal::Unauthenticated);
        assert!(subject.is_anonymous());
        assert!(!subject.is_superuser());
    }

    #[test]
    fn reserved_user_id_resolves_to_anonymous() {
        let reserved = Uuid::nil();
        let subject =
            resolver(Some(UserId::from_uuid(reserved))).resolve(&Principal::superuser(reserved));
        assert!(subject.is_anonymous());
        assert!(!subject.is_superuser());
    }

    #[test]
    fn authenticated_principal_keeps_superuser_flag() {
        let user_id = Uuid::new_v4();
        let subject = resolver(None).resolve(&Principal::superuser(user_id));
        assert_eq!(
            subject.identity(),
            &Identity::User(UserId::from_uuid(user_id))
        );
        assert!(subject.is_superuser());
    }

    #[test]
    fn only_anonymous_is_restricted_by_allow_list() {
        let resolver = resolver(None);
        let change = PermissionKind::from_static("change");

        assert!(resolver.permits(&Identity::User(UserId::new()), &change));
        assert!(!resolver.permits(&Identity::Anonymous, &change));
        assert!(resolver.permits(&Identity::Anonymous, &PermissionKind::from_static("view")));
    }
}
