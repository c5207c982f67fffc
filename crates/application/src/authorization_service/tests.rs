use std::collections::BTreeSet;

use sharegate_core::{AppError, Principal};
use sharegate_domain::{Identity, Resource, UserId};
use uuid::Uuid;

use crate::test_support::{Fixture, permission, survey};
use crate::{AuthorizationService, PermissionEngineConfig};

fn service(fixture: &Fixture) -> AuthorizationService {
    AuthorizationService::new(fixture.engine.clone())
}

#[tokio::test]
async fn require_permission_allows_granted_principal() {
    let fixture = Fixture::new();
    let resource = fixture.create(Resource::new(survey("s1"))).await;
    let user_id = Uuid::new_v4();
    fixture
        .engine
        .assign_permission(
            &resource,
            &Identity::User(UserId::from_uuid(user_id)),
            &permission("view"),
            false,
        )
        .await
        .unwrap_or_else(|_| unreachable!());

    let result = service(&fixture)
        .require_permission(&Principal::user(user_id), &resource, &permission("view"))
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn require_permission_rejects_missing_permission() {
    let fixture = Fixture::new();
    let resource = fixture.create(Resource::new(survey("s1"))).await;

    let result = service(&fixture)
        .require_permission(
            &Principal::user(Uuid::new_v4()),
            &resource,
            &permission("change"),
        )
        .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn unauthenticated_principal_sees_public_shares_only() {
    let fixture = Fixture::new();
    let resource = fixture.create(Resource::new(survey("s1"))).await;
    fixture
        .engine
        .assign_permission(&resource, &Identity::Anonymous, &permission("view"), false)
        .await
        .unwrap_or_else(|_| unreachable!());
    let service = service(&fixture);

    let view = service
        .has_permission(&Principal::Unauthenticated, &resource, &permission("view"))
        .await;
    let change = service
        .has_permission(&Principal::Unauthenticated, &resource, &permission("change"))
        .await;

    assert!(matches!(view, Ok(true)));
    assert!(matches!(change, Ok(false)));
}

#[tokio::test]
async fn reserved_anonymous_user_is_never_a_superuser() {
    let reserved = Uuid::new_v4();
    let config = PermissionEngineConfig {
        reserved_anonymous_user_id: Some(UserId::from_uuid(reserved)),
        ..PermissionEngineConfig::default()
    };
    let fixture = Fixture::with_config(config);
    let resource = fixture.create(Resource::new(survey("s1"))).await;
    let service = service(&fixture);

    let reserved_check = service
        .has_permission(&Principal::superuser(reserved), &resource, &permission("view"))
        .await;
    let superuser_check = service
        .has_permission(
            &Principal::superuser(Uuid::new_v4()),
            &resource,
            &permission("view"),
        )
        .await;

    assert!(matches!(reserved_check, Ok(false)));
    assert!(matches!(superuser_check, Ok(true)));
}

#[tokio::test]
async fn all_permissions_come_from_own_grants_and_groups_are_empty() {
    let fixture = Fixture::new();
    let owner_id = Uuid::new_v4();
    let resource = fixture
        .create(
            Resource::new(survey("s1")).with_owner(Identity::User(UserId::from_uuid(owner_id))),
        )
        .await;
    let service = service(&fixture);
    let principal = Principal::user(owner_id);

    let permissions = service
        .get_all_permissions(&principal, &resource)
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(permissions.contains(&permission("delete")));
    assert!(permissions.contains(&permission("change_submissions")));
    assert_eq!(
        service.get_group_permissions(&principal, &resource),
        BTreeSet::new()
    );
}

#[tokio::test]
async fn listings_are_delegated_to_engine() {
    let fixture = Fixture::new();
    let user_id = Uuid::new_v4();
    let identity = Identity::User(UserId::from_uuid(user_id));
    let resource = fixture.create(Resource::new(survey("s1"))).await;
    fixture
        .engine
        .assign_permission(&resource, &identity, &permission("change"), false)
        .await
        .unwrap_or_else(|_| unreachable!());
    let service = service(&fixture);

    let resources = service
        .resources_with_permission(&Principal::user(user_id), &permission("view"))
        .await
        .unwrap_or_else(|_| unreachable!());
    let identities = service
        .get_identities_with_permission(&resource, false)
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(resources, vec![resource]);
    assert_eq!(identities.identities(), BTreeSet::from([identity]));
}
