use std::sync::Arc;

use sharegate_application::{AuthorizationService, PermissionEngine};
use sharegate_core::{AppError, AppResult, Principal};
use sharegate_domain::{
    Identity, PermissionKind, Resource, ResourceRef, ResourceType, UserId,
};
use sharegate_infrastructure::{InMemoryResourceHierarchy, PostgresResourceHierarchy};
use tracing::info;
use uuid::Uuid;

const DEV_SEED_ALICE_USER_ID: &str = "a2c8ea5f-4f39-4724-97f5-932f97f54f76";
const DEV_SEED_BOB_USER_ID: &str = "96d11e90-7403-4654-9727-cb1043f8bd31";
const DEV_SEED_CAROL_USER_ID: &str = "3f0b5c1e-2a7d-4e8b-9c61-5d4a8e2f7b90";
const DEV_SEED_COLLECTION_ID: &str = "customer-research";
const DEV_SEED_SURVEY_ID: &str = "onboarding-feedback";

/// Resource store the seed writes the demo tree into.
pub enum SeedHierarchy {
    InMemory(Arc<InMemoryResourceHierarchy>),
    Postgres(PostgresResourceHierarchy),
}

impl SeedHierarchy {
    async fn save_resource(&self, resource: &Resource) -> AppResult<()> {
        match self {
            Self::InMemory(hierarchy) => hierarchy.save_resource(resource).await,
            Self::Postgres(hierarchy) => hierarchy.save_resource(resource).await,
        }
    }
}

pub async fn run(
    engine: &PermissionEngine,
    authorization_service: &AuthorizationService,
    hierarchy: &SeedHierarchy,
) -> AppResult<()> {
    let alice = parse_uuid_const(DEV_SEED_ALICE_USER_ID, "DEV_SEED_ALICE_USER_ID")?;
    let bob = parse_uuid_const(DEV_SEED_BOB_USER_ID, "DEV_SEED_BOB_USER_ID")?;
    let carol = parse_uuid_const(DEV_SEED_CAROL_USER_ID, "DEV_SEED_CAROL_USER_ID")?;
    let alice_identity = Identity::User(UserId::from_uuid(alice));
    let bob_identity = Identity::User(UserId::from_uuid(bob));

    let collection = Resource::new(ResourceRef::new(
        ResourceType::Collection,
        DEV_SEED_COLLECTION_ID,
    )?)
    .with_owner(alice_identity.clone());
    let survey = Resource::new(ResourceRef::new(ResourceType::Survey, DEV_SEED_SURVEY_ID)?)
        .with_owner(alice_identity)
        .with_parent(collection.resource_ref().clone())?;

    for resource in [&collection, &survey] {
        hierarchy.save_resource(resource).await?;
        engine
            .recalculate_inherited_permissions(resource.resource_ref())
            .await?;
    }

    let survey_ref = survey.resource_ref();
    let view = PermissionKind::from_static("view");
    let change = PermissionKind::from_static("change");
    let delete = PermissionKind::from_static("delete");

    engine
        .assign_permission(survey_ref, &bob_identity, &change, false)
        .await?;
    log_decision(authorization_service, "bob", bob, survey_ref, &view).await?;
    log_decision(authorization_service, "bob", bob, survey_ref, &change).await?;
    log_decision(authorization_service, "carol", carol, survey_ref, &view).await?;
    log_decision(authorization_service, "alice", alice, survey_ref, &delete).await?;

    engine
        .assign_permission(survey_ref, &Identity::Anonymous, &view, false)
        .await?;
    log_decision(authorization_service, "carol", carol, survey_ref, &view).await?;

    let public_view = authorization_service
        .has_permission(&Principal::Unauthenticated, survey_ref, &view)
        .await?;
    let sharing = authorization_service
        .get_identities_with_permission(survey_ref, true)
        .await?;

    info!(
        survey = %survey_ref,
        public_view,
        identities = sharing.identities().len(),
        "development sharing seed completed"
    );

    Ok(())
}

async fn log_decision(
    authorization_service: &AuthorizationService,
    name: &str,
    user_id: Uuid,
    resource: &ResourceRef,
    permission: &PermissionKind,
) -> AppResult<()> {
    let allowed = authorization_service
        .has_permission(&Principal::user(user_id), resource, permission)
        .await?;

    info!(user = name, %resource, %permission, allowed, "permission decision");
    Ok(())
}

fn parse_uuid_const(value: &str, name: &str) -> AppResult<Uuid> {
    Uuid::parse_str(value).map_err(|error| {
        AppError::Internal(format!("invalid static uuid '{name}={value}': {error}"))
    })
}
