use sharegate_application::ResourceHierarchy;
use sharegate_core::AppError;
use sharegate_domain::{Identity, Resource, ResourceRef, ResourceType, UserId};
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use super::PostgresResourceHierarchy;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres hierarchy tests: {error}");
    }

    Some(pool)
}

fn unique(resource_type: ResourceType) -> ResourceRef {
    ResourceRef::new(resource_type, Uuid::new_v4().to_string()).unwrap_or_else(|_| unreachable!())
}

#[tokio::test]
async fn saved_resources_are_loaded_with_owner_and_parent() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let hierarchy = PostgresResourceHierarchy::new(pool);
    let folder = Resource::new(unique(ResourceType::Collection));
    let owner = Identity::User(UserId::new());
    let form = Resource::new(unique(ResourceType::Survey))
        .with_owner(owner)
        .with_editors_can_change_permissions(true)
        .with_parent(folder.resource_ref().clone())
        .unwrap_or_else(|_| unreachable!());

    assert!(hierarchy.save_resource(&folder).await.is_ok());
    assert!(hierarchy.save_resource(&form).await.is_ok());

    let loaded = hierarchy.find_resource(form.resource_ref()).await;
    assert!(matches!(loaded, Ok(ref value) if value == &form));

    let descendants = hierarchy
        .descendants(folder.resource_ref())
        .await
        .unwrap_or_default();
    assert_eq!(descendants, vec![form.resource_ref().clone()]);
}

#[tokio::test]
async fn unknown_resource_is_not_found() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let hierarchy = PostgresResourceHierarchy::new(pool);
    let result = hierarchy
        .find_resource(&unique(ResourceType::Survey))
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}
