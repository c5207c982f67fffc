use std::str::FromStr;

use async_trait::async_trait;
use sharegate_application::{GrantChange, GrantChangeSet, GrantRepository};
use sharegate_core::{AppError, AppResult};
use sharegate_domain::{
    GrantFilter, GrantRecord, Identity, PermissionKind, ResourceRef, ResourceType,
};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::debug;


/// PostgreSQL-backed grant store over the `object_permissions` table.
///
/// Each change set is applied in one transaction. Reads run outside that
/// transaction, so writers are serialized only by the engine's in-process
/// write gate. Engines in separate processes must not mutate the same
/// table concurrently.
#[derive(Clone)]
pub struct PostgresGrantRepository {
    pool: PgPool,
}

impl PostgresGrantRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct GrantRow {
    identity: String,
    resource_type: String,
    resource_id: String,
    permission: String,
    deny: bool,
    inherited: bool,
}

impl GrantRow {
    fn into_record(self) -> AppResult<GrantRecord> {
        let decode = |field: &str, error: AppError| {
            AppError::Internal(format!(
                "failed to decode grant {field} for '{}:{}': {error}",
                self.resource_type, self.resource_id
            ))
        };

        let identity = Identity::from_str(self.identity.as_str())
            .map_err(|error| decode("identity", error))?;
        let resource_type = ResourceType::from_str(self.resource_type.as_str())
            .map_err(|error| decode("resource type", error))?;
        let resource = ResourceRef::new(resource_type, self.resource_id.as_str())
            .map_err(|error| decode("resource id", error))?;
        let permission = PermissionKind::from_str(self.permission.as_str())
            .map_err(|error| decode("permission", error))?;

        Ok(GrantRecord::new(
            identity,
            resource,
            permission,
            self.deny,
            self.inherited,
        ))
    }
}

#[async_trait]
impl GrantRepository for PostgresGrantRepository {
    async fn list_for_resource(&self, resource: &ResourceRef) -> AppResult<Vec<GrantRecord>> {
        let rows = sqlx::query_as::<_, GrantRow>(
            r#"
            SELECT identity, resource_type, resource_id, permission, deny, inherited
            FROM object_permissions
            WHERE resource_type = $1
                AND resource_id = $2
            ORDER BY identity, permission, deny, inherited
            "#,
        )
        .bind(resource.resource_type().as_str())
        .bind(resource.resource_id())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list grant records for '{resource}': {error}"
            ))
        })?;

        rows.into_iter().map(GrantRow::into_record).collect()
    }

    async fn list_for_identity(&self, identity: &Identity) -> AppResult<Vec<GrantRecord>> {
        let rows = sqlx::query_as::<_, GrantRow>(
            r#"
            SELECT identity, resource_type, resource_id, permission, deny, inherited
            FROM object_permissions
            WHERE identity = $1
            ORDER BY resource_type, resource_id, permission
            "#,
        )
        .bind(identity.as_storage_value())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list grant records for '{identity}': {error}"
            ))
        })?;

        rows.into_iter().map(GrantRow::into_record).collect()
    }

    async fn apply_changes(&self, changes: GrantChangeSet) -> AppResult<()> {
        let count = changes.len();
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to start grant transaction: {error}"))
        })?;

        for change in changes {
            match change {
                GrantChange::Insert(record) => insert_record(&mut transaction, &record).await?,
                GrantChange::Delete(filter) => delete_matching(&mut transaction, &filter).await?,
            }
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit grant transaction: {error}"))
        })?;

        debug!(changes = count, "applied grant change set");
        Ok(())
    }
}

async fn insert_record(
    transaction: &mut Transaction<'_, Postgres>,
    record: &GrantRecord,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO object_permissions (
            identity,
            resource_type,
            resource_id,
            permission,
            deny,
            inherited
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(record.identity().as_storage_value())
    .bind(record.resource().resource_type().as_str())
    .bind(record.resource().resource_id())
    .bind(record.permission().as_str())
    .bind(record.is_deny())
    .bind(record.is_inherited())
    .execute(&mut **transaction)
    .await
    .map_err(|error| {
        AppError::Internal(format!(
            "failed to insert grant record on '{}': {error}",
            record.resource()
        ))
    })?;

    Ok(())
}

async fn delete_matching(
    transaction: &mut Transaction<'_, Postgres>,
    filter: &GrantFilter,
) -> AppResult<()> {
    sqlx::query(
        r#"
        DELETE FROM object_permissions
        WHERE resource_type = $1
            AND resource_id = $2
            AND ($3::TEXT IS NULL OR identity = $3)
            AND ($4::TEXT IS NULL OR permission = $4)
            AND ($5::BOOLEAN IS NULL OR deny = $5)
            AND ($6::BOOLEAN IS NULL OR inherited = $6)
        "#,
    )
    .bind(filter.resource.resource_type().as_str())
    .bind(filter.resource.resource_id())
    .bind(filter.identity.as_ref().map(Identity::as_storage_value))
    .bind(filter.permission.as_ref().map(PermissionKind::as_str))
    .bind(filter.deny)
    .bind(filter.inherited)
    .execute(&mut **transaction)
    .await
    .map_err(|error| {
        AppError::Internal(format!(
            "failed to delete grant records on '{}': {error}",
            filter.resource
        ))
    })?;

    Ok(())
}
