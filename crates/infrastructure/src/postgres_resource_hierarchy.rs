use std::str::FromStr;

use async_trait::async_trait;
use sharegate_application::ResourceHierarchy;
use sharegate_core::{AppError, AppResult};
use sharegate_domain::{Identity, Resource, ResourceRef, ResourceType};
use sqlx::{FromRow, PgPool};

#[cfg(test)]
mod tests;

/// PostgreSQL-backed resource tree over the `shared_resources` table.
#[derive(Clone)]
pub struct PostgresResourceHierarchy {
    pool: PgPool,
}

impl PostgresResourceHierarchy {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates or replaces a resource row.
    pub async fn save_resource(&self, resource: &Resource) -> AppResult<()> {
        let parent = resource.parent();

        sqlx::query(
            r#"
            INSERT INTO shared_resources (
                resource_type,
                resource_id,
                owner_identity,
                parent_resource_type,
                parent_resource_id,
                editors_can_change_permissions
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (resource_type, resource_id) DO UPDATE
            SET owner_identity = EXCLUDED.owner_identity,
                parent_resource_type = EXCLUDED.parent_resource_type,
                parent_resource_id = EXCLUDED.parent_resource_id,
                editors_can_change_permissions = EXCLUDED.editors_can_change_permissions
            "#,
        )
        .bind(resource.resource_type().as_str())
        .bind(resource.resource_ref().resource_id())
        .bind(resource.owner().map(Identity::as_storage_value))
        .bind(parent.map(|parent| parent.resource_type().as_str()))
        .bind(parent.map(ResourceRef::resource_id))
        .bind(resource.editors_can_change_permissions())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to save resource '{}': {error}",
                resource.resource_ref()
            ))
        })?;

        Ok(())
    }
}

#[derive(Debug, FromRow)]
struct ResourceRow {
    resource_type: String,
    resource_id: String,
    owner_identity: Option<String>,
    parent_resource_type: Option<String>,
    parent_resource_id: Option<String>,
    editors_can_change_permissions: bool,
}

#[derive(Debug, FromRow)]
struct ResourceRefRow {
    resource_type: String,
    resource_id: String,
}

fn decode_ref(resource_type: &str, resource_id: &str) -> AppResult<ResourceRef> {
    ResourceType::from_str(resource_type)
        .and_then(|resource_type| ResourceRef::new(resource_type, resource_id))
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to decode resource '{resource_type}:{resource_id}': {error}"
            ))
        })
}

impl ResourceRow {
    fn into_resource(self) -> AppResult<Resource> {
        let resource_ref = decode_ref(&self.resource_type, &self.resource_id)?;
        let mut resource = Resource::new(resource_ref.clone())
            .with_editors_can_change_permissions(self.editors_can_change_permissions);

        if let Some(owner) = self.owner_identity {
            let owner = Identity::from_str(owner.as_str()).map_err(|error| {
                AppError::Internal(format!(
                    "failed to decode owner of '{resource_ref}': {error}"
                ))
            })?;
            resource = resource.with_owner(owner);
        }

        if let (Some(parent_type), Some(parent_id)) =
            (self.parent_resource_type, self.parent_resource_id)
        {
            resource = resource.with_parent(decode_ref(&parent_type, &parent_id)?)?;
        }

        Ok(resource)
    }
}

#[async_trait]
impl ResourceHierarchy for PostgresResourceHierarchy {
    async fn find_resource(&self, resource: &ResourceRef) -> AppResult<Resource> {
        let row = sqlx::query_as::<_, ResourceRow>(
            r#"
            SELECT
                resource_type,
                resource_id,
                owner_identity,
                parent_resource_type,
                parent_resource_id,
                editors_can_change_permissions
            FROM shared_resources
            WHERE resource_type = $1
                AND resource_id = $2
            "#,
        )
        .bind(resource.resource_type().as_str())
        .bind(resource.resource_id())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to load resource '{resource}': {error}"))
        })?
        .ok_or_else(|| AppError::NotFound(format!("resource '{resource}' does not exist")))?;

        row.into_resource()
    }

    async fn children(&self, resource: &ResourceRef) -> AppResult<Vec<ResourceRef>> {
        let rows = sqlx::query_as::<_, ResourceRefRow>(
            r#"
            SELECT resource_type, resource_id
            FROM shared_resources
            WHERE parent_resource_type = $1
                AND parent_resource_id = $2
            ORDER BY resource_type, resource_id
            "#,
        )
        .bind(resource.resource_type().as_str())
        .bind(resource.resource_id())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list children of '{resource}': {error}"
            ))
        })?;

        rows.iter()
            .map(|row| decode_ref(&row.resource_type, &row.resource_id))
            .collect()
    }

    async fn descendants(&self, resource: &ResourceRef) -> AppResult<Vec<ResourceRef>> {
        let rows = sqlx::query_as::<_, ResourceRefRow>(
            r#"
            WITH RECURSIVE subtree AS (
                SELECT resource_type, resource_id, 1 AS depth
                FROM shared_resources
                WHERE parent_resource_type = $1
                    AND parent_resource_id = $2
                UNION ALL
                SELECT child.resource_type, child.resource_id, subtree.depth + 1
                FROM shared_resources AS child
                INNER JOIN subtree
                    ON child.parent_resource_type = subtree.resource_type
                    AND child.parent_resource_id = subtree.resource_id
            )
            SELECT resource_type, resource_id
            FROM subtree
            ORDER BY depth, resource_type, resource_id
            "#,
        )
        .bind(resource.resource_type().as_str())
        .bind(resource.resource_id())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list descendants of '{resource}': {error}"
            ))
        })?;

        rows.iter()
            .map(|row| decode_ref(&row.resource_type, &row.resource_id))
            .collect()
    }
}
