use async_trait::async_trait;
use sqlx::PgPool;

use sharegate_application::{AuditEvent, AuditRepository};
use sharegate_core::{AppError, AppResult};
use sharegate_domain::{Identity, PermissionKind};

/// PostgreSQL-backed append-only permission audit repository.
#[derive(Clone)]
pub struct PostgresAuditRepository {
    pool: PgPool,
}

impl PostgresAuditRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditRepository for PostgresAuditRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO permission_audit_events (
                action,
                resource_type,
                resource_id,
                identity,
                permission,
                detail
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(event.action.as_str())
        .bind(event.resource.resource_type().as_str())
        .bind(event.resource.resource_id())
        .bind(event.identity.as_ref().map(Identity::as_storage_value))
        .bind(event.permission.as_ref().map(PermissionKind::as_str))
        .bind(event.detail)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to append audit event: {error}")))?;

        Ok(())
    }
}
