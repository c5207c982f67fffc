//! Sharegate seed composition root.

#![forbid(unsafe_code)]

mod dev_seed;
mod seed_config;

use std::sync::Arc;

use sharegate_application::{AuthorizationService, PermissionEngine};
use sharegate_core::AppError;
use sharegate_infrastructure::{
    InMemoryAuditRepository, InMemoryGrantRepository, InMemoryResourceHierarchy,
    PostgresAuditRepository, PostgresGrantRepository, PostgresResourceHierarchy,
};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::dev_seed::SeedHierarchy;
use crate::seed_config::SeedConfig;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = SeedConfig::load()?;

    let (engine, hierarchy) = match config.database_url.as_deref() {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await
                .map_err(|error| {
                    AppError::Internal(format!("failed to connect to database: {error}"))
                })?;

            sqlx::migrate!("../../crates/infrastructure/migrations")
                .run(&pool)
                .await
                .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;
            info!("database migrations applied successfully");

            let hierarchy = PostgresResourceHierarchy::new(pool.clone());
            let engine = PermissionEngine::from_config(
                config.engine,
                Arc::new(PostgresGrantRepository::new(pool.clone())),
                Arc::new(hierarchy.clone()),
                Arc::new(PostgresAuditRepository::new(pool)),
            )?;

            (engine, SeedHierarchy::Postgres(hierarchy))
        }
        None => {
            info!("DATABASE_URL not configured, seeding in-memory stores");

            let hierarchy = Arc::new(InMemoryResourceHierarchy::new());
            let engine = PermissionEngine::from_config(
                config.engine,
                Arc::new(InMemoryGrantRepository::new()),
                hierarchy.clone(),
                Arc::new(InMemoryAuditRepository::new()),
            )?;

            (engine, SeedHierarchy::InMemory(hierarchy))
        }
    };

    let authorization_service = AuthorizationService::new(engine.clone());
    dev_seed::run(&engine, &authorization_service, &hierarchy).await
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
