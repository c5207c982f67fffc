use std::collections::BTreeSet;
use std::env;
use std::str::FromStr;

use sharegate_application::PermissionEngineConfig;
use sharegate_core::{AppError, AppResult};
use sharegate_domain::{PermissionCatalog, PermissionKind, UserId};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SeedConfig {
    pub database_url: Option<String>,
    pub engine: PermissionEngineConfig,
}

impl SeedConfig {
    pub fn load() -> AppResult<Self> {
        let database_url = optional_env("DATABASE_URL");
        let mut engine = PermissionEngineConfig::default();

        if let Some(path) = optional_env("PERMISSION_CATALOG_PATH") {
            let document = std::fs::read_to_string(path.as_str()).map_err(|error| {
                AppError::Configuration(format!(
                    "failed to read PERMISSION_CATALOG_PATH '{path}': {error}"
                ))
            })?;
            engine.catalog = PermissionCatalog::from_json_str(document.as_str())?;
        }

        if let Ok(value) = env::var("ALLOWED_ANONYMOUS_PERMISSIONS") {
            engine.allowed_anonymous_permissions = parse_permission_list(value.as_str())?;
        }

        engine.reserved_anonymous_user_id = optional_env("RESERVED_ANONYMOUS_USER_ID")
            .map(|value| parse_user_id(value.as_str()))
            .transpose()?;

        engine.validate()?;

        Ok(Self {
            database_url,
            engine,
        })
    }
}

fn optional_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn parse_permission_list(value: &str) -> AppResult<BTreeSet<PermissionKind>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(PermissionKind::from_str)
        .collect()
}

fn parse_user_id(value: &str) -> AppResult<UserId> {
    Uuid::parse_str(value.trim())
        .map(UserId::from_uuid)
        .map_err(|error| {
            AppError::Validation(format!("invalid RESERVED_ANONYMOUS_USER_ID: {error}"))
        })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use sharegate_core::AppError;
    use sharegate_domain::PermissionKind;

    use super::{parse_permission_list, parse_user_id};

    #[test]
    fn permission_list_is_trimmed_and_deduplicated() {
        let parsed = parse_permission_list(" view, add_submissions ,,view");
        assert!(matches!(
            parsed,
            Ok(ref value) if value == &BTreeSet::from([
                PermissionKind::from_static("add_submissions"),
                PermissionKind::from_static("view"),
            ])
        ));
        assert!(matches!(parse_permission_list(""), Ok(ref value) if value.is_empty()));
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(matches!(
            parse_permission_list("view,Change"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            parse_user_id("not-a-uuid"),
            Err(AppError::Validation(_))
        ));
    }
}
