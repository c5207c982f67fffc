use std::collections::BTreeSet;

use sharegate_core::{AppError, AppResult};
use sharegate_domain::{PermissionCatalog, PermissionKind, UserId};

/// Process-wide permission engine configuration, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionEngineConfig {
    /// Permission catalog for every resource type.
    pub catalog: PermissionCatalog,
    /// Permissions the anonymous identity may ever hold.
    pub allowed_anonymous_permissions: BTreeSet<PermissionKind>,
    /// User id that storage layers use to represent the public.
    pub reserved_anonymous_user_id: Option<UserId>,
}

impl PermissionEngineConfig {
    /// Checks that every anonymous permission exists in the catalog.
    pub fn validate(&self) -> AppResult<()> {
        let known: BTreeSet<PermissionKind> = self
            .catalog
            .resource_types()
            .filter_map(|resource_type| self.catalog.for_type(resource_type).ok())
            .flat_map(|permissions| permissions.all_permissions())
            .collect();

        if let Some(unknown) = self
            .allowed_anonymous_permissions
            .iter()
            .find(|permission| !known.contains(*permission))
        {
            return Err(AppError::Configuration(format!(
                "anonymous permission '{unknown}' is not defined for any resource type"
            )));
        }

        Ok(())
    }
}

impl Default for PermissionEngineConfig {
    fn default() -> Self {
        Self {
            catalog: PermissionCatalog::survey_defaults(),
            allowed_anonymous_permissions: BTreeSet::from([
                PermissionKind::from_static("view"),
                PermissionKind::from_static("view_submissions"),
                PermissionKind::from_static("add_submissions"),
            ]),
            reserved_anonymous_user_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use sharegate_core::AppError;
    use sharegate_domain::PermissionKind;

    use super::PermissionEngineConfig;

    #[test]
    fn default_config_is_valid() {
        assert!(PermissionEngineConfig::default().validate().is_ok());
    }

    #[test]
    fn unknown_anonymous_permission_is_rejected() {
        let mut config = PermissionEngineConfig::default();
        config
            .allowed_anonymous_permissions
            .insert(PermissionKind::from_static("export"));

        assert!(matches!(config.validate(), Err(AppError::Configuration(_))));
    }
}
