//! Per-resource-type permission configuration.
//!
//! The catalog is immutable after construction and carries everything the
//! engine needs to know about permission names: which ones may be stored,
//! which ones are derived at query time, which grants imply others, and how a
//! parent of a different resource type translates into child permissions.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use sharegate_core::{AppError, AppResult};

use crate::{PermissionKind, ResourceType};

/// Rule deriving a calculated permission at query time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "rule")]
pub enum CalculatedRule {
    /// The resource owner always holds `permission`.
    Owner {
        /// Calculated permission held by the owner.
        permission: PermissionKind,
    },
    /// Effective holders of `source` also hold `permission` when the
    /// resource lets editors change permissions.
    Editors {
        /// Assignable permission that qualifies a holder as editor.
        source: PermissionKind,
        /// Calculated permission granted to editors.
        permission: PermissionKind,
    },
}

impl CalculatedRule {
    /// Returns the calculated permission produced by this rule.
    #[must_use]
    pub fn permission(&self) -> &PermissionKind {
        match self {
            Self::Owner { permission } | Self::Editors { permission, .. } => permission,
        }
    }
}

/// Permission configuration for one resource type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTypePermissions {
    assignable: BTreeSet<PermissionKind>,
    #[serde(default)]
    implied: BTreeMap<PermissionKind, BTreeSet<PermissionKind>>,
    #[serde(default)]
    calculated: Vec<CalculatedRule>,
    #[serde(default)]
    parent_mappings: BTreeMap<ResourceType, BTreeMap<PermissionKind, PermissionKind>>,
}

impl ResourceTypePermissions {
    /// Creates a configuration with the given assignable permissions.
    #[must_use]
    pub fn new(assignable: impl IntoIterator<Item = PermissionKind>) -> Self {
        Self {
            assignable: assignable.into_iter().collect(),
            implied: BTreeMap::new(),
            calculated: Vec::new(),
            parent_mappings: BTreeMap::new(),
        }
    }

    /// Adds an implication: granting `permission` also grants `implied`, and
    /// denying `implied` also denies `permission`.
    #[must_use]
    pub fn with_implication(mut self, permission: PermissionKind, implied: PermissionKind) -> Self {
        self.implied.entry(permission).or_default().insert(implied);
        self
    }

    /// Adds a calculated permission rule.
    #[must_use]
    pub fn with_calculated_rule(mut self, rule: CalculatedRule) -> Self {
        self.calculated.push(rule);
        self
    }

    /// Adds the permission translation used when the parent is of another type.
    #[must_use]
    pub fn with_parent_mapping(
        mut self,
        parent_type: ResourceType,
        mapping: impl IntoIterator<Item = (PermissionKind, PermissionKind)>,
    ) -> Self {
        self.parent_mappings
            .insert(parent_type, mapping.into_iter().collect());
        self
    }

    /// Returns permissions that may appear in stored records.
    #[must_use]
    pub fn assignable_permissions(&self) -> &BTreeSet<PermissionKind> {
        &self.assignable
    }

    /// Returns permissions derived at query time and never stored.
    #[must_use]
    pub fn calculated_permissions(&self) -> BTreeSet<PermissionKind> {
        self.calculated
            .iter()
            .map(|rule| rule.permission().clone())
            .collect()
    }

    /// Returns every permission known for this resource type.
    #[must_use]
    pub fn all_permissions(&self) -> BTreeSet<PermissionKind> {
        let mut permissions = self.assignable.clone();
        permissions.extend(self.calculated_permissions());
        permissions
    }

    /// Returns whether `permission` may be stored explicitly.
    #[must_use]
    pub fn is_assignable(&self, permission: &PermissionKind) -> bool {
        self.assignable.contains(permission)
    }

    /// Returns whether `permission` is derived at query time.
    #[must_use]
    pub fn is_calculated(&self, permission: &PermissionKind) -> bool {
        self.calculated
            .iter()
            .any(|rule| rule.permission() == permission)
    }

    /// Returns the calculated permission rules.
    #[must_use]
    pub fn calculated_rules(&self) -> &[CalculatedRule] {
        self.calculated.as_slice()
    }

    /// Returns permissions directly implied by granting `permission`.
    #[must_use]
    pub fn implied_permissions(&self, permission: &PermissionKind) -> BTreeSet<PermissionKind> {
        self.implied.get(permission).cloned().unwrap_or_default()
    }

    /// Returns permissions that directly imply `permission`; denying
    /// `permission` denies all of them.
    #[must_use]
    pub fn reverse_implied_permissions(
        &self,
        permission: &PermissionKind,
    ) -> BTreeSet<PermissionKind> {
        self.implied
            .iter()
            .filter_map(|(implying, implied)| {
                implied.contains(permission).then(|| implying.clone())
            })
            .collect()
    }

    fn validate(&self, resource_type: ResourceType) -> AppResult<()> {
        if self.assignable.is_empty() {
            return Err(AppError::Configuration(format!(
                "resource type '{resource_type}' declares no assignable permissions"
            )));
        }

        for rule in &self.calculated {
            if self.assignable.contains(rule.permission()) {
                return Err(AppError::Configuration(format!(
                    "permission '{}' of '{resource_type}' cannot be both assignable and calculated",
                    rule.permission()
                )));
            }

            if let CalculatedRule::Editors { source, .. } = rule
                && !self.assignable.contains(source)
            {
                return Err(AppError::Configuration(format!(
                    "editor rule source '{source}' of '{resource_type}' is not assignable"
                )));
            }
        }

        for (permission, implied) in &self.implied {
            for name in std::iter::once(permission).chain(implied) {
                if !self.assignable.contains(name) {
                    return Err(AppError::Configuration(format!(
                        "implication on '{resource_type}' references non-assignable permission '{name}'"
                    )));
                }
            }
        }

        if self.implied_permissions_are_cyclic() {
            return Err(AppError::Configuration(format!(
                "implications of '{resource_type}' form a cycle"
            )));
        }

        Ok(())
    }

    fn implied_permissions_are_cyclic(&self) -> bool {
        let mut remaining: BTreeMap<&PermissionKind, BTreeSet<&PermissionKind>> = self
            .implied
            .iter()
            .map(|(permission, implied)| (permission, implied.iter().collect()))
            .collect();

        // Repeatedly strip permissions that imply nothing still pending.
        loop {
            let leaves: Vec<&PermissionKind> = remaining
                .iter()
                .filter(|(_, implied)| {
                    implied
                        .iter()
                        .all(|permission| !remaining.contains_key(permission))
                })
                .map(|(permission, _)| *permission)
                .collect();

            if leaves.is_empty() {
                return !remaining.is_empty();
            }

            for leaf in leaves {
                remaining.remove(leaf);
            }
        }
    }
}

/// Immutable permission catalog for every resource type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<ResourceType, ResourceTypePermissions>",
    into = "BTreeMap<ResourceType, ResourceTypePermissions>"
)]
pub struct PermissionCatalog {
    entries: BTreeMap<ResourceType, ResourceTypePermissions>,
}

impl PermissionCatalog {
    /// Creates a validated catalog.
    pub fn new(entries: BTreeMap<ResourceType, ResourceTypePermissions>) -> AppResult<Self> {
        for (resource_type, permissions) in &entries {
            permissions.validate(*resource_type)?;

            for (parent_type, mapping) in &permissions.parent_mappings {
                if parent_type == resource_type {
                    return Err(AppError::Configuration(format!(
                        "'{resource_type}' inherits 1:1 from its own type and takes no parent mapping"
                    )));
                }

                let parent = entries.get(parent_type).ok_or_else(|| {
                    AppError::Configuration(format!(
                        "'{resource_type}' maps from unknown parent type '{parent_type}'"
                    ))
                })?;

                for (parent_permission, child_permission) in mapping {
                    if !parent.is_assignable(parent_permission) {
                        return Err(AppError::Configuration(format!(
                            "mapping '{parent_type}' -> '{resource_type}' reads non-assignable parent permission '{parent_permission}'"
                        )));
                    }
                    if !permissions.is_assignable(child_permission) {
                        return Err(AppError::Configuration(format!(
                            "mapping '{parent_type}' -> '{resource_type}' writes non-assignable permission '{child_permission}'"
                        )));
                    }
                }
            }
        }

        Ok(Self { entries })
    }

    /// Parses and validates a catalog from its JSON document form.
    pub fn from_json_str(document: &str) -> AppResult<Self> {
        serde_json::from_str(document).map_err(|error| {
            AppError::Configuration(format!("invalid permission catalog document: {error}"))
        })
    }

    /// Returns the configuration of `resource_type`.
    pub fn for_type(&self, resource_type: ResourceType) -> AppResult<&ResourceTypePermissions> {
        self.entries.get(&resource_type).ok_or_else(|| {
            AppError::Configuration(format!(
                "permission catalog has no entry for resource type '{resource_type}'"
            ))
        })
    }

    /// Returns the configured resource types.
    pub fn resource_types(&self) -> impl Iterator<Item = ResourceType> + '_ {
        self.entries.keys().copied()
    }

    /// Checks that resources of `child_type` can inherit from `parent_type`.
    ///
    /// Same-type parents always can. A cross-type pair needs a mapping.
    pub fn ensure_parent_mapping(
        &self,
        child_type: ResourceType,
        parent_type: ResourceType,
    ) -> AppResult<()> {
        self.parent_mapping(child_type, parent_type).map(|_| ())
    }

    /// Translates a parent permission into the child's permission name.
    ///
    /// Same-type parents inherit 1:1. For a cross-type parent, `Ok(None)`
    /// means the mapping does not cover this permission and the grant is
    /// skipped; a missing mapping for the type pair is a configuration error.
    pub fn mapped_parent_permission(
        &self,
        child_type: ResourceType,
        parent_type: ResourceType,
        parent_permission: &PermissionKind,
    ) -> AppResult<Option<PermissionKind>> {
        Ok(match self.parent_mapping(child_type, parent_type)? {
            None => Some(parent_permission.clone()),
            Some(mapping) => mapping.get(parent_permission).cloned(),
        })
    }

    fn parent_mapping(
        &self,
        child_type: ResourceType,
        parent_type: ResourceType,
    ) -> AppResult<Option<&BTreeMap<PermissionKind, PermissionKind>>> {
        if child_type == parent_type {
            return Ok(None);
        }

        self.for_type(child_type)?
            .parent_mappings
            .get(&parent_type)
            .map(Some)
            .ok_or_else(|| {
                AppError::Configuration(format!(
                    "no permission mapping from parent type '{parent_type}' to '{child_type}'"
                ))
            })
    }

    /// Built-in catalog for surveys nested in collections.
    #[must_use]
    pub fn survey_defaults() -> Self {
        let view = PermissionKind::from_static("view");
        let change = PermissionKind::from_static("change");
        let view_submissions = PermissionKind::from_static("view_submissions");
        let add_submissions = PermissionKind::from_static("add_submissions");
        let change_submissions = PermissionKind::from_static("change_submissions");
        let delete = PermissionKind::from_static("delete");
        let share = PermissionKind::from_static("share");

        let ownership_rules = |permissions: ResourceTypePermissions| {
            permissions
                .with_calculated_rule(CalculatedRule::Owner {
                    permission: delete.clone(),
                })
                .with_calculated_rule(CalculatedRule::Editors {
                    source: change.clone(),
                    permission: share.clone(),
                })
        };

        let survey = ownership_rules(
            ResourceTypePermissions::new([
                view.clone(),
                change.clone(),
                view_submissions.clone(),
                add_submissions.clone(),
                change_submissions.clone(),
            ])
            .with_implication(change.clone(), view.clone())
            .with_implication(view_submissions.clone(), view.clone())
            .with_implication(add_submissions.clone(), view.clone())
            .with_implication(change_submissions.clone(), view_submissions.clone())
            .with_implication(change_submissions, add_submissions),
        )
        .with_parent_mapping(
            ResourceType::Collection,
            [(view.clone(), view.clone()), (change.clone(), change.clone())],
        );

        let collection = ownership_rules(
            ResourceTypePermissions::new([view.clone(), change.clone()])
                .with_implication(change.clone(), view.clone()),
        );

        Self {
            entries: BTreeMap::from([
                (ResourceType::Survey, survey),
                (ResourceType::Collection, collection),
            ]),
        }
    }
}

impl Default for PermissionCatalog {
    fn default() -> Self {
        Self::survey_defaults()
    }
}

impl TryFrom<BTreeMap<ResourceType, ResourceTypePermissions>> for PermissionCatalog {
    type Error = AppError;

    fn try_from(
        value: BTreeMap<ResourceType, ResourceTypePermissions>,
    ) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PermissionCatalog> for BTreeMap<ResourceType, ResourceTypePermissions> {
    fn from(value: PermissionCatalog) -> Self {
        value.entries
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use sharegate_core::AppError;

    use crate::{PermissionKind, ResourceType};

    use super::{CalculatedRule, PermissionCatalog, ResourceTypePermissions};

    fn permission(name: &str) -> PermissionKind {
        PermissionKind::new(name).unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn built_in_catalog_passes_validation() {
        let defaults = PermissionCatalog::survey_defaults();
        let rebuilt = PermissionCatalog::new(defaults.entries.clone());
        assert!(rebuilt.is_ok());

        for resource_type in defaults.resource_types() {
            let entry = defaults.for_type(resource_type);
            assert!(entry.is_ok());
            for name in entry
                .map(ResourceTypePermissions::all_permissions)
                .unwrap_or_default()
            {
                assert!(PermissionKind::new(name.as_str()).is_ok());
            }
        }
    }

    #[test]
    fn implications_resolve_in_both_directions() {
        let catalog = PermissionCatalog::survey_defaults();
        let survey = catalog
            .for_type(ResourceType::Survey)
            .unwrap_or_else(|_| unreachable!());

        assert!(survey.implied_permissions(&permission("change")).contains(&permission("view")));
        let reverse = survey.reverse_implied_permissions(&permission("view"));
        assert!(reverse.contains(&permission("change")));
        assert!(reverse.contains(&permission("view_submissions")));
        assert!(!reverse.contains(&permission("change_submissions")));
    }

    #[test]
    fn calculated_permissions_are_not_assignable() {
        let catalog = PermissionCatalog::survey_defaults();
        let survey = catalog
            .for_type(ResourceType::Survey)
            .unwrap_or_else(|_| unreachable!());

        assert!(survey.is_calculated(&permission("delete")));
        assert!(survey.is_calculated(&permission("share")));
        assert!(!survey.is_assignable(&permission("delete")));
        assert_eq!(survey.calculated_permissions().len(), 2);
    }

    #[test]
    fn parent_mapping_is_bypassed_for_same_type() {
        let catalog = PermissionCatalog::survey_defaults();
        let mapped = catalog.mapped_parent_permission(
            ResourceType::Collection,
            ResourceType::Collection,
            &permission("change"),
        );
        assert!(matches!(mapped, Ok(Some(ref value)) if value == &permission("change")));
    }

    #[test]
    fn cross_type_mapping_translates_parent_permission() {
        let catalog = PermissionCatalog::survey_defaults();
        let mapped = catalog.mapped_parent_permission(
            ResourceType::Survey,
            ResourceType::Collection,
            &permission("view"),
        );
        assert!(matches!(mapped, Ok(Some(ref value)) if value == &permission("view")));
    }

    #[test]
    fn missing_cross_type_mapping_is_a_configuration_error() {
        let catalog = PermissionCatalog::survey_defaults();
        let mapped = catalog.mapped_parent_permission(
            ResourceType::Collection,
            ResourceType::Survey,
            &permission("view"),
        );
        assert!(matches!(mapped, Err(AppError::Configuration(_))));
        assert!(matches!(
            catalog.ensure_parent_mapping(ResourceType::Collection, ResourceType::Survey),
            Err(AppError::Configuration(_))
        ));
        assert!(
            catalog
                .ensure_parent_mapping(ResourceType::Survey, ResourceType::Collection)
                .is_ok()
        );
    }

    #[test]
    fn overlapping_assignable_and_calculated_is_rejected() {
        let entry = ResourceTypePermissions::new([permission("view"), permission("delete")])
            .with_calculated_rule(CalculatedRule::Owner {
                permission: permission("delete"),
            });
        let catalog = PermissionCatalog::new(BTreeMap::from([(ResourceType::Survey, entry)]));
        assert!(matches!(catalog, Err(AppError::Configuration(_))));
    }

    #[test]
    fn cyclic_implications_are_rejected() {
        let entry = ResourceTypePermissions::new([permission("view"), permission("change")])
            .with_implication(permission("view"), permission("change"))
            .with_implication(permission("change"), permission("view"));
        let catalog = PermissionCatalog::new(BTreeMap::from([(ResourceType::Survey, entry)]));
        assert!(matches!(catalog, Err(AppError::Configuration(_))));
    }

    #[test]
    fn catalog_loads_from_json_document() {
        let document = r#"{
            "collection": {
                "assignable": ["view", "change"],
                "implied": { "change": ["view"] },
                "calculated": [{ "rule": "owner", "permission": "delete" }]
            },
            "survey": {
                "assignable": ["view"],
                "parent_mappings": { "collection": { "view": "view" } }
            }
        }"#;

        let catalog = PermissionCatalog::from_json_str(document);
        assert!(catalog.is_ok());
        let mapped = catalog.and_then(|catalog| {
            catalog.mapped_parent_permission(
                ResourceType::Survey,
                ResourceType::Collection,
                &permission("change"),
            )
        });
        assert!(matches!(mapped, Ok(None)));
    }

    #[test]
    fn json_document_with_unknown_permission_name_is_rejected() {
        let document = r#"{ "survey": { "assignable": ["View"] } }"#;
        assert!(matches!(
            PermissionCatalog::from_json_str(document),
            Err(AppError::Configuration(_))
        ));
    }
}
