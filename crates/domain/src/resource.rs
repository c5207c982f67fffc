use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sharegate_core::{AppError, AppResult, NonEmptyString};

use crate::Identity;

/// Concrete kind of a shareable resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// A survey or form definition.
    Survey,
    /// A collection grouping surveys and other collections.
    Collection,
}

impl ResourceType {
    /// Returns a stable storage value for this resource type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Survey => "survey",
            Self::Collection => "collection",
        }
    }

    /// Returns all known resource types.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[ResourceType] = &[ResourceType::Survey, ResourceType::Collection];

        ALL
    }
}

impl FromStr for ResourceType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "survey" => Ok(Self::Survey),
            "collection" => Ok(Self::Collection),
            _ => Err(AppError::Validation(format!(
                "unknown resource type '{value}'"
            ))),
        }
    }
}

impl Display for ResourceType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Typed handle to a resource: discriminant plus opaque identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    resource_type: ResourceType,
    resource_id: NonEmptyString,
}

impl ResourceRef {
    /// Creates a resource handle. Identifiers are unique per resource type.
    pub fn new(resource_type: ResourceType, resource_id: impl Into<String>) -> AppResult<Self> {
        Ok(Self {
            resource_type,
            resource_id: NonEmptyString::new(resource_id)?,
        })
    }

    /// Returns the resource type discriminant.
    #[must_use]
    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    /// Returns the opaque resource identifier.
    #[must_use]
    pub fn resource_id(&self) -> &str {
        self.resource_id.as_str()
    }
}

impl Display for ResourceRef {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}:{}", self.resource_type, self.resource_id)
    }
}

/// Shareable resource as supplied by the hierarchy provider.
///
/// Parents form a forest. Acyclicity is guaranteed by the host and is not
/// re-checked here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    resource_ref: ResourceRef,
    owner: Option<Identity>,
    parent: Option<ResourceRef>,
    editors_can_change_permissions: bool,
}

impl Resource {
    /// Creates an unowned root resource.
    #[must_use]
    pub fn new(resource_ref: ResourceRef) -> Self {
        Self {
            resource_ref,
            owner: None,
            parent: None,
            editors_can_change_permissions: false,
        }
    }

    /// Returns the resource with the given owner.
    #[must_use]
    pub fn with_owner(mut self, owner: Identity) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Returns the resource attached below `parent`.
    pub fn with_parent(mut self, parent: ResourceRef) -> AppResult<Self> {
        if parent == self.resource_ref {
            return Err(AppError::Validation(format!(
                "resource '{}' cannot be its own parent",
                self.resource_ref
            )));
        }

        self.parent = Some(parent);
        Ok(self)
    }

    /// Returns the resource with the editor sharing policy flag set.
    #[must_use]
    pub fn with_editors_can_change_permissions(mut self, enabled: bool) -> Self {
        self.editors_can_change_permissions = enabled;
        self
    }

    /// Returns the typed handle.
    #[must_use]
    pub fn resource_ref(&self) -> &ResourceRef {
        &self.resource_ref
    }

    /// Returns the resource type discriminant.
    #[must_use]
    pub fn resource_type(&self) -> ResourceType {
        self.resource_ref.resource_type()
    }

    /// Returns the owner, if any.
    #[must_use]
    pub fn owner(&self) -> Option<&Identity> {
        self.owner.as_ref()
    }

    /// Returns the parent handle, if any.
    #[must_use]
    pub fn parent(&self) -> Option<&ResourceRef> {
        self.parent.as_ref()
    }

    /// Returns whether holders of the editor permission may also share.
    #[must_use]
    pub fn editors_can_change_permissions(&self) -> bool {
        self.editors_can_change_permissions
    }
}
