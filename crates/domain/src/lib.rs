//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod audit;
mod catalog;
mod grant;
mod identity;
mod permission;
mod resource;

pub use audit::AuditAction;
pub use catalog::{CalculatedRule, PermissionCatalog, ResourceTypePermissions};
pub use grant::{GrantFilter, GrantRecord};
pub use identity::{Identity, Subject, UserId};
pub use permission::PermissionKind;
pub use resource::{Resource, ResourceRef, ResourceType};
