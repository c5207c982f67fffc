mod audit;
mod grant_repository;
mod resource_hierarchy;

pub use audit::{AuditEvent, AuditRepository};
pub use grant_repository::{GrantChange, GrantChangeSet, GrantRepository};
pub use resource_hierarchy::ResourceHierarchy;
