//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_audit_repository;
mod in_memory_grant_repository;
mod in_memory_resource_hierarchy;
mod postgres_audit_repository;
mod postgres_grant_repository;
mod postgres_resource_hierarchy;

pub use in_memory_audit_repository::InMemoryAuditRepository;
pub use in_memory_grant_repository::InMemoryGrantRepository;
pub use in_memory_resource_hierarchy::InMemoryResourceHierarchy;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_grant_repository::PostgresGrantRepository;
pub use postgres_resource_hierarchy::PostgresResourceHierarchy;
