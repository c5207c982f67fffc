//! Application services and ports.

#![forbid(unsafe_code)]

mod authorization_service;
mod engine_config;
mod identity_resolver;
mod inheritance_propagator;
mod permission_engine;
mod permission_ports;

#[cfg(test)]
mod test_support;

pub use authorization_service::AuthorizationService;
pub use engine_config::PermissionEngineConfig;
pub use identity_resolver::IdentityResolver;
pub use permission_engine::{
    IdentitiesWithPermission, PermissionEngine, PermissionResolution, Recalculation,
};
pub use permission_ports::{
    AuditEvent, AuditRepository, GrantChange, GrantChangeSet, GrantRepository, ResourceHierarchy,
};
