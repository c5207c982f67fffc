use async_trait::async_trait;
use sharegate_core::AppResult;
use sharegate_domain::{AuditAction, Identity, PermissionKind, ResourceRef};

/// Immutable audit event payload emitted by permission mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// Stable audit action identifier.
    pub action: AuditAction,
    /// Resource whose records changed.
    pub resource: ResourceRef,
    /// Identity the mutation applied to, when it targeted one.
    pub identity: Option<Identity>,
    /// Permission the mutation applied to, when it targeted one.
    pub permission: Option<PermissionKind>,
    /// Optional audit detail payload.
    pub detail: Option<String>,
}

/// Port for persisting append-only audit events.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Persists one audit event.
    async fn append_event(&self, event: AuditEvent) -> AppResult<()>;
}
