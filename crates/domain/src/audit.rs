use serde::{Deserialize, Serialize};

/// Stable audit actions emitted by permission mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Emitted when an explicit grant is recorded.
    PermissionGranted,
    /// Emitted when an explicit deny is recorded.
    PermissionDenied,
    /// Emitted when an explicit record is removed.
    PermissionRemoved,
    /// Emitted when a permission is revoked, including inherited access.
    PermissionRevoked,
    /// Emitted when explicit records are copied between resources.
    PermissionsCopied,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PermissionGranted => "permission.granted",
            Self::PermissionDenied => "permission.denied",
            Self::PermissionRemoved => "permission.removed",
            Self::PermissionRevoked => "permission.revoked",
            Self::PermissionsCopied => "permission.copied",
        }
    }
}
