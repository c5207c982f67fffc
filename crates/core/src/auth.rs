use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authenticated user information handed over by the host's login layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    user_id: Uuid,
    is_superuser: bool,
}

impl AuthenticatedUser {
    /// Creates an authenticated user from session data.
    #[must_use]
    pub fn new(user_id: Uuid, is_superuser: bool) -> Self {
        Self {
            user_id,
            is_superuser,
        }
    }

    /// Returns the stable user identifier.
    #[must_use]
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    /// Returns whether the user bypasses object-level checks.
    #[must_use]
    pub fn is_superuser(&self) -> bool {
        self.is_superuser
    }
}

/// Authentication principal as seen by the host before identity resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Principal {
    /// Request carried a valid session.
    Authenticated(AuthenticatedUser),
    /// Request carried no session at all.
    Unauthenticated,
}

impl Principal {
    /// Shorthand for a regular authenticated user.
    #[must_use]
    pub fn user(user_id: Uuid) -> Self {
        Self::Authenticated(AuthenticatedUser::new(user_id, false))
    }

    /// Shorthand for an authenticated superuser.
    #[must_use]
    pub fn superuser(user_id: Uuid) -> Self {
        Self::Authenticated(AuthenticatedUser::new(user_id, true))
    }
}
