//! Identities that can hold grant records.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sharegate_core::AppError;
use uuid::Uuid;

const ANONYMOUS_STORAGE_VALUE: &str = "anonymous";

/// Unique identifier for a user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a new random user identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a user identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for UserId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Subject of a grant record: a concrete user or the public.
///
/// `Anonymous` is a real value rather than an absent user, so it can own
/// grant records like any user. It is additionally constrained by the
/// anonymous allow-list wherever grants are written or read.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Identity {
    /// A named user.
    User(UserId),
    /// The public, unauthenticated identity.
    Anonymous,
}

impl Identity {
    /// Returns whether this is the anonymous identity.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    /// Returns the user identifier for named identities.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User(user_id) => Some(*user_id),
            Self::Anonymous => None,
        }
    }

    /// Returns a stable storage value for this identity.
    #[must_use]
    pub fn as_storage_value(&self) -> String {
        match self {
            Self::User(user_id) => user_id.to_string(),
            Self::Anonymous => ANONYMOUS_STORAGE_VALUE.to_owned(),
        }
    }
}

impl From<UserId> for Identity {
    fn from(value: UserId) -> Self {
        Self::User(value)
    }
}

impl Display for Identity {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(user_id) => write!(formatter, "user:{user_id}"),
            Self::Anonymous => formatter.write_str(ANONYMOUS_STORAGE_VALUE),
        }
    }
}

impl FromStr for Identity {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value == ANONYMOUS_STORAGE_VALUE {
            return Ok(Self::Anonymous);
        }

        Uuid::parse_str(value)
            .map(|uuid| Self::User(UserId::from_uuid(uuid)))
            .map_err(|error| AppError::Validation(format!("invalid identity '{value}': {error}")))
    }
}

/// Resolved identity plus the superuser bypass flag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subject {
    identity: Identity,
    is_superuser: bool,
}

impl Subject {
    /// Creates a subject for a resolved identity.
    #[must_use]
    pub fn new(identity: Identity, is_superuser: bool) -> Self {
        Self {
            identity,
            is_superuser,
        }
    }

    /// Creates the anonymous subject. Anonymous is never a superuser.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::new(Identity::Anonymous, false)
    }

    /// Returns the resolved identity.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Returns whether object-level checks are bypassed.
    #[must_use]
    pub fn is_superuser(&self) -> bool {
        self.is_superuser
    }

    /// Returns whether the subject resolved to the anonymous identity.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.identity.is_anonymous()
    }
}

impl From<Identity> for Subject {
    fn from(value: Identity) -> Self {
        Self::new(value, false)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{Identity, Subject, UserId};

    #[test]
    fn identity_storage_value_roundtrips() {
        let user = Identity::User(UserId::new());
        let restored = Identity::from_str(user.as_storage_value().as_str());
        assert!(matches!(restored, Ok(ref value) if value == &user));

        let anonymous = Identity::from_str("anonymous");
        assert!(matches!(anonymous, Ok(Identity::Anonymous)));
    }

    #[test]
    fn malformed_identity_is_rejected() {
        assert!(Identity::from_str("bob").is_err());
    }

    #[test]
    fn subject_from_identity_is_not_superuser() {
        let subject = Subject::from(Identity::User(UserId::new()));
        assert!(!subject.is_superuser());
        assert!(!subject.is_anonymous());
        assert!(Subject::anonymous().is_anonymous());
    }
}
