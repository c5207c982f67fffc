use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sharegate_core::{AppError, AppResult};

/// Symbolic permission name such as `view` or `change_submissions`.
///
/// Names are configuration data supplied through the permission catalog, so
/// this is a validated string rather than a closed enum. Valid names start
/// with a lowercase ASCII letter and contain only lowercase ASCII letters,
/// digits and underscores.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionKind(String);

impl PermissionKind {
    /// Creates a validated permission name.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let mut characters = value.chars();

        let starts_with_letter = characters
            .next()
            .is_some_and(|character| character.is_ascii_lowercase());
        if !starts_with_letter {
            return Err(AppError::Validation(format!(
                "permission '{value}' must start with a lowercase letter"
            )));
        }

        if !characters.all(|character| {
            character.is_ascii_lowercase() || character.is_ascii_digit() || character == '_'
        }) {
            return Err(AppError::Validation(format!(
                "permission '{value}' may only contain lowercase letters, digits and underscores"
            )));
        }

        Ok(Self(value))
    }

    /// Wraps a compile-time name used by built-in configuration.
    ///
    /// Names are validated in debug builds only.
    #[must_use]
    pub fn from_static(value: &'static str) -> Self {
        debug_assert!(Self::new(value).is_ok(), "invalid built-in permission '{value}'");
        Self(value.to_owned())
    }

    /// Returns the permission name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for PermissionKind {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PermissionKind> for String {
    fn from(value: PermissionKind) -> Self {
        value.0
    }
}

impl FromStr for PermissionKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::new(value)
    }
}

impl Display for PermissionKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}
