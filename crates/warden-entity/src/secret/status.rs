//! Secret status enumeration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use warden_core::AppError;

/// Lifecycle status of a secret.
///
/// A soft delete flips the status to `Deleted`; the vault object is only
/// removed on permanent delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "secret_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SecretStatus {
    /// The secret is in active use.
    Active,
    /// The secret is retained but no longer in rotation.
    Archived,
    /// The secret is soft-deleted.
    Deleted,
}

impl SecretStatus {
    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for SecretStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SecretStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "archived" => Ok(Self::Archived),
            "deleted" => Ok(Self::Deleted),
            _ => Err(AppError::validation(format!(
                "Invalid secret status: '{s}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        for status in [
            SecretStatus::Active,
            SecretStatus::Archived,
            SecretStatus::Deleted,
        ] {
            assert_eq!(status.as_str().parse::<SecretStatus>().unwrap(), status);
        }
        assert!("unspecified".parse::<SecretStatus>().is_err());
    }
}
