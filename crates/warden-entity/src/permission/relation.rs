//! The closed relation algebra.
//!
//! Relations map onto fixed permission sets:
//!
//! | Relation | Grants |
//! |----------|--------|
//! | Owner    | Read, Write, Delete, Share |
//! | Editor   | Read, Write |
//! | Viewer   | Read |
//! | Sharer   | Read, Share |
//!
//! Relations are totally ordered by permission-set size, ties broken by the
//! fixed rank Owner > Editor > Sharer > Viewer. All operations here are pure.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use warden_core::AppError;

/// Conventional subject id for tenant-wide grants.
pub const TENANT_WIDE_SUBJECT: &str = "all";

/// A role-like label on a permission tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "relation", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    /// Full control: read, write, delete, share.
    Owner,
    /// Modify access: read, write.
    Editor,
    /// Read-only access.
    Viewer,
    /// Read and re-share access.
    Sharer,
}

/// An action that can be performed on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// View the resource.
    Read,
    /// Modify the resource.
    Write,
    /// Delete the resource.
    Delete,
    /// Share the resource with others.
    Share,
}

/// All permissions, in evaluation order.
pub const ALL_PERMISSIONS: [Permission; 4] = [
    Permission::Read,
    Permission::Write,
    Permission::Delete,
    Permission::Share,
];

/// The type of resource being protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "resource_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    /// A folder resource.
    Folder,
    /// A secret resource.
    Secret,
}

/// The type of entity being granted access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subject_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubjectType {
    /// A single user.
    User,
    /// A role held by users.
    Role,
    /// The whole tenant (subject id [`TENANT_WIDE_SUBJECT`]).
    Tenant,
}

impl Relation {
    /// The permissions this relation grants.
    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            Self::Owner => &[
                Permission::Read,
                Permission::Write,
                Permission::Delete,
                Permission::Share,
            ],
            Self::Editor => &[Permission::Read, Permission::Write],
            Self::Viewer => &[Permission::Read],
            Self::Sharer => &[Permission::Read, Permission::Share],
        }
    }

    /// Whether this relation grants the given permission.
    pub fn grants(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    /// Rank used for tie-breaking between relations. Higher wins.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Owner => 4,
            Self::Editor => 3,
            Self::Sharer => 2,
            Self::Viewer => 1,
        }
    }

    /// Whether this relation is at least as privileged as `other`.
    pub fn at_least(&self, other: Relation) -> bool {
        self.rank() >= other.rank()
    }

    /// The most privileged relation among `relations`, if any.
    pub fn highest(relations: &[Relation]) -> Option<Relation> {
        relations.iter().copied().max_by_key(Relation::rank)
    }

    /// Return the relation as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Editor => "editor",
            Self::Viewer => "viewer",
            Self::Sharer => "sharer",
        }
    }
}

impl Permission {
    /// Return the permission as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Delete => "delete",
            Self::Share => "share",
        }
    }
}

impl ResourceType {
    /// Return the type as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Folder => "folder",
            Self::Secret => "secret",
        }
    }
}

impl SubjectType {
    /// Return the type as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Role => "role",
            Self::Tenant => "tenant",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for SubjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Relation {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "owner" => Ok(Self::Owner),
            "editor" => Ok(Self::Editor),
            "viewer" => Ok(Self::Viewer),
            "sharer" => Ok(Self::Sharer),
            _ => Err(AppError::validation(format!("Invalid relation: '{s}'"))),
        }
    }
}

impl FromStr for Permission {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "delete" => Ok(Self::Delete),
            "share" => Ok(Self::Share),
            _ => Err(AppError::validation(format!("Invalid permission: '{s}'"))),
        }
    }
}

impl FromStr for ResourceType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "folder" => Ok(Self::Folder),
            "secret" => Ok(Self::Secret),
            _ => Err(AppError::validation(format!(
                "Invalid resource type: '{s}'"
            ))),
        }
    }
}

impl FromStr for SubjectType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Self::User),
            "role" => Ok(Self::Role),
            "tenant" => Ok(Self::Tenant),
            _ => Err(AppError::validation(format!("Invalid subject type: '{s}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grants_table() {
        assert!(Relation::Owner.grants(Permission::Read));
        assert!(Relation::Owner.grants(Permission::Write));
        assert!(Relation::Owner.grants(Permission::Delete));
        assert!(Relation::Owner.grants(Permission::Share));

        assert!(Relation::Editor.grants(Permission::Read));
        assert!(Relation::Editor.grants(Permission::Write));
        assert!(!Relation::Editor.grants(Permission::Delete));
        assert!(!Relation::Editor.grants(Permission::Share));

        assert!(Relation::Viewer.grants(Permission::Read));
        assert!(!Relation::Viewer.grants(Permission::Write));
        assert!(!Relation::Viewer.grants(Permission::Delete));
        assert!(!Relation::Viewer.grants(Permission::Share));

        assert!(Relation::Sharer.grants(Permission::Read));
        assert!(!Relation::Sharer.grants(Permission::Write));
        assert!(!Relation::Sharer.grants(Permission::Delete));
        assert!(Relation::Sharer.grants(Permission::Share));
    }

    #[test]
    fn test_ordering() {
        assert!(Relation::Owner.at_least(Relation::Editor));
        assert!(Relation::Editor.at_least(Relation::Sharer));
        assert!(Relation::Sharer.at_least(Relation::Viewer));
        assert!(Relation::Viewer.at_least(Relation::Viewer));
        assert!(!Relation::Viewer.at_least(Relation::Sharer));
    }

    #[test]
    fn test_highest() {
        assert_eq!(Relation::highest(&[]), None);
        assert_eq!(
            Relation::highest(&[Relation::Viewer, Relation::Editor, Relation::Sharer]),
            Some(Relation::Editor)
        );
        assert_eq!(
            Relation::highest(&[Relation::Viewer, Relation::Owner]),
            Some(Relation::Owner)
        );
    }

    #[test]
    fn test_round_trip_strings() {
        for rel in [
            Relation::Owner,
            Relation::Editor,
            Relation::Viewer,
            Relation::Sharer,
        ] {
            assert_eq!(rel.as_str().parse::<Relation>().unwrap(), rel);
        }
        assert!("commenter".parse::<Relation>().is_err());
    }
}
