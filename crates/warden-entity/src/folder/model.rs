//! Folder entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A folder in the secret hierarchy.
///
/// Invariants: for a folder with parent P, `path = P.path + "/" + name` and
/// `depth = P.depth + 1`; roots have `path = "/" + name` and `depth = 0`.
/// `(parent_id, name)` and `path` are unique per tenant.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Folder {
    /// Unique folder identifier.
    pub id: Uuid,
    /// Tenant owning the folder.
    pub tenant_id: i64,
    /// Parent folder ID (null for root folders).
    pub parent_id: Option<Uuid>,
    /// Folder name.
    pub name: String,
    /// Full materialized path (e.g., `/engineering/databases`).
    pub path: String,
    /// Optional description.
    pub description: Option<String>,
    /// Depth in the folder tree (0 for root).
    pub depth: i32,
    /// User who created the folder.
    pub created_by: Option<i64>,
    /// When the folder was created.
    pub created_at: DateTime<Utc>,
    /// When the folder was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Folder {
    /// Check if this is a root folder (no parent).
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Data required to create a new folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFolder {
    /// Tenant owning the folder.
    pub tenant_id: u32,
    /// Parent folder (None for root).
    pub parent_id: Option<Uuid>,
    /// Folder name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// User creating the folder.
    pub created_by: Option<u32>,
}

/// A node in a folder tree, optionally annotated with content counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderTreeNode {
    /// The folder at this node.
    pub folder: Folder,
    /// Number of secrets directly in this folder (when counts are requested).
    pub secret_count: Option<u64>,
    /// Number of direct subfolders (when counts are requested).
    pub subfolder_count: Option<u64>,
    /// Child nodes, depth-limited.
    pub children: Vec<FolderTreeNode>,
}

/// Compose the materialized path of a child under `parent_path`.
///
/// A `None` parent produces a root path.
pub fn child_path(parent_path: Option<&str>, name: &str) -> String {
    match parent_path {
        Some(parent) => format!("{parent}/{name}"),
        None => format!("/{name}"),
    }
}

/// Whether `candidate` lies strictly inside the subtree rooted at `ancestor_path`.
pub fn is_descendant_path(ancestor_path: &str, candidate: &str) -> bool {
    candidate.starts_with(&format!("{ancestor_path}/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_path() {
        assert_eq!(child_path(None, "Root"), "/Root");
        assert_eq!(child_path(Some("/Root"), "Sub"), "/Root/Sub");
    }

    #[test]
    fn test_is_descendant_path() {
        assert!(is_descendant_path("/A", "/A/B"));
        assert!(is_descendant_path("/A", "/A/B/C"));
        assert!(!is_descendant_path("/A", "/A"));
        assert!(!is_descendant_path("/A", "/AB"));
        assert!(!is_descendant_path("/A/B", "/A"));
    }

}
