//! Folder tree building.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use warden_authz::Checker;
use warden_core::{AppError, AppResult, RequestContext};
use warden_database::repositories::folder::FolderRepository;
use warden_entity::folder::model::{Folder, FolderTreeNode};
use warden_entity::permission::ResourceType;

/// Default depth cap when none is requested.
const DEFAULT_MAX_DEPTH: i32 = 10;

/// Builds depth-limited folder forests.
#[derive(Clone)]
pub struct TreeService {
    folder_repo: Arc<FolderRepository>,
    checker: Checker,
}

impl TreeService {
    /// Creates a new tree service.
    pub fn new(folder_repo: Arc<FolderRepository>, checker: Checker) -> Self {
        Self {
            folder_repo,
            checker,
        }
    }

    /// Returns a depth-limited forest rooted either at `root_id` or at
    /// every root folder of the tenant, with optional content counts.
    pub async fn get_tree(
        &self,
        ctx: &RequestContext,
        root_id: Option<Uuid>,
        max_depth: Option<i32>,
        include_counts: bool,
    ) -> AppResult<Vec<FolderTreeNode>> {
        let max_depth = max_depth.filter(|d| *d > 0).unwrap_or(DEFAULT_MAX_DEPTH);

        let roots = match root_id {
            Some(root_id) => {
                self.checker
                    .require_read(ctx, ResourceType::Folder, root_id)
                    .await?;
                let root = self
                    .folder_repo
                    .find_by_id(ctx.tenant_id, root_id)
                    .await?
                    .ok_or_else(|| AppError::not_found("Root folder not found"))?;
                vec![root]
            }
            None => self.folder_repo.find_roots(ctx.tenant_id).await?,
        };

        let mut forest = Vec::with_capacity(roots.len());
        for root in roots {
            let descendants = self
                .folder_repo
                .find_descendants(ctx.tenant_id, &root.path)
                .await?;

            let counts = if include_counts {
                let mut counts = HashMap::new();
                for folder in std::iter::once(&root).chain(descendants.iter()) {
                    let secrets = self
                        .folder_repo
                        .count_secrets(ctx.tenant_id, folder.id)
                        .await?;
                    counts.insert(folder.id, secrets);
                }
                Some(counts)
            } else {
                None
            };

            forest.push(build_node(root, &descendants, counts.as_ref(), 0, max_depth));
        }

        Ok(forest)
    }
}

/// Assembles a subtree from the flat descendant list.
fn build_node(
    folder: Folder,
    all: &[Folder],
    counts: Option<&HashMap<Uuid, u64>>,
    depth: i32,
    max_depth: i32,
) -> FolderTreeNode {
    let children: Vec<FolderTreeNode> = if depth < max_depth {
        all.iter()
            .filter(|f| f.parent_id == Some(folder.id))
            .map(|child| build_node(child.clone(), all, counts, depth + 1, max_depth))
            .collect()
    } else {
        Vec::new()
    };

    let subfolder_count = counts.map(|_| {
        all.iter()
            .filter(|f| f.parent_id == Some(folder.id))
            .count() as u64
    });

    FolderTreeNode {
        secret_count: counts.map(|c| *c.get(&folder.id).unwrap_or(&0)),
        subfolder_count,
        folder,
        children,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn folder(id: Uuid, parent: Option<Uuid>, name: &str, path: &str, depth: i32) -> Folder {
        Folder {
            id,
            tenant_id: 7,
            parent_id: parent,
            name: name.to_string(),
            path: path.to_string(),
            description: None,
            depth,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_build_node_nests_children() {
        let root_id = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let root = folder(root_id, None, "Root", "/Root", 0);
        let descendants = vec![
            folder(a, Some(root_id), "A", "/Root/A", 1),
            folder(b, Some(a), "B", "/Root/A/B", 2),
        ];

        let tree = build_node(root, &descendants, None, 0, 10);
        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.children[0].folder.name, "A");
        assert_eq!(tree.children[0].children.len(), 1);
        assert_eq!(tree.children[0].children[0].folder.name, "B");
        assert!(tree.secret_count.is_none());
    }

    #[test]
    fn test_build_node_depth_cap() {
        let root_id = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let root = folder(root_id, None, "Root", "/Root", 0);
        let descendants = vec![
            folder(a, Some(root_id), "A", "/Root/A", 1),
            folder(b, Some(a), "B", "/Root/A/B", 2),
        ];

        let tree = build_node(root, &descendants, None, 0, 1);
        assert_eq!(tree.children.len(), 1);
        assert!(tree.children[0].children.is_empty());
    }

    #[test]
    fn test_build_node_counts() {
        let root_id = Uuid::new_v4();
        let a = Uuid::new_v4();
        let root = folder(root_id, None, "Root", "/Root", 0);
        let descendants = vec![folder(a, Some(root_id), "A", "/Root/A", 1)];
        let mut counts = HashMap::new();
        counts.insert(root_id, 3u64);

        let tree = build_node(root, &descendants, Some(&counts), 0, 10);
        assert_eq!(tree.secret_count, Some(3));
        assert_eq!(tree.subfolder_count, Some(1));
        assert_eq!(tree.children[0].secret_count, Some(0));
        assert_eq!(tree.children[0].subfolder_count, Some(0));
    }
}
