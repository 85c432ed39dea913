//! Folder repository: tree-shaped catalog rows with materialized paths.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use warden_core::error::{AppError, ErrorKind};
use warden_core::result::AppResult;
use warden_core::types::pagination::{PageRequest, PageResponse};
use warden_entity::folder::model::{child_path, is_descendant_path, CreateFolder, Folder};

/// Repository for folder CRUD and subtree queries.
///
/// Subtree queries run on the materialized `path` column by string prefix;
/// parent pointers are never chased recursively at query time.
#[derive(Debug, Clone)]
pub struct FolderRepository {
    pool: PgPool,
}

impl FolderRepository {
    /// Create a new folder repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a folder by ID within a tenant.
    pub async fn find_by_id(&self, tenant_id: u32, id: Uuid) -> AppResult<Option<Folder>> {
        sqlx::query_as::<_, Folder>(
            "SELECT * FROM warden_folders WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id as i64)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find folder", e))
    }

    /// List root folders of a tenant.
    pub async fn find_roots(&self, tenant_id: u32) -> AppResult<Vec<Folder>> {
        sqlx::query_as::<_, Folder>(
            "SELECT * FROM warden_folders \
             WHERE tenant_id = $1 AND parent_id IS NULL ORDER BY name ASC",
        )
        .bind(tenant_id as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list root folders", e))
    }

    /// List direct children of a folder.
    pub async fn find_children(&self, tenant_id: u32, parent_id: Uuid) -> AppResult<Vec<Folder>> {
        sqlx::query_as::<_, Folder>(
            "SELECT * FROM warden_folders \
             WHERE tenant_id = $1 AND parent_id = $2 ORDER BY name ASC",
        )
        .bind(tenant_id as i64)
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list children", e))
    }

    /// All folders strictly inside the subtree rooted at `path`, ordered by
    /// depth so parents precede children.
    pub async fn find_descendants(&self, tenant_id: u32, path: &str) -> AppResult<Vec<Folder>> {
        sqlx::query_as::<_, Folder>(
            "SELECT * FROM warden_folders \
             WHERE tenant_id = $1 AND path LIKE $2 ORDER BY depth ASC, name ASC",
        )
        .bind(tenant_id as i64)
        .bind(format!("{}/%", escape_like(path)))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list descendants", e))
    }

    /// Paged folder listing with optional parent and name filters.
    ///
    /// `parent_id = Some(None)` selects root-level folders.
    pub async fn list(
        &self,
        tenant_id: u32,
        parent_id: Option<Option<Uuid>>,
        name_contains: Option<&str>,
        page: &PageRequest,
    ) -> AppResult<PageResponse<Folder>> {
        const WHERE: &str = "tenant_id = $1 \
             AND ($2::uuid IS NULL OR parent_id = $2) \
             AND (NOT $3 OR parent_id IS NULL) \
             AND ($4::text IS NULL OR name ILIKE $4)";

        let parent_bind = parent_id.flatten();
        let roots_only = matches!(parent_id, Some(None));
        let name_bind = name_contains.map(|n| format!("%{}%", escape_like(n)));

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM warden_folders WHERE {WHERE}"
        ))
        .bind(tenant_id as i64)
        .bind(parent_bind)
        .bind(roots_only)
        .bind(name_bind.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count folders", e))?;

        let folders = sqlx::query_as::<_, Folder>(&format!(
            "SELECT * FROM warden_folders WHERE {WHERE} ORDER BY name ASC LIMIT $5 OFFSET $6"
        ))
        .bind(tenant_id as i64)
        .bind(parent_bind)
        .bind(roots_only)
        .bind(name_bind.as_deref())
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list folders", e))?;

        Ok(PageResponse::new(
            folders,
            page.page,
            page.page_size,
            total as u64,
        ))
    }

    /// Create a new folder, computing `path` and `depth` from the parent.
    pub async fn create(&self, data: &CreateFolder) -> AppResult<Folder> {
        let (path, depth) = match data.parent_id {
            Some(parent_id) => {
                let parent = self
                    .find_by_id(data.tenant_id, parent_id)
                    .await?
                    .ok_or_else(|| AppError::not_found("Parent folder not found"))?;
                (child_path(Some(&parent.path), &data.name), parent.depth + 1)
            }
            None => (child_path(None, &data.name), 0),
        };

        sqlx::query_as::<_, Folder>(
            "INSERT INTO warden_folders \
             (id, tenant_id, parent_id, name, path, description, depth, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(data.tenant_id as i64)
        .bind(data.parent_id)
        .bind(&data.name)
        .bind(&path)
        .bind(data.description.as_deref())
        .bind(depth)
        .bind(data.created_by.map(|v| v as i64))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_folder_conflict(e, &path))
    }

    /// Rename a folder and/or update its description.
    ///
    /// A rename recomputes the materialized path and rewrites every
    /// descendant path so child paths keep matching their parents.
    pub async fn update(
        &self,
        tenant_id: u32,
        id: Uuid,
        name: Option<&str>,
        description: Option<&str>,
    ) -> AppResult<Folder> {
        let folder = self
            .find_by_id(tenant_id, id)
            .await?
            .ok_or_else(|| AppError::not_found("Folder not found"))?;

        let new_name = name.unwrap_or(&folder.name).to_string();
        let parent_path = match folder.path.rfind('/') {
            Some(0) | None => None,
            Some(idx) => Some(folder.path[..idx].to_string()),
        };
        let new_path = child_path(parent_path.as_deref(), &new_name);

        let updated = sqlx::query_as::<_, Folder>(
            "UPDATE warden_folders \
             SET name = $3, path = $4, description = COALESCE($5, description), \
                 updated_at = $6 \
             WHERE tenant_id = $1 AND id = $2 RETURNING *",
        )
        .bind(tenant_id as i64)
        .bind(id)
        .bind(&new_name)
        .bind(&new_path)
        .bind(description)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_folder_conflict(e, &new_path))?
        .ok_or_else(|| AppError::not_found("Folder not found"))?;

        if new_path != folder.path {
            self.rewrite_descendant_paths(tenant_id, &folder.path, &new_path)
                .await?;
        }

        Ok(updated)
    }

    /// Move a folder under a new parent (or to the root when `None`).
    ///
    /// Rejects self-referential and descendant targets, then updates the
    /// node and rewrites all descendant paths in one statement.
    pub async fn move_folder(
        &self,
        tenant_id: u32,
        id: Uuid,
        new_parent_id: Option<Uuid>,
    ) -> AppResult<Folder> {
        let folder = self
            .find_by_id(tenant_id, id)
            .await?
            .ok_or_else(|| AppError::not_found("Folder not found"))?;

        let (new_path, new_depth) = match new_parent_id {
            Some(parent_id) => {
                if parent_id == id {
                    return Err(AppError::circular_reference(
                        "cannot move folder into itself",
                    ));
                }
                let parent = self
                    .find_by_id(tenant_id, parent_id)
                    .await?
                    .ok_or_else(|| AppError::not_found("New parent folder not found"))?;
                if is_descendant_path(&folder.path, &parent.path) {
                    return Err(AppError::circular_reference(
                        "cannot move folder into its own descendant",
                    ));
                }
                (
                    child_path(Some(&parent.path), &folder.name),
                    parent.depth + 1,
                )
            }
            None => (child_path(None, &folder.name), 0),
        };

        let moved = sqlx::query_as::<_, Folder>(
            "UPDATE warden_folders \
             SET parent_id = $3, path = $4, depth = $5, updated_at = $6 \
             WHERE tenant_id = $1 AND id = $2 RETURNING *",
        )
        .bind(tenant_id as i64)
        .bind(id)
        .bind(new_parent_id)
        .bind(&new_path)
        .bind(new_depth)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_folder_conflict(e, &new_path))?
        .ok_or_else(|| AppError::not_found("Folder not found"))?;

        if new_path != folder.path {
            self.rewrite_descendant_paths(tenant_id, &folder.path, &new_path)
                .await?;
        }

        Ok(moved)
    }

    /// Rewrite every descendant path (and depth) after a rename or move.
    ///
    /// A single UPDATE substitutes the prefix and shifts depths by the
    /// delta between the old and new location, so descendant rows cannot
    /// lag the root.
    async fn rewrite_descendant_paths(
        &self,
        tenant_id: u32,
        old_path: &str,
        new_path: &str,
    ) -> AppResult<u64> {
        let old_depth = old_path.matches('/').count() as i32;
        let new_depth = new_path.matches('/').count() as i32;

        let result = sqlx::query(
            "UPDATE warden_folders \
             SET path = $3 || substr(path, $4), depth = depth + $5, updated_at = $6 \
             WHERE tenant_id = $1 AND path LIKE $2",
        )
        .bind(tenant_id as i64)
        .bind(format!("{}/%", escape_like(old_path)))
        .bind(new_path)
        .bind(old_path.len() as i32 + 1)
        .bind(new_depth - old_depth)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to rewrite descendant paths", e)
        })?;

        Ok(result.rows_affected())
    }

    /// Delete a folder.
    ///
    /// Without `force`, fails with `NotEmpty` when child folders or
    /// non-deleted secrets exist. With `force`, removes every descendant
    /// folder by path prefix and then the folder itself; contained secrets
    /// are the caller's responsibility and must be cleaned up first.
    pub async fn delete(&self, tenant_id: u32, id: Uuid, force: bool) -> AppResult<()> {
        let folder = self
            .find_by_id(tenant_id, id)
            .await?
            .ok_or_else(|| AppError::not_found("Folder not found"))?;

        if !force {
            if self.count_subfolders(tenant_id, id).await? > 0 {
                return Err(AppError::not_empty("folder has child folders"));
            }
            if self.count_active_secrets(tenant_id, id).await? > 0 {
                return Err(AppError::not_empty("folder contains secrets"));
            }
        } else {
            sqlx::query("DELETE FROM warden_folders WHERE tenant_id = $1 AND path LIKE $2")
                .bind(tenant_id as i64)
                .bind(format!("{}/%", escape_like(&folder.path)))
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    AppError::with_source(
                        ErrorKind::Database,
                        "Failed to delete descendant folders",
                        e,
                    )
                })?;
        }

        let result = sqlx::query("DELETE FROM warden_folders WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id as i64)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete folder", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Folder not found"));
        }
        Ok(())
    }

    /// Ids of every folder strictly inside the subtree rooted at `path`.
    pub async fn descendant_ids(&self, tenant_id: u32, path: &str) -> AppResult<Vec<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM warden_folders WHERE tenant_id = $1 AND path LIKE $2",
        )
        .bind(tenant_id as i64)
        .bind(format!("{}/%", escape_like(path)))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list descendant ids", e)
        })
    }

    /// Count direct subfolders.
    pub async fn count_subfolders(&self, tenant_id: u32, folder_id: Uuid) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM warden_folders WHERE tenant_id = $1 AND parent_id = $2",
        )
        .bind(tenant_id as i64)
        .bind(folder_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count subfolders", e))?;
        Ok(count as u64)
    }

    /// Count secrets directly in a folder, regardless of status.
    pub async fn count_secrets(&self, tenant_id: u32, folder_id: Uuid) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM warden_secrets WHERE tenant_id = $1 AND folder_id = $2",
        )
        .bind(tenant_id as i64)
        .bind(folder_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count secrets", e))?;
        Ok(count as u64)
    }

    /// Count non-deleted secrets directly in a folder.
    async fn count_active_secrets(&self, tenant_id: u32, folder_id: Uuid) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM warden_secrets \
             WHERE tenant_id = $1 AND folder_id = $2 AND status != 'deleted'",
        )
        .bind(tenant_id as i64)
        .bind(folder_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count secrets", e))?;
        Ok(count as u64)
    }
}

/// Map unique-constraint violations onto `AlreadyExists`.
fn map_folder_conflict(err: sqlx::Error, path: &str) -> AppError {
    if let sqlx::Error::Database(ref db_err) = err {
        if matches!(
            db_err.constraint(),
            Some("warden_folders_tenant_path_key") | Some("warden_folders_parent_name_key")
        ) {
            return AppError::already_exists(format!("folder '{path}' already exists"));
        }
    }
    AppError::with_source(ErrorKind::Database, "Folder write failed", err)
}

/// Escape LIKE metacharacters in a literal path prefix.
fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("/plain"), "/plain");
        assert_eq!(escape_like("/100%_done"), "/100\\%\\_done");
    }
}
