//! Secret repository: catalog metadata rows pointing at vault objects.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use warden_core::error::{AppError, ErrorKind};
use warden_core::result::AppResult;
use warden_core::types::pagination::{PageRequest, PageResponse};
use warden_entity::secret::model::{CreateSecret, Secret, SecretFilter, UpdateSecret};
use warden_entity::secret::status::SecretStatus;

/// Repository for secret catalog rows.
#[derive(Debug, Clone)]
pub struct SecretRepository {
    pool: PgPool,
}

impl SecretRepository {
    /// Create a new secret repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a secret by ID within a tenant.
    pub async fn find_by_id(&self, tenant_id: u32, id: Uuid) -> AppResult<Option<Secret>> {
        sqlx::query_as::<_, Secret>(
            "SELECT * FROM warden_secrets WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id as i64)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find secret", e))
    }

    /// Insert a new secret row with `current_version = 1`.
    pub async fn create(&self, data: &CreateSecret) -> AppResult<Secret> {
        sqlx::query_as::<_, Secret>(
            "INSERT INTO warden_secrets \
             (id, tenant_id, folder_id, name, username, host_url, vault_path, \
              current_version, metadata, description, created_by, updated_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, 1, $8, $9, $10, $10) RETURNING *",
        )
        .bind(data.id)
        .bind(data.tenant_id as i64)
        .bind(data.folder_id)
        .bind(&data.name)
        .bind(data.username.as_deref())
        .bind(data.host_url.as_deref())
        .bind(&data.vault_path)
        .bind(data.metadata.as_ref())
        .bind(data.description.as_deref())
        .bind(data.created_by.map(|v| v as i64))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_secret_conflict(e, &data.name))
    }

    /// Paged listing under the given filters.
    pub async fn list(
        &self,
        tenant_id: u32,
        filter: &SecretFilter,
        page: &PageRequest,
    ) -> AppResult<PageResponse<Secret>> {
        const WHERE: &str = "s.tenant_id = $1 \
             AND ($2::uuid IS NULL OR s.folder_id = $2) \
             AND (NOT $3 OR s.folder_id IS NULL) \
             AND ($4::secret_status IS NULL OR s.status = $4) \
             AND ($5::text IS NULL OR s.name ILIKE $5) \
             AND ($6::text IS NULL OR EXISTS ( \
                  SELECT 1 FROM warden_folders f \
                  WHERE f.id = s.folder_id AND (f.path = $7 OR f.path LIKE $6)))";

        let folder_bind = filter.folder_id.flatten();
        let root_only = matches!(filter.folder_id, Some(None));
        let name_bind = filter
            .name_contains
            .as_deref()
            .map(|n| format!("%{}%", escape_like(n)));
        let prefix_like = filter
            .path_prefix
            .as_deref()
            .map(|p| format!("{}/%", escape_like(p)));

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM warden_secrets s WHERE {WHERE}"
        ))
        .bind(tenant_id as i64)
        .bind(folder_bind)
        .bind(root_only)
        .bind(filter.status)
        .bind(name_bind.as_deref())
        .bind(prefix_like.as_deref())
        .bind(filter.path_prefix.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count secrets", e))?;

        let secrets = sqlx::query_as::<_, Secret>(&format!(
            "SELECT s.* FROM warden_secrets s WHERE {WHERE} \
             ORDER BY s.name ASC LIMIT $8 OFFSET $9"
        ))
        .bind(tenant_id as i64)
        .bind(folder_bind)
        .bind(root_only)
        .bind(filter.status)
        .bind(name_bind.as_deref())
        .bind(prefix_like.as_deref())
        .bind(filter.path_prefix.as_deref())
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list secrets", e))?;

        Ok(PageResponse::new(
            secrets,
            page.page,
            page.page_size,
            total as u64,
        ))
    }

    /// Update secret metadata fields. `None` leaves a field unchanged.
    pub async fn update(
        &self,
        tenant_id: u32,
        id: Uuid,
        changes: &UpdateSecret,
        updated_by: Option<u32>,
    ) -> AppResult<Secret> {
        sqlx::query_as::<_, Secret>(
            "UPDATE warden_secrets SET \
                name = COALESCE($3, name), \
                username = COALESCE($4, username), \
                host_url = COALESCE($5, host_url), \
                description = COALESCE($6, description), \
                metadata = COALESCE($7, metadata), \
                status = COALESCE($8, status), \
                updated_by = COALESCE($9, updated_by), \
                updated_at = $10 \
             WHERE tenant_id = $1 AND id = $2 RETURNING *",
        )
        .bind(tenant_id as i64)
        .bind(id)
        .bind(changes.name.as_deref())
        .bind(changes.username.as_deref())
        .bind(changes.host_url.as_deref())
        .bind(changes.description.as_deref())
        .bind(changes.metadata.as_ref())
        .bind(changes.status)
        .bind(updated_by.map(|v| v as i64))
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_secret_conflict(e, changes.name.as_deref().unwrap_or("")))?
        .ok_or_else(|| AppError::not_found("Secret not found"))
    }

    /// Advance the current-version pointer.
    pub async fn update_version(
        &self,
        tenant_id: u32,
        id: Uuid,
        version: i32,
        updated_by: Option<u32>,
    ) -> AppResult<Secret> {
        sqlx::query_as::<_, Secret>(
            "UPDATE warden_secrets SET current_version = $3, \
                updated_by = COALESCE($4, updated_by), updated_at = $5 \
             WHERE tenant_id = $1 AND id = $2 RETURNING *",
        )
        .bind(tenant_id as i64)
        .bind(id)
        .bind(version)
        .bind(updated_by.map(|v| v as i64))
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to update secret version", e)
        })?
        .ok_or_else(|| AppError::not_found("Secret not found"))
    }

    /// Flip the lifecycle status (soft delete, archive, reactivate).
    pub async fn set_status(
        &self,
        tenant_id: u32,
        id: Uuid,
        status: SecretStatus,
        updated_by: Option<u32>,
    ) -> AppResult<Secret> {
        sqlx::query_as::<_, Secret>(
            "UPDATE warden_secrets SET status = $3, \
                updated_by = COALESCE($4, updated_by), updated_at = $5 \
             WHERE tenant_id = $1 AND id = $2 RETURNING *",
        )
        .bind(tenant_id as i64)
        .bind(id)
        .bind(status)
        .bind(updated_by.map(|v| v as i64))
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to update secret status", e)
        })?
        .ok_or_else(|| AppError::not_found("Secret not found"))
    }

    /// Re-home a secret under a different folder (or the root when `None`).
    pub async fn move_secret(
        &self,
        tenant_id: u32,
        id: Uuid,
        new_folder_id: Option<Uuid>,
        updated_by: Option<u32>,
    ) -> AppResult<Secret> {
        sqlx::query_as::<_, Secret>(
            "UPDATE warden_secrets SET folder_id = $3, \
                updated_by = COALESCE($4, updated_by), updated_at = $5 \
             WHERE tenant_id = $1 AND id = $2 RETURNING *",
        )
        .bind(tenant_id as i64)
        .bind(id)
        .bind(new_folder_id)
        .bind(updated_by.map(|v| v as i64))
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_secret_conflict(e, ""))?
        .ok_or_else(|| AppError::not_found("Secret not found"))
    }

    /// Remove the catalog row entirely (permanent delete).
    pub async fn delete_row(&self, tenant_id: u32, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM warden_secrets WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id as i64)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to delete secret", e)
            })?;
        Ok(result.rows_affected() > 0)
    }

    /// Secrets living in folders whose path is `path` or lies under it.
    ///
    /// Feeds the force-delete cleanup of a folder subtree.
    pub async fn find_under_folder_path(
        &self,
        tenant_id: u32,
        path: &str,
    ) -> AppResult<Vec<Secret>> {
        sqlx::query_as::<_, Secret>(
            "SELECT s.* FROM warden_secrets s \
             INNER JOIN warden_folders f ON s.folder_id = f.id \
             WHERE s.tenant_id = $1 AND (f.path = $2 OR f.path LIKE $3)",
        )
        .bind(tenant_id as i64)
        .bind(path)
        .bind(format!("{}/%", escape_like(path)))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list secrets under path", e)
        })
    }
}

/// Map unique-constraint violations onto `AlreadyExists`.
fn map_secret_conflict(err: sqlx::Error, name: &str) -> AppError {
    if let sqlx::Error::Database(ref db_err) = err {
        match db_err.constraint() {
            Some("warden_secrets_tenant_folder_name_key") => {
                return AppError::already_exists(format!(
                    "secret '{name}' already exists in this folder"
                ));
            }
            Some("warden_secrets_vault_path_key") => {
                return AppError::already_exists("vault path already in use");
            }
            _ => {}
        }
    }
    AppError::with_source(ErrorKind::Database, "Secret write failed", err)
}

/// Escape LIKE metacharacters in a literal pattern fragment.
fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}
