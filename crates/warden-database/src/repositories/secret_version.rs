//! Secret version history repository.

use sqlx::PgPool;
use uuid::Uuid;

use warden_core::error::{AppError, ErrorKind};
use warden_core::result::AppResult;
use warden_core::types::pagination::{PageRequest, PageResponse};
use warden_entity::secret::version::{CreateSecretVersion, SecretVersion};

/// Repository for append-only secret version rows.
#[derive(Debug, Clone)]
pub struct SecretVersionRepository {
    pool: PgPool,
}

impl SecretVersionRepository {
    /// Create a new version repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record a new version. Fails with `Conflict` when the
    /// `(secret_id, version_number)` pair already exists.
    pub async fn create(&self, data: &CreateSecretVersion) -> AppResult<SecretVersion> {
        sqlx::query_as::<_, SecretVersion>(
            "INSERT INTO warden_secret_versions \
             (secret_id, version_number, vault_path, comment, checksum, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(data.secret_id)
        .bind(data.version_number)
        .bind(&data.vault_path)
        .bind(data.comment.as_deref())
        .bind(&data.checksum)
        .bind(data.created_by.map(|v| v as i64))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.constraint() == Some("warden_secret_versions_secret_version_key") {
                    return AppError::conflict(format!(
                        "version {} already recorded for secret {}",
                        data.version_number, data.secret_id
                    ));
                }
            }
            AppError::with_source(ErrorKind::Database, "Failed to create version record", e)
        })
    }

    /// Paged version listing, newest first.
    pub async fn list(
        &self,
        secret_id: Uuid,
        page: &PageRequest,
    ) -> AppResult<PageResponse<SecretVersion>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM warden_secret_versions WHERE secret_id = $1",
        )
        .bind(secret_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count versions", e))?;

        let versions = sqlx::query_as::<_, SecretVersion>(
            "SELECT * FROM warden_secret_versions WHERE secret_id = $1 \
             ORDER BY version_number DESC LIMIT $2 OFFSET $3",
        )
        .bind(secret_id)
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list versions", e))?;

        Ok(PageResponse::new(
            versions,
            page.page,
            page.page_size,
            total as u64,
        ))
    }

    /// Find a specific version of a secret.
    pub async fn find_by_number(
        &self,
        secret_id: Uuid,
        version_number: i32,
    ) -> AppResult<Option<SecretVersion>> {
        sqlx::query_as::<_, SecretVersion>(
            "SELECT * FROM warden_secret_versions \
             WHERE secret_id = $1 AND version_number = $2",
        )
        .bind(secret_id)
        .bind(version_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find version", e))
    }

    /// Delete every version row of a secret. Part of permanent delete.
    pub async fn delete_by_secret(&self, secret_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM warden_secret_versions WHERE secret_id = $1")
            .bind(secret_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to delete version records", e)
            })?;
        Ok(result.rows_affected())
    }
}
