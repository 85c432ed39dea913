//! Permission tuple repository.

use sqlx::PgPool;
use uuid::Uuid;

use warden_core::error::{AppError, ErrorKind};
use warden_core::result::AppResult;
use warden_core::types::pagination::{PageRequest, PageResponse};
use warden_entity::permission::model::{CreatePermissionTuple, PermissionTuple};
use warden_entity::permission::relation::{Relation, ResourceType, SubjectType};

/// Filters for administrative permission listings.
#[derive(Debug, Clone, Default)]
pub struct PermissionFilter {
    /// Restrict to a resource type.
    pub resource_type: Option<ResourceType>,
    /// Restrict to a specific resource.
    pub resource_id: Option<Uuid>,
    /// Restrict to a subject type.
    pub subject_type: Option<SubjectType>,
    /// Restrict to a specific subject.
    pub subject_id: Option<String>,
}

/// Repository for permission tuples.
///
/// Reads are linearisable with respect to prior writes from the same
/// caller; no global serialisability is promised. Concurrent identical
/// grants race to the unique key and the loser sees `AlreadyExists`.
#[derive(Debug, Clone)]
pub struct PermissionRepository {
    pool: PgPool,
}

impl PermissionRepository {
    /// Create a new permission repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist a new tuple. Fails with `AlreadyExists` when the 6-tuple
    /// key is already present.
    pub async fn create(&self, data: &CreatePermissionTuple) -> AppResult<PermissionTuple> {
        sqlx::query_as::<_, PermissionTuple>(
            "INSERT INTO warden_permissions \
             (tenant_id, resource_type, resource_id, relation, subject_type, \
              subject_id, granted_by, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
        )
        .bind(data.tenant_id as i64)
        .bind(data.resource_type)
        .bind(data.resource_id)
        .bind(data.relation)
        .bind(data.subject_type)
        .bind(&data.subject_id)
        .bind(data.granted_by.map(|v| v as i64))
        .bind(data.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.constraint() == Some("warden_permissions_tuple_key") {
                    return AppError::already_exists("permission already exists");
                }
            }
            AppError::with_source(ErrorKind::Database, "Failed to create permission", e)
        })
    }

    /// The tuple for an exact `(resource, subject)` pair, if any.
    ///
    /// Expiration is applied by callers, not here.
    pub async fn has_exact(
        &self,
        tenant_id: u32,
        resource_type: ResourceType,
        resource_id: Uuid,
        subject_type: SubjectType,
        subject_id: &str,
    ) -> AppResult<Option<PermissionTuple>> {
        sqlx::query_as::<_, PermissionTuple>(
            "SELECT * FROM warden_permissions \
             WHERE tenant_id = $1 AND resource_type = $2 AND resource_id = $3 \
               AND subject_type = $4 AND subject_id = $5 \
             ORDER BY created_at ASC LIMIT 1",
        )
        .bind(tenant_id as i64)
        .bind(resource_type)
        .bind(resource_id)
        .bind(subject_type)
        .bind(subject_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to check permission", e))
    }

    /// All tuples directly on a resource.
    pub async fn direct_on_resource(
        &self,
        tenant_id: u32,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> AppResult<Vec<PermissionTuple>> {
        sqlx::query_as::<_, PermissionTuple>(
            "SELECT * FROM warden_permissions \
             WHERE tenant_id = $1 AND resource_type = $2 AND resource_id = $3 \
             ORDER BY created_at ASC",
        )
        .bind(tenant_id as i64)
        .bind(resource_type)
        .bind(resource_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list permissions", e))
    }

    /// Tuples a subject holds, optionally filtered by resource kind.
    pub async fn by_subject(
        &self,
        tenant_id: u32,
        subject_type: SubjectType,
        subject_id: &str,
        resource_type: Option<ResourceType>,
    ) -> AppResult<Vec<PermissionTuple>> {
        sqlx::query_as::<_, PermissionTuple>(
            "SELECT * FROM warden_permissions \
             WHERE tenant_id = $1 AND subject_type = $2 AND subject_id = $3 \
               AND ($4::resource_type IS NULL OR resource_type = $4) \
             ORDER BY created_at ASC",
        )
        .bind(tenant_id as i64)
        .bind(subject_type)
        .bind(subject_id)
        .bind(resource_type)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list subject permissions", e)
        })
    }

    /// Ids of the resources of `resource_type` the subject holds tuples on.
    pub async fn resource_ids_by_subject(
        &self,
        tenant_id: u32,
        subject_type: SubjectType,
        subject_id: &str,
        resource_type: ResourceType,
    ) -> AppResult<Vec<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT DISTINCT resource_id FROM warden_permissions \
             WHERE tenant_id = $1 AND subject_type = $2 AND subject_id = $3 \
               AND resource_type = $4",
        )
        .bind(tenant_id as i64)
        .bind(subject_type)
        .bind(subject_id)
        .bind(resource_type)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list subject resources", e)
        })
    }

    /// Delete tuples for `(resource, subject)`; omitting the relation
    /// removes them across all relations.
    pub async fn delete(
        &self,
        tenant_id: u32,
        resource_type: ResourceType,
        resource_id: Uuid,
        relation: Option<Relation>,
        subject_type: SubjectType,
        subject_id: &str,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM warden_permissions \
             WHERE tenant_id = $1 AND resource_type = $2 AND resource_id = $3 \
               AND subject_type = $4 AND subject_id = $5 \
               AND ($6::relation IS NULL OR relation = $6)",
        )
        .bind(tenant_id as i64)
        .bind(resource_type)
        .bind(resource_id)
        .bind(subject_type)
        .bind(subject_id)
        .bind(relation)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to delete permission", e)
        })?;
        Ok(result.rows_affected())
    }

    /// Delete every tuple on a resource. Cascade hook for resource deletion.
    pub async fn delete_by_resource(
        &self,
        tenant_id: u32,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM warden_permissions \
             WHERE tenant_id = $1 AND resource_type = $2 AND resource_id = $3",
        )
        .bind(tenant_id as i64)
        .bind(resource_type)
        .bind(resource_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to delete permissions", e)
        })?;
        Ok(result.rows_affected())
    }

    /// Paged administrative listing with optional filters.
    pub async fn list(
        &self,
        tenant_id: u32,
        filter: &PermissionFilter,
        page: &PageRequest,
    ) -> AppResult<PageResponse<PermissionTuple>> {
        const WHERE: &str = "tenant_id = $1 \
             AND ($2::resource_type IS NULL OR resource_type = $2) \
             AND ($3::uuid IS NULL OR resource_id = $3) \
             AND ($4::subject_type IS NULL OR subject_type = $4) \
             AND ($5::text IS NULL OR subject_id = $5)";

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM warden_permissions WHERE {WHERE}"
        ))
        .bind(tenant_id as i64)
        .bind(filter.resource_type)
        .bind(filter.resource_id)
        .bind(filter.subject_type)
        .bind(filter.subject_id.as_deref())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to count permissions", e)
        })?;

        let tuples = sqlx::query_as::<_, PermissionTuple>(&format!(
            "SELECT * FROM warden_permissions WHERE {WHERE} \
             ORDER BY created_at DESC LIMIT $6 OFFSET $7"
        ))
        .bind(tenant_id as i64)
        .bind(filter.resource_type)
        .bind(filter.resource_id)
        .bind(filter.subject_type)
        .bind(filter.subject_id.as_deref())
        .bind(page.limit() as i64)
        .bind(page.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list permissions", e)
        })?;

        Ok(PageResponse::new(
            tuples,
            page.page,
            page.page_size,
            total as u64,
        ))
    }
}
