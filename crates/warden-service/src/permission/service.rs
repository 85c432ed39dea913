//! Permission surface: grant, revoke, listing, and informational checks.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use warden_authz::{CheckDecision, Checker, Engine};
use warden_core::types::pagination::{PageRequest, PageResponse};
use warden_core::{AppError, AppResult, RequestContext};
use warden_database::repositories::folder::FolderRepository;
use warden_database::repositories::permission::{PermissionFilter, PermissionRepository};
use warden_database::repositories::secret::SecretRepository;
use warden_entity::permission::{
    CreatePermissionTuple, Permission, PermissionTuple, Relation, ResourceType, SubjectType,
};

/// Request to grant access to a resource.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GrantAccessRequest {
    /// Type of the target resource.
    pub resource_type: ResourceType,
    /// Id of the target resource.
    pub resource_id: Uuid,
    /// Relation to grant.
    pub relation: Relation,
    /// Subject type receiving the grant.
    pub subject_type: SubjectType,
    /// Subject id receiving the grant.
    pub subject_id: String,
    /// Optional expiry.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Manages permission tuples and exposes informational checks.
#[derive(Clone)]
pub struct PermissionService {
    perm_repo: Arc<PermissionRepository>,
    folder_repo: Arc<FolderRepository>,
    secret_repo: Arc<SecretRepository>,
    engine: Arc<Engine>,
    checker: Checker,
}

impl PermissionService {
    /// Creates a new permission service.
    pub fn new(
        perm_repo: Arc<PermissionRepository>,
        folder_repo: Arc<FolderRepository>,
        secret_repo: Arc<SecretRepository>,
        engine: Arc<Engine>,
        checker: Checker,
    ) -> Self {
        Self {
            perm_repo,
            folder_repo,
            secret_repo,
            engine,
            checker,
        }
    }

    /// Grants access to a resource. Requires SHARE on the target.
    ///
    /// Two concurrent identical grants race to the unique tuple key; the
    /// loser receives `AlreadyExists`.
    pub async fn grant_access(
        &self,
        ctx: &RequestContext,
        req: GrantAccessRequest,
    ) -> AppResult<PermissionTuple> {
        if req.subject_id.is_empty() {
            return Err(AppError::validation("Subject id cannot be empty"));
        }

        self.checker
            .require_share(ctx, req.resource_type, req.resource_id)
            .await?;

        self.ensure_resource_exists(ctx, req.resource_type, req.resource_id)
            .await?;

        let tuple = self
            .perm_repo
            .create(&CreatePermissionTuple {
                tenant_id: ctx.tenant_id,
                resource_type: req.resource_type,
                resource_id: req.resource_id,
                relation: req.relation,
                subject_type: req.subject_type,
                subject_id: req.subject_id.clone(),
                granted_by: ctx.numeric_user_id(),
                expires_at: req.expires_at,
            })
            .await?;

        info!(
            tenant_id = ctx.tenant_id,
            user_id = %ctx.user_id,
            resource = %format!("{}:{}", req.resource_type, req.resource_id),
            relation = %req.relation,
            subject = %format!("{}/{}", req.subject_type, req.subject_id),
            "Access granted"
        );

        Ok(tuple)
    }

    /// Revokes access from a resource. Requires SHARE on the target.
    ///
    /// Omitting the relation removes the subject's tuples across all
    /// relations.
    pub async fn revoke_access(
        &self,
        ctx: &RequestContext,
        resource_type: ResourceType,
        resource_id: Uuid,
        relation: Option<Relation>,
        subject_type: SubjectType,
        subject_id: &str,
    ) -> AppResult<u64> {
        self.checker
            .require_share(ctx, resource_type, resource_id)
            .await?;

        let removed = self
            .perm_repo
            .delete(
                ctx.tenant_id,
                resource_type,
                resource_id,
                relation,
                subject_type,
                subject_id,
            )
            .await?;

        info!(
            tenant_id = ctx.tenant_id,
            user_id = %ctx.user_id,
            resource = %format!("{resource_type}:{resource_id}"),
            subject = %format!("{subject_type}/{subject_id}"),
            removed,
            "Access revoked"
        );

        Ok(removed)
    }

    /// Lists permission tuples for administrative views.
    ///
    /// When filtered by a resource, READ on that resource is required.
    /// Unfiltered results are restricted to resources the caller can READ,
    /// so tuples on unreadable resources stay invisible. Totals are
    /// post-filter.
    pub async fn list_permissions(
        &self,
        ctx: &RequestContext,
        filter: PermissionFilter,
        page: PageRequest,
    ) -> AppResult<PageResponse<PermissionTuple>> {
        let page = page.normalized();

        if let (Some(resource_type), Some(resource_id)) = (filter.resource_type, filter.resource_id)
        {
            self.checker
                .require_read(ctx, resource_type, resource_id)
                .await?;
        }

        let result = self.perm_repo.list(ctx.tenant_id, &filter, &page).await?;

        let mut visible = Vec::with_capacity(result.items.len());
        for tuple in result.items {
            if self
                .checker
                .can_read(ctx, tuple.resource_type, tuple.resource_id)
                .await?
            {
                visible.push(tuple);
            }
        }
        let total = visible.len() as u64;
        Ok(PageResponse::new(
            visible,
            result.page,
            result.page_size,
            total,
        ))
    }

    /// All tuples directly on a resource. Requires READ on it.
    pub async fn permissions_on_resource(
        &self,
        ctx: &RequestContext,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> AppResult<Vec<PermissionTuple>> {
        self.checker
            .require_read(ctx, resource_type, resource_id)
            .await?;
        self.perm_repo
            .direct_on_resource(ctx.tenant_id, resource_type, resource_id)
            .await
    }

    /// Informational check: whether a subject has a permission.
    ///
    /// Requires no permission itself. Role memberships are only known for
    /// the calling principal; checks on other users evaluate their direct
    /// and tenant-wide tuples.
    pub async fn check_access(
        &self,
        ctx: &RequestContext,
        user_id: &str,
        resource_type: ResourceType,
        resource_id: Uuid,
        permission: Permission,
    ) -> AppResult<CheckDecision> {
        let roles = if user_id == ctx.user_id {
            ctx.roles.clone()
        } else {
            Vec::new()
        };

        self.engine
            .check(&warden_authz::CheckRequest {
                tenant_id: ctx.tenant_id,
                user_id: user_id.to_string(),
                roles,
                resource_type,
                resource_id,
                permission,
            })
            .await
    }

    /// Informational listing of resources a subject can reach through
    /// direct tuples. Paged over the deduplicated aggregate.
    pub async fn list_accessible_resources(
        &self,
        ctx: &RequestContext,
        user_id: &str,
        resource_type: ResourceType,
        page: PageRequest,
    ) -> AppResult<PageResponse<Uuid>> {
        let page = page.normalized();

        let roles = if user_id == ctx.user_id {
            ctx.roles.clone()
        } else {
            Vec::new()
        };

        let mut ids = self
            .engine
            .list_accessible_resources(ctx.tenant_id, user_id, &roles, resource_type)
            .await?;
        ids.sort();

        let total = ids.len() as u64;
        let start = (page.offset() as usize).min(ids.len());
        let end = (start + page.limit() as usize).min(ids.len());
        Ok(PageResponse::new(
            ids[start..end].to_vec(),
            page.page,
            page.page_size,
            total,
        ))
    }

    /// Informational query for the allowed permission set and the highest
    /// relation a subject holds on a resource.
    pub async fn effective_permissions(
        &self,
        ctx: &RequestContext,
        user_id: &str,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> AppResult<(Vec<Permission>, Option<Relation>)> {
        let roles = if user_id == ctx.user_id {
            ctx.roles.clone()
        } else {
            Vec::new()
        };

        self.engine
            .effective_permissions(ctx.tenant_id, user_id, &roles, resource_type, resource_id)
            .await
    }

    /// Verify the grant target actually exists in the catalog.
    async fn ensure_resource_exists(
        &self,
        ctx: &RequestContext,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> AppResult<()> {
        match resource_type {
            ResourceType::Folder => {
                self.folder_repo
                    .find_by_id(ctx.tenant_id, resource_id)
                    .await?
                    .ok_or_else(|| AppError::not_found("Folder not found"))?;
            }
            ResourceType::Secret => {
                self.secret_repo
                    .find_by_id(ctx.tenant_id, resource_id)
                    .await?
                    .ok_or_else(|| AppError::not_found("Secret not found"))?;
            }
        }
        Ok(())
    }
}
