//! Folder lifecycle: CRUD, move, and subtree deletion.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use warden_authz::Checker;
use warden_core::types::pagination::{PageRequest, PageResponse};
use warden_core::{AppError, AppResult, RequestContext};
use warden_database::repositories::folder::FolderRepository;
use warden_database::repositories::permission::PermissionRepository;
use warden_database::repositories::secret::SecretRepository;
use warden_entity::folder::model::{CreateFolder, Folder};
use warden_entity::permission::{
    CreatePermissionTuple, Relation, ResourceType, SubjectType,
};

use crate::secret::service::SecretService;

/// Request to create a new folder.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CreateFolderRequest {
    /// Parent folder (None for a root folder).
    pub parent_id: Option<Uuid>,
    /// Folder name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
}

/// A folder together with optional content counts.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FolderDetails {
    /// The folder row.
    pub folder: Folder,
    /// Number of secrets directly in the folder, when requested.
    pub secret_count: Option<u64>,
    /// Number of direct subfolders, when requested.
    pub subfolder_count: Option<u64>,
}

/// Manages the folder lifecycle.
#[derive(Clone)]
pub struct FolderService {
    folder_repo: Arc<FolderRepository>,
    secret_repo: Arc<SecretRepository>,
    perm_repo: Arc<PermissionRepository>,
    secret_service: Arc<SecretService>,
    checker: Checker,
}

impl FolderService {
    /// Creates a new folder service.
    pub fn new(
        folder_repo: Arc<FolderRepository>,
        secret_repo: Arc<SecretRepository>,
        perm_repo: Arc<PermissionRepository>,
        secret_service: Arc<SecretService>,
        checker: Checker,
    ) -> Self {
        Self {
            folder_repo,
            secret_repo,
            perm_repo,
            secret_service,
            checker,
        }
    }

    /// Creates a new folder and grants the creator an owner tuple.
    pub async fn create_folder(
        &self,
        ctx: &RequestContext,
        req: CreateFolderRequest,
    ) -> AppResult<Folder> {
        if req.name.trim().is_empty() {
            return Err(AppError::validation("Folder name cannot be empty"));
        }

        if let Some(parent_id) = req.parent_id {
            self.checker
                .require_write(ctx, ResourceType::Folder, parent_id)
                .await?;
        }

        let folder = self
            .folder_repo
            .create(&CreateFolder {
                tenant_id: ctx.tenant_id,
                parent_id: req.parent_id,
                name: req.name,
                description: req.description,
                created_by: ctx.numeric_user_id(),
            })
            .await?;

        if !ctx.user_id.is_empty() {
            let owner = CreatePermissionTuple {
                tenant_id: ctx.tenant_id,
                resource_type: ResourceType::Folder,
                resource_id: folder.id,
                relation: Relation::Owner,
                subject_type: SubjectType::User,
                subject_id: ctx.user_id.clone(),
                granted_by: ctx.numeric_user_id(),
                expires_at: None,
            };
            if let Err(e) = self.perm_repo.create(&owner).await {
                warn!(folder_id = %folder.id, error = %e, "Failed to grant owner permission");
            }
        }

        info!(
            tenant_id = ctx.tenant_id,
            user_id = %ctx.user_id,
            folder_id = %folder.id,
            path = %folder.path,
            "Folder created"
        );

        Ok(folder)
    }

    /// Gets a folder, optionally annotated with content counts.
    pub async fn get_folder(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        include_counts: bool,
    ) -> AppResult<FolderDetails> {
        self.checker
            .require_read(ctx, ResourceType::Folder, id)
            .await?;

        let folder = self
            .folder_repo
            .find_by_id(ctx.tenant_id, id)
            .await?
            .ok_or_else(|| AppError::not_found("Folder not found"))?;

        let (secret_count, subfolder_count) = if include_counts {
            (
                Some(self.folder_repo.count_secrets(ctx.tenant_id, id).await?),
                Some(self.folder_repo.count_subfolders(ctx.tenant_id, id).await?),
            )
        } else {
            (None, None)
        };

        Ok(FolderDetails {
            folder,
            secret_count,
            subfolder_count,
        })
    }

    /// Lists folders, filtering out rows the caller cannot read.
    ///
    /// `parent_id = Some(None)` lists root folders. The returned total is
    /// the post-filter count.
    pub async fn list_folders(
        &self,
        ctx: &RequestContext,
        parent_id: Option<Option<Uuid>>,
        name_contains: Option<&str>,
        page: PageRequest,
    ) -> AppResult<PageResponse<Folder>> {
        let page = page.normalized();

        if let Some(Some(parent_id)) = parent_id {
            self.checker
                .require_read(ctx, ResourceType::Folder, parent_id)
                .await?;
        }

        let result = self
            .folder_repo
            .list(ctx.tenant_id, parent_id, name_contains, &page)
            .await?;

        let mut accessible = Vec::with_capacity(result.items.len());
        for folder in result.items {
            if self
                .checker
                .can_read(ctx, ResourceType::Folder, folder.id)
                .await?
            {
                accessible.push(folder);
            }
        }
        let total = accessible.len() as u64;
        Ok(PageResponse::new(
            accessible,
            result.page,
            result.page_size,
            total,
        ))
    }

    /// Renames a folder and/or updates its description.
    pub async fn update_folder(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        name: Option<&str>,
        description: Option<&str>,
    ) -> AppResult<Folder> {
        if let Some(name) = name {
            if name.trim().is_empty() {
                return Err(AppError::validation("Folder name cannot be empty"));
            }
        }

        self.checker
            .require_write(ctx, ResourceType::Folder, id)
            .await?;

        let folder = self
            .folder_repo
            .update(ctx.tenant_id, id, name, description)
            .await?;

        info!(
            tenant_id = ctx.tenant_id,
            user_id = %ctx.user_id,
            folder_id = %id,
            "Folder updated"
        );

        Ok(folder)
    }

    /// Moves a folder under a new parent.
    ///
    /// Requires WRITE on the folder and on the destination; self and
    /// descendant targets are rejected with `CircularReference`.
    pub async fn move_folder(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        new_parent_id: Option<Uuid>,
    ) -> AppResult<Folder> {
        self.checker
            .require_write(ctx, ResourceType::Folder, id)
            .await?;

        if let Some(parent_id) = new_parent_id {
            self.checker
                .require_write(ctx, ResourceType::Folder, parent_id)
                .await?;
        }

        let folder = self
            .folder_repo
            .move_folder(ctx.tenant_id, id, new_parent_id)
            .await?;

        info!(
            tenant_id = ctx.tenant_id,
            user_id = %ctx.user_id,
            folder_id = %id,
            new_parent = ?new_parent_id,
            path = %folder.path,
            "Folder moved"
        );

        Ok(folder)
    }

    /// Deletes a folder.
    ///
    /// Without `force`, a folder with child folders or live secrets fails
    /// with `NotEmpty`. With `force`, every secret in the subtree is
    /// permanently deleted through the secret lifecycle first, then the
    /// descendant folders and the folder itself are removed. Per-secret
    /// purge failures and permission-tuple cascade failures are logged and
    /// do not stop the remaining cleanup steps.
    pub async fn delete_folder(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        force: bool,
    ) -> AppResult<()> {
        self.checker
            .require_delete(ctx, ResourceType::Folder, id)
            .await?;

        let folder = self
            .folder_repo
            .find_by_id(ctx.tenant_id, id)
            .await?
            .ok_or_else(|| AppError::not_found("Folder not found"))?;

        // Collected before deletion; afterwards the rows are gone.
        let mut cascade_ids = vec![id];

        if force {
            cascade_ids.extend(
                self.folder_repo
                    .descendant_ids(ctx.tenant_id, &folder.path)
                    .await?,
            );

            let secrets = self
                .secret_repo
                .find_under_folder_path(ctx.tenant_id, &folder.path)
                .await?;
            for secret in &secrets {
                if let Err(e) = self.secret_service.purge(ctx, secret).await {
                    warn!(
                        folder_id = %id,
                        secret_id = %secret.id,
                        error = %e,
                        "Failed to purge secret during force delete"
                    );
                }
            }
        }

        self.folder_repo.delete(ctx.tenant_id, id, force).await?;

        for folder_id in cascade_ids {
            if let Err(e) = self
                .perm_repo
                .delete_by_resource(ctx.tenant_id, ResourceType::Folder, folder_id)
                .await
            {
                warn!(
                    folder_id = %folder_id,
                    error = %e,
                    "Failed to cascade permission tuples"
                );
            }
        }

        info!(
            tenant_id = ctx.tenant_id,
            user_id = %ctx.user_id,
            folder_id = %id,
            path = %folder.path,
            force,
            "Folder deleted"
        );

        Ok(())
    }
}
