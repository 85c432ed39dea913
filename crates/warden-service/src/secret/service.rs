//! Secret lifecycle: create, read, list, move, and delete.
//!
//! Every operation is gated by an authorization decision, and the
//! cross-store sequences keep the catalog and the vault mutually
//! consistent under partial failure: vault writes happen first, catalog
//! failures trigger compensating vault cleanup, and permanent deletes run
//! their independent steps to completion even when some of them fail.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use warden_authz::Checker;
use warden_core::types::pagination::{PageRequest, PageResponse};
use warden_core::{AppError, AppResult, RequestContext};
use warden_database::repositories::folder::FolderRepository;
use warden_database::repositories::permission::PermissionRepository;
use warden_database::repositories::secret::SecretRepository;
use warden_database::repositories::secret_version::SecretVersionRepository;
use warden_entity::permission::{
    CreatePermissionTuple, Relation, ResourceType, SubjectType,
};
use warden_entity::secret::model::{CreateSecret, Secret, SecretFilter, UpdateSecret};
use warden_entity::secret::status::SecretStatus;
use warden_entity::secret::version::CreateSecretVersion;
use warden_vault::{build_vault_path, checksum, PasswordVault};

/// A permission granted alongside secret creation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct InitialPermission {
    /// Relation to grant.
    pub relation: Relation,
    /// Subject type receiving the grant.
    pub subject_type: SubjectType,
    /// Subject id receiving the grant.
    pub subject_id: String,
    /// Optional expiry for the grant.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Request to create a new secret.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CreateSecretRequest {
    /// Target folder (None for a root-level secret).
    pub folder_id: Option<Uuid>,
    /// Secret name.
    pub name: String,
    /// The password payload, stored only in the vault.
    pub password: String,
    /// Associated username.
    pub username: Option<String>,
    /// Host or URL the credential belongs to.
    pub host_url: Option<String>,
    /// Custom fields, notes, tags.
    pub metadata: Option<serde_json::Value>,
    /// Optional description.
    pub description: Option<String>,
    /// Comment attached to version 1.
    pub version_comment: Option<String>,
    /// Permissions to grant in addition to the creator's owner grant.
    #[serde(default)]
    pub initial_permissions: Vec<InitialPermission>,
}

/// Manages the secret lifecycle.
#[derive(Clone)]
pub struct SecretService {
    secret_repo: Arc<SecretRepository>,
    version_repo: Arc<SecretVersionRepository>,
    folder_repo: Arc<FolderRepository>,
    perm_repo: Arc<PermissionRepository>,
    vault: Arc<dyn PasswordVault>,
    checker: Checker,
    mount_path: String,
}

impl SecretService {
    /// Creates a new secret service.
    pub fn new(
        secret_repo: Arc<SecretRepository>,
        version_repo: Arc<SecretVersionRepository>,
        folder_repo: Arc<FolderRepository>,
        perm_repo: Arc<PermissionRepository>,
        vault: Arc<dyn PasswordVault>,
        checker: Checker,
        mount_path: impl Into<String>,
    ) -> Self {
        Self {
            secret_repo,
            version_repo,
            folder_repo,
            perm_repo,
            vault,
            checker,
            mount_path: mount_path.into(),
        }
    }

    /// Creates a new secret.
    ///
    /// Ordering: vault put (v1) → catalog insert → version row → grants.
    /// A catalog or version-row failure destroys the freshly written vault
    /// object and surfaces the original error; grant failures are logged
    /// and do not fail the operation.
    pub async fn create_secret(
        &self,
        ctx: &RequestContext,
        req: CreateSecretRequest,
    ) -> AppResult<Secret> {
        if req.name.trim().is_empty() {
            return Err(AppError::validation("Secret name cannot be empty"));
        }

        if let Some(folder_id) = req.folder_id {
            self.folder_repo
                .find_by_id(ctx.tenant_id, folder_id)
                .await?
                .ok_or_else(|| AppError::not_found("Folder not found"))?;
            self.checker
                .require_write(ctx, ResourceType::Folder, folder_id)
                .await?;
        }

        let secret_id = Uuid::new_v4();
        let vault_path = build_vault_path(&self.mount_path, ctx.tenant_id, &secret_id.to_string());

        let version = self.vault.put(&vault_path, &req.password, None).await?;

        let record = CreateSecret {
            id: secret_id,
            tenant_id: ctx.tenant_id,
            folder_id: req.folder_id,
            name: req.name.clone(),
            username: req.username.clone(),
            host_url: req.host_url.clone(),
            vault_path: vault_path.clone(),
            metadata: req.metadata.clone(),
            description: req.description.clone(),
            created_by: ctx.numeric_user_id(),
        };

        let secret = match self.secret_repo.create(&record).await {
            Ok(secret) => secret,
            Err(e) => {
                if let Err(cleanup) = self.vault.destroy_all(&vault_path).await {
                    warn!(
                        vault_path = %vault_path,
                        error = %cleanup,
                        "Failed to clean up vault object after secret creation failure"
                    );
                }
                return Err(e);
            }
        };

        // History must not lag the pointer: a failed version row voids the
        // whole creation.
        let version_record = CreateSecretVersion {
            secret_id,
            version_number: version,
            vault_path: vault_path.clone(),
            comment: req.version_comment.clone(),
            checksum: checksum(&req.password),
            created_by: ctx.numeric_user_id(),
        };
        if let Err(e) = self.version_repo.create(&version_record).await {
            if let Err(cleanup) = self.vault.destroy_all(&vault_path).await {
                warn!(
                    vault_path = %vault_path,
                    error = %cleanup,
                    "Failed to clean up vault object after version record failure"
                );
            }
            if let Err(cleanup) = self.secret_repo.delete_row(ctx.tenant_id, secret_id).await {
                warn!(
                    secret_id = %secret_id,
                    error = %cleanup,
                    "Failed to remove catalog row after version record failure"
                );
            }
            return Err(e);
        }

        if !ctx.user_id.is_empty() {
            let owner = CreatePermissionTuple {
                tenant_id: ctx.tenant_id,
                resource_type: ResourceType::Secret,
                resource_id: secret_id,
                relation: Relation::Owner,
                subject_type: SubjectType::User,
                subject_id: ctx.user_id.clone(),
                granted_by: ctx.numeric_user_id(),
                expires_at: None,
            };
            if let Err(e) = self.perm_repo.create(&owner).await {
                warn!(secret_id = %secret_id, error = %e, "Failed to grant owner permission");
            }
        }

        for perm in &req.initial_permissions {
            if perm.subject_id.is_empty() {
                warn!(secret_id = %secret_id, "Skipping initial permission with empty subject");
                continue;
            }
            // The creator already holds the owner grant.
            if perm.subject_type == SubjectType::User && perm.subject_id == ctx.user_id {
                continue;
            }
            let tuple = CreatePermissionTuple {
                tenant_id: ctx.tenant_id,
                resource_type: ResourceType::Secret,
                resource_id: secret_id,
                relation: perm.relation,
                subject_type: perm.subject_type,
                subject_id: perm.subject_id.clone(),
                granted_by: ctx.numeric_user_id(),
                expires_at: perm.expires_at,
            };
            if let Err(e) = self.perm_repo.create(&tuple).await {
                warn!(
                    secret_id = %secret_id,
                    subject = %format!("{}/{}", perm.subject_type, perm.subject_id),
                    error = %e,
                    "Failed to grant initial permission"
                );
            }
        }

        info!(
            tenant_id = ctx.tenant_id,
            user_id = %ctx.user_id,
            secret_id = %secret_id,
            name = %secret.name,
            "Secret created"
        );

        Ok(secret)
    }

    /// Gets a secret's catalog metadata.
    pub async fn get_secret(&self, ctx: &RequestContext, id: Uuid) -> AppResult<Secret> {
        self.checker
            .require_read(ctx, ResourceType::Secret, id)
            .await?;

        self.secret_repo
            .find_by_id(ctx.tenant_id, id)
            .await?
            .ok_or_else(|| AppError::not_found("Secret not found"))
    }

    /// Retrieves the password for a secret, current or a specific version.
    pub async fn get_secret_password(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        version: Option<i32>,
    ) -> AppResult<(String, i32)> {
        self.checker
            .require_read(ctx, ResourceType::Secret, id)
            .await?;

        let secret = self
            .secret_repo
            .find_by_id(ctx.tenant_id, id)
            .await?
            .ok_or_else(|| AppError::not_found("Secret not found"))?;

        match version {
            Some(number) if number > 0 => {
                self.version_repo
                    .find_by_number(id, number)
                    .await?
                    .ok_or_else(|| AppError::not_found("Version not found"))?;
                let password = self.vault.get_version(&secret.vault_path, number).await?;
                Ok((password, number))
            }
            _ => self.vault.get_current(&secret.vault_path).await,
        }
    }

    /// Lists secrets, filtering out rows the caller cannot read.
    ///
    /// The returned total is the post-filter count.
    pub async fn list_secrets(
        &self,
        ctx: &RequestContext,
        filter: SecretFilter,
        page: PageRequest,
    ) -> AppResult<PageResponse<Secret>> {
        let page = page.normalized();

        if let Some(Some(folder_id)) = filter.folder_id {
            self.checker
                .require_read(ctx, ResourceType::Folder, folder_id)
                .await?;
        }

        let result = self.secret_repo.list(ctx.tenant_id, &filter, &page).await?;
        self.filter_readable(ctx, result).await
    }

    /// Searches secrets by name across folders, optionally within a subtree.
    ///
    /// Denied rows are silently filtered; the total is post-filter.
    pub async fn search_secrets(
        &self,
        ctx: &RequestContext,
        query: &str,
        folder_id: Option<Uuid>,
        include_subfolders: bool,
        status: Option<SecretStatus>,
        page: PageRequest,
    ) -> AppResult<PageResponse<Secret>> {
        let page = page.normalized();

        let mut filter = SecretFilter {
            name_contains: Some(query.to_string()),
            status,
            ..Default::default()
        };

        if let Some(folder_id) = folder_id {
            let folder = self
                .folder_repo
                .find_by_id(ctx.tenant_id, folder_id)
                .await?
                .ok_or_else(|| AppError::not_found("Folder not found"))?;
            if include_subfolders {
                filter.path_prefix = Some(folder.path);
            } else {
                filter.folder_id = Some(Some(folder_id));
            }
        }

        let result = self.secret_repo.list(ctx.tenant_id, &filter, &page).await?;
        self.filter_readable(ctx, result).await
    }

    /// Updates secret metadata.
    pub async fn update_secret(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        changes: UpdateSecret,
    ) -> AppResult<Secret> {
        self.checker
            .require_write(ctx, ResourceType::Secret, id)
            .await?;

        self.secret_repo
            .update(ctx.tenant_id, id, &changes, ctx.numeric_user_id())
            .await
    }

    /// Moves a secret to a different folder.
    ///
    /// Requires WRITE on the secret and WRITE on the destination folder.
    pub async fn move_secret(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        new_folder_id: Option<Uuid>,
    ) -> AppResult<Secret> {
        self.checker
            .require_write(ctx, ResourceType::Secret, id)
            .await?;

        if let Some(folder_id) = new_folder_id {
            self.folder_repo
                .find_by_id(ctx.tenant_id, folder_id)
                .await?
                .ok_or_else(|| AppError::not_found("Folder not found"))?;
            self.checker
                .require_write(ctx, ResourceType::Folder, folder_id)
                .await?;
        }

        let secret = self
            .secret_repo
            .move_secret(ctx.tenant_id, id, new_folder_id, ctx.numeric_user_id())
            .await?;

        info!(
            tenant_id = ctx.tenant_id,
            user_id = %ctx.user_id,
            secret_id = %id,
            new_folder = ?new_folder_id,
            "Secret moved"
        );

        Ok(secret)
    }

    /// Deletes a secret.
    ///
    /// A soft delete flips the status and leaves the vault untouched. A
    /// permanent delete destroys the vault object, the version history, the
    /// catalog row, and the permission tuples; the steps are independent
    /// and failures do not abort the remaining ones.
    pub async fn delete_secret(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        permanent: bool,
    ) -> AppResult<()> {
        self.checker
            .require_delete(ctx, ResourceType::Secret, id)
            .await?;

        let secret = self
            .secret_repo
            .find_by_id(ctx.tenant_id, id)
            .await?
            .ok_or_else(|| AppError::not_found("Secret not found"))?;

        if permanent {
            self.purge(ctx, &secret).await?;
        } else {
            self.secret_repo
                .set_status(ctx.tenant_id, id, SecretStatus::Deleted, ctx.numeric_user_id())
                .await?;
        }

        info!(
            tenant_id = ctx.tenant_id,
            user_id = %ctx.user_id,
            secret_id = %id,
            permanent,
            "Secret deleted"
        );

        Ok(())
    }

    /// Permanently removes a secret from both stores.
    ///
    /// Callers have already authorized the operation. The four steps
    /// (vault destroy, version rows, catalog row, permission tuples) are
    /// independent: a failure is logged and does not stop the remaining
    /// steps.
    pub(crate) async fn purge(&self, ctx: &RequestContext, secret: &Secret) -> AppResult<()> {
        if let Err(e) = self.vault.destroy_all(&secret.vault_path).await {
            warn!(
                secret_id = %secret.id,
                vault_path = %secret.vault_path,
                error = %e,
                "Failed to destroy vault object"
            );
        }

        if let Err(e) = self.version_repo.delete_by_secret(secret.id).await {
            warn!(secret_id = %secret.id, error = %e, "Failed to delete version records");
        }

        if let Err(e) = self.secret_repo.delete_row(ctx.tenant_id, secret.id).await {
            warn!(secret_id = %secret.id, error = %e, "Failed to delete catalog row");
        }

        if let Err(e) = self
            .perm_repo
            .delete_by_resource(ctx.tenant_id, ResourceType::Secret, secret.id)
            .await
        {
            warn!(secret_id = %secret.id, error = %e, "Failed to delete permission tuples");
        }

        Ok(())
    }

    /// Drops rows the caller cannot READ and reports the post-filter count.
    async fn filter_readable(
        &self,
        ctx: &RequestContext,
        result: PageResponse<Secret>,
    ) -> AppResult<PageResponse<Secret>> {
        let mut accessible = Vec::with_capacity(result.items.len());
        for secret in result.items {
            if self
                .checker
                .can_read(ctx, ResourceType::Secret, secret.id)
                .await?
            {
                accessible.push(secret);
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
}
