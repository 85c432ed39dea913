//! Password versioning: update, history, and restore.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use warden_authz::Checker;
use warden_core::types::pagination::{PageRequest, PageResponse};
use warden_core::{AppError, AppResult, RequestContext};
use warden_database::repositories::secret::SecretRepository;
use warden_database::repositories::secret_version::SecretVersionRepository;
use warden_entity::permission::ResourceType;
use warden_entity::secret::model::Secret;
use warden_entity::secret::version::{CreateSecretVersion, SecretVersion};
use warden_vault::{checksum, PasswordVault};

/// Manages a secret's password version history.
#[derive(Clone)]
pub struct VersionService {
    secret_repo: Arc<SecretRepository>,
    version_repo: Arc<SecretVersionRepository>,
    vault: Arc<dyn PasswordVault>,
    checker: Checker,
}

impl VersionService {
    /// Creates a new version service.
    pub fn new(
        secret_repo: Arc<SecretRepository>,
        version_repo: Arc<SecretVersionRepository>,
        vault: Arc<dyn PasswordVault>,
        checker: Checker,
    ) -> Self {
        Self {
            secret_repo,
            version_repo,
            vault,
            checker,
        }
    }

    /// Stores a new password, appending a version.
    ///
    /// Ordering: vault put → history row → pointer advance. A failed
    /// history row is fatal and surfaces before the pointer moves, so
    /// `current_version` never exceeds the recorded history; the vault
    /// version written before the failure remains as orphan history.
    pub async fn update_password(
        &self,
        ctx: &RequestContext,
        secret_id: Uuid,
        password: &str,
        comment: Option<String>,
    ) -> AppResult<(Secret, SecretVersion)> {
        self.checker
            .require_write(ctx, ResourceType::Secret, secret_id)
            .await?;

        let secret = self
            .secret_repo
            .find_by_id(ctx.tenant_id, secret_id)
            .await?
            .ok_or_else(|| AppError::not_found("Secret not found"))?;

        let new_version = self.vault.put(&secret.vault_path, password, None).await?;

        let version = self
            .version_repo
            .create(&CreateSecretVersion {
                secret_id,
                version_number: new_version,
                vault_path: secret.vault_path.clone(),
                comment,
                checksum: checksum(password),
                created_by: ctx.numeric_user_id(),
            })
            .await?;

        let secret = self
            .secret_repo
            .update_version(ctx.tenant_id, secret_id, new_version, ctx.numeric_user_id())
            .await?;

        info!(
            tenant_id = ctx.tenant_id,
            user_id = %ctx.user_id,
            secret_id = %secret_id,
            version = new_version,
            "Secret password updated"
        );

        Ok((secret, version))
    }

    /// Restores a previous version by appending it as the new latest.
    ///
    /// The pointer never flips backwards: the restored payload is written
    /// as a fresh vault version with its own history row.
    pub async fn restore_version(
        &self,
        ctx: &RequestContext,
        secret_id: Uuid,
        version_number: i32,
        comment: Option<String>,
    ) -> AppResult<(Secret, SecretVersion)> {
        self.checker
            .require_write(ctx, ResourceType::Secret, secret_id)
            .await?;

        let secret = self
            .secret_repo
            .find_by_id(ctx.tenant_id, secret_id)
            .await?
            .ok_or_else(|| AppError::not_found("Secret not found"))?;

        self.version_repo
            .find_by_number(secret_id, version_number)
            .await?
            .ok_or_else(|| AppError::not_found("Version not found"))?;

        let password = self
            .vault
            .get_version(&secret.vault_path, version_number)
            .await?;

        let new_version = self.vault.put(&secret.vault_path, &password, None).await?;

        let comment =
            comment.unwrap_or_else(|| format!("Restored from version {version_number}"));

        let version = self
            .version_repo
            .create(&CreateSecretVersion {
                secret_id,
                version_number: new_version,
                vault_path: secret.vault_path.clone(),
                comment: Some(comment),
                checksum: checksum(&password),
                created_by: ctx.numeric_user_id(),
            })
            .await?;

        let secret = self
            .secret_repo
            .update_version(ctx.tenant_id, secret_id, new_version, ctx.numeric_user_id())
            .await?;

        info!(
            tenant_id = ctx.tenant_id,
            user_id = %ctx.user_id,
            secret_id = %secret_id,
            restored_from = version_number,
            new_version,
            "Secret version restored"
        );

        Ok((secret, version))
    }

    /// Lists the version history of a secret, newest first.
    pub async fn list_versions(
        &self,
        ctx: &RequestContext,
        secret_id: Uuid,
        page: PageRequest,
    ) -> AppResult<PageResponse<SecretVersion>> {
        let page = page.normalized();

        self.checker
            .require_read(ctx, ResourceType::Secret, secret_id)
            .await?;

        self.secret_repo
            .find_by_id(ctx.tenant_id, secret_id)
            .await?
            .ok_or_else(|| AppError::not_found("Secret not found"))?;

        self.version_repo.list(secret_id, &page).await
    }

    /// Gets a specific version record, optionally with its password.
    ///
    /// A vault failure while fetching the password is logged and leaves
    /// the password out rather than failing the metadata read.
    pub async fn get_version(
        &self,
        ctx: &RequestContext,
        secret_id: Uuid,
        version_number: i32,
        include_password: bool,
    ) -> AppResult<(SecretVersion, Option<String>)> {
        self.checker
            .require_read(ctx, ResourceType::Secret, secret_id)
            .await?;

        let version = self
            .version_repo
            .find_by_number(secret_id, version_number)
            .await?
            .ok_or_else(|| AppError::not_found("Version not found"))?;

        let password = if include_password {
            match self
                .vault
                .get_version(&version.vault_path, version_number)
                .await
            {
                Ok(password) => Some(password),
                Err(e) => {
                    warn!(
                        secret_id = %secret_id,
                        version = version_number,
                        error = %e,
                        "Failed to fetch password for version"
                    );
                    None
                }
            }
        } else {
            None
        };

        Ok((version, password))
    }
}
