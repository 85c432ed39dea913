//! Catalog-backed implementations of the engine's store and lookup seams.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use warden_core::AppResult;
use warden_database::repositories::folder::FolderRepository;
use warden_database::repositories::permission::PermissionRepository;
use warden_database::repositories::secret::SecretRepository;
use warden_entity::permission::{
    CreatePermissionTuple, PermissionTuple, ResourceType, SubjectType,
};

use crate::engine::{PermissionStore, ResourceLookup};

/// Resolves folder parents and secret containment from the catalog.
///
/// Unknown ids yield `None`; a missing row is "no parent", not an error.
#[derive(Clone)]
pub struct CatalogLookup {
    folder_repo: Arc<FolderRepository>,
    secret_repo: Arc<SecretRepository>,
}

impl CatalogLookup {
    /// Creates a new catalog lookup.
    pub fn new(folder_repo: Arc<FolderRepository>, secret_repo: Arc<SecretRepository>) -> Self {
        Self {
            folder_repo,
            secret_repo,
        }
    }
}

#[async_trait]
impl ResourceLookup for CatalogLookup {
    async fn folder_parent(&self, tenant_id: u32, folder_id: Uuid) -> AppResult<Option<Uuid>> {
        Ok(self
            .folder_repo
            .find_by_id(tenant_id, folder_id)
            .await?
            .and_then(|f| f.parent_id))
    }

    async fn secret_folder(&self, tenant_id: u32, secret_id: Uuid) -> AppResult<Option<Uuid>> {
        Ok(self
            .secret_repo
            .find_by_id(tenant_id, secret_id)
            .await?
            .and_then(|s| s.folder_id))
    }
}

#[async_trait]
impl PermissionStore for PermissionRepository {
    async fn exact(
        &self,
        tenant_id: u32,
        resource_type: ResourceType,
        resource_id: Uuid,
        subject_type: SubjectType,
        subject_id: &str,
    ) -> AppResult<Option<PermissionTuple>> {
        self.has_exact(tenant_id, resource_type, resource_id, subject_type, subject_id)
            .await
    }

    async fn resource_ids_by_subject(
        &self,
        tenant_id: u32,
        subject_type: SubjectType,
        subject_id: &str,
        resource_type: ResourceType,
    ) -> AppResult<Vec<Uuid>> {
        PermissionRepository::resource_ids_by_subject(
            self,
            tenant_id,
            subject_type,
            subject_id,
            resource_type,
        )
        .await
    }

    async fn insert(&self, tuple: CreatePermissionTuple) -> AppResult<PermissionTuple> {
        self.create(&tuple).await
    }
}
