//! Versioned password storage over a Vault KV v2 mount.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use warden_core::{AppError, AppResult};

use crate::client::{VaultClient, VaultHealth};

/// Version bookkeeping reported by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Version number.
    pub version: i32,
    /// Creation timestamp, as reported by the store.
    pub created_at: Option<String>,
    /// Soft-deletion timestamp, when the version is deleted.
    pub deleted_at: Option<String>,
    /// Whether the version payload has been destroyed.
    pub destroyed: bool,
}

/// Uniform interface over a versioned key-value store holding passwords.
///
/// Paths follow `{mount}/{tenant_id}/{secret_id}` and are globally unique.
/// Destroy operations tolerate "already gone" as success.
#[async_trait]
pub trait PasswordVault: Send + Sync {
    /// Store a password, creating a new version. Returns the version number.
    async fn put(
        &self,
        path: &str,
        password: &str,
        metadata: Option<HashMap<String, String>>,
    ) -> AppResult<i32>;

    /// The current password and its version.
    async fn get_current(&self, path: &str) -> AppResult<(String, i32)>;

    /// The password at a specific version.
    async fn get_version(&self, path: &str, version: i32) -> AppResult<String>;

    /// Soft-delete the given versions; they remain recoverable.
    async fn soft_delete_versions(&self, path: &str, versions: &[i32]) -> AppResult<()>;

    /// Recover soft-deleted versions.
    async fn undelete_versions(&self, path: &str, versions: &[i32]) -> AppResult<()>;

    /// Permanently destroy the given versions.
    async fn destroy_versions(&self, path: &str, versions: &[i32]) -> AppResult<()>;

    /// Permanently destroy every version and the object's metadata.
    async fn destroy_all(&self, path: &str) -> AppResult<()>;

    /// Version bookkeeping for the object.
    async fn list_versions(&self, path: &str) -> AppResult<Vec<VersionInfo>>;

    /// The current version number, 0 when the object does not exist.
    async fn current_version(&self, path: &str) -> AppResult<i32>;

    /// Liveness and seal state of the backing store.
    async fn health(&self) -> AppResult<VaultHealth>;
}

/// Build the storage path for a secret: `{mount}/{tenant_id}/{secret_id}`.
pub fn build_vault_path(mount: &str, tenant_id: u32, secret_id: &str) -> String {
    format!("{mount}/{tenant_id}/{secret_id}")
}

/// Hex-encoded SHA-256 of the password bytes (64 chars).
pub fn checksum(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// KV v2 implementation of [`PasswordVault`].
#[derive(Clone)]
pub struct VaultKv {
    client: VaultClient,
    mount: String,
}

impl VaultKv {
    /// Create a new KV store over the given client and mount.
    pub fn new(client: VaultClient, mount: impl Into<String>) -> Self {
        Self {
            client,
            mount: mount.into(),
        }
    }

    /// The configured mount path.
    pub fn mount(&self) -> &str {
        &self.mount
    }

    /// Build the catalog-visible path for a secret.
    pub fn path_for(&self, tenant_id: u32, secret_id: &str) -> String {
        build_vault_path(&self.mount, tenant_id, secret_id)
    }

    /// API path for a KV v2 operation on a stored path.
    ///
    /// Stored paths carry the mount prefix; the API addresses the mount and
    /// the relative path separately.
    fn api_path(&self, op: &str, vault_path: &str) -> String {
        let relative = vault_path
            .strip_prefix(&format!("{}/", self.mount))
            .unwrap_or(vault_path);
        format!("{}/{}/{}", self.mount, op, relative)
    }
}

#[async_trait]
impl PasswordVault for VaultKv {
    async fn put(
        &self,
        path: &str,
        password: &str,
        metadata: Option<HashMap<String, String>>,
    ) -> AppResult<i32> {
        let mut data = serde_json::json!({ "password": password });
        if let Some(metadata) = metadata {
            data["metadata"] = serde_json::to_value(metadata)?;
        }

        let response = self
            .client
            .request(
                Method::POST,
                &self.api_path("data", path),
                Some(serde_json::json!({ "data": data })),
            )
            .await?
            .ok_or_else(|| AppError::vault("empty response from Vault put"))?;

        let version = response
            .pointer("/data/version")
            .and_then(|v| v.as_i64())
            .unwrap_or(1);
        Ok(version as i32)
    }

    async fn get_current(&self, path: &str) -> AppResult<(String, i32)> {
        let response = self
            .client
            .request(Method::GET, &self.api_path("data", path), None)
            .await?
            .ok_or_else(|| AppError::not_found(format!("no secret data found at path: {path}")))?;

        let password = response
            .pointer("/data/data/password")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AppError::vault("password field not found or invalid type"))?
            .to_string();
        let version = response
            .pointer("/data/metadata/version")
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        Ok((password, version as i32))
    }

    async fn get_version(&self, path: &str, version: i32) -> AppResult<String> {
        let api_path = format!("{}?version={version}", self.api_path("data", path));
        let response = self
            .client
            .request(Method::GET, &api_path, None)
            .await?
            .ok_or_else(|| AppError::not_found(format!("no secret data found at path: {path}")))?;

        response
            .pointer("/data/data/password")
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| AppError::vault("password field not found or invalid type"))
    }

    async fn soft_delete_versions(&self, path: &str, versions: &[i32]) -> AppResult<()> {
        self.client
            .request(
                Method::POST,
                &self.api_path("delete", path),
                Some(serde_json::json!({ "versions": versions })),
            )
            .await?;
        Ok(())
    }

    async fn undelete_versions(&self, path: &str, versions: &[i32]) -> AppResult<()> {
        self.client
            .request(
                Method::POST,
                &self.api_path("undelete", path),
                Some(serde_json::json!({ "versions": versions })),
            )
            .await?;
        Ok(())
    }

    async fn destroy_versions(&self, path: &str, versions: &[i32]) -> AppResult<()> {
        self.client
            .request(
                Method::POST,
                &self.api_path("destroy", path),
                Some(serde_json::json!({ "versions": versions })),
            )
            .await?;
        Ok(())
    }

    async fn destroy_all(&self, path: &str) -> AppResult<()> {
        match self
            .client
            .request(Method::DELETE, &self.api_path("metadata", path), None)
            .await
        {
            Ok(_) => Ok(()),
            // Already gone counts as destroyed.
            Err(e) if e.is_kind(warden_core::error::ErrorKind::NotFound) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn list_versions(&self, path: &str) -> AppResult<Vec<VersionInfo>> {
        let response = self
            .client
            .request(Method::GET, &self.api_path("metadata", path), None)
            .await?
            .ok_or_else(|| AppError::not_found(format!("no metadata at path: {path}")))?;

        let Some(versions) = response.pointer("/data/versions").and_then(|v| v.as_object()) else {
            return Ok(Vec::new());
        };

        let mut infos = Vec::with_capacity(versions.len());
        for (version_str, meta) in versions {
            let version: i32 = version_str.parse().unwrap_or(0);
            infos.push(VersionInfo {
                version,
                created_at: meta
                    .get("created_time")
                    .and_then(|v| v.as_str())
                    .filter(|s| !s.is_empty())
                    .map(String::from),
                deleted_at: meta
                    .get("deletion_time")
                    .and_then(|v| v.as_str())
                    .filter(|s| !s.is_empty())
                    .map(String::from),
                destroyed: meta
                    .get("destroyed")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false),
            });
        }
        infos.sort_by_key(|info| info.version);
        Ok(infos)
    }

    async fn current_version(&self, path: &str) -> AppResult<i32> {
        let response = self
            .client
            .request(Method::GET, &self.api_path("metadata", path), None)
            .await?;

        Ok(response
            .and_then(|v| v.pointer("/data/current_version").and_then(|v| v.as_i64()))
            .unwrap_or(0) as i32)
    }

    async fn health(&self) -> AppResult<VaultHealth> {
        self.client.health().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_vault_path() {
        assert_eq!(
            build_vault_path("warden", 7, "4f7a9c"),
            "warden/7/4f7a9c"
        );
    }

    #[test]
    fn test_checksum_shape_and_value() {
        let sum = checksum("p");
        assert_eq!(sum.len(), 64);
        assert_eq!(
            sum,
            "148de9c5a7a44d19e56cd9ae1a554bf67847afb0c58f6e12fa29ac7ddfca9940"
        );
        assert_eq!(
            checksum("correct horse battery staple"),
            "c4bbcb1fbec99d65bf59d85c8cb62ee2db963f0fe106f483d9afa73bd4e39a8a"
        );
    }
}
