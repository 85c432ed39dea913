//! In-process versioned KV store.
//!
//! Implements [`PasswordVault`] with the same version semantics as the KV
//! v2 backend: monotonically increasing versions per path, per-version soft
//! delete and destroy, and metadata purge on destroy-all. Used by tests and
//! the `vault.mode = "memory"` development configuration.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use warden_core::{AppError, AppResult};

use crate::client::VaultHealth;
use crate::kv::{PasswordVault, VersionInfo};

#[derive(Debug, Clone)]
struct StoredVersion {
    password: String,
    created_at: String,
    deleted_at: Option<String>,
    destroyed: bool,
}

#[derive(Debug, Default)]
struct StoredObject {
    versions: HashMap<i32, StoredVersion>,
    current_version: i32,
}

/// In-memory [`PasswordVault`] implementation.
#[derive(Debug, Default)]
pub struct MemoryVault {
    objects: Mutex<HashMap<String, StoredObject>>,
    /// When set, the next `put` fails. Lets tests exercise compensation paths.
    fail_next_put: Mutex<bool>,
}

impl MemoryVault {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `put` fail with a vault error.
    pub fn fail_next_put(&self) {
        *self.fail_next_put.lock().unwrap() = true;
    }

    /// Whether any object exists at the path.
    pub fn contains(&self, path: &str) -> bool {
        self.objects.lock().unwrap().contains_key(path)
    }
}

#[async_trait]
impl PasswordVault for MemoryVault {
    async fn put(
        &self,
        path: &str,
        password: &str,
        _metadata: Option<HashMap<String, String>>,
    ) -> AppResult<i32> {
        if std::mem::take(&mut *self.fail_next_put.lock().unwrap()) {
            return Err(AppError::vault("injected put failure"));
        }

        let mut objects = self.objects.lock().unwrap();
        let object = objects.entry(path.to_string()).or_default();
        object.current_version += 1;
        object.versions.insert(
            object.current_version,
            StoredVersion {
                password: password.to_string(),
                created_at: Utc::now().to_rfc3339(),
                deleted_at: None,
                destroyed: false,
            },
        );
        Ok(object.current_version)
    }

    async fn get_current(&self, path: &str) -> AppResult<(String, i32)> {
        let objects = self.objects.lock().unwrap();
        let object = objects
            .get(path)
            .ok_or_else(|| AppError::not_found(format!("no secret data found at path: {path}")))?;
        let version = object
            .versions
            .get(&object.current_version)
            .filter(|v| !v.destroyed && v.deleted_at.is_none())
            .ok_or_else(|| AppError::not_found(format!("no secret data found at path: {path}")))?;
        Ok((version.password.clone(), object.current_version))
    }

    async fn get_version(&self, path: &str, version: i32) -> AppResult<String> {
        let objects = self.objects.lock().unwrap();
        let object = objects
            .get(path)
            .ok_or_else(|| AppError::not_found(format!("no secret data found at path: {path}")))?;
        object
            .versions
            .get(&version)
            .filter(|v| !v.destroyed && v.deleted_at.is_none())
            .map(|v| v.password.clone())
            .ok_or_else(|| {
                AppError::not_found(format!("no secret data found at path {path} version {version}"))
            })
    }

    async fn soft_delete_versions(&self, path: &str, versions: &[i32]) -> AppResult<()> {
        let mut objects = self.objects.lock().unwrap();
        if let Some(object) = objects.get_mut(path) {
            for number in versions {
                if let Some(version) = object.versions.get_mut(number) {
                    version.deleted_at = Some(Utc::now().to_rfc3339());
                }
            }
        }
        Ok(())
    }

    async fn undelete_versions(&self, path: &str, versions: &[i32]) -> AppResult<()> {
        let mut objects = self.objects.lock().unwrap();
        if let Some(object) = objects.get_mut(path) {
            for number in versions {
                if let Some(version) = object.versions.get_mut(number) {
                    version.deleted_at = None;
                }
            }
        }
        Ok(())
    }

    async fn destroy_versions(&self, path: &str, versions: &[i32]) -> AppResult<()> {
        let mut objects = self.objects.lock().unwrap();
        if let Some(object) = objects.get_mut(path) {
            for number in versions {
                if let Some(version) = object.versions.get_mut(number) {
                    version.password.clear();
                    version.destroyed = true;
                }
            }
        }
        Ok(())
    }

    async fn destroy_all(&self, path: &str) -> AppResult<()> {
        // Already gone counts as destroyed.
        self.objects.lock().unwrap().remove(path);
        Ok(())
    }

    async fn list_versions(&self, path: &str) -> AppResult<Vec<VersionInfo>> {
        let objects = self.objects.lock().unwrap();
        let object = objects
            .get(path)
            .ok_or_else(|| AppError::not_found(format!("no metadata at path: {path}")))?;
        let mut infos: Vec<VersionInfo> = object
            .versions
            .iter()
            .map(|(number, version)| VersionInfo {
                version: *number,
                created_at: Some(version.created_at.clone()),
                deleted_at: version.deleted_at.clone(),
                destroyed: version.destroyed,
            })
            .collect();
        infos.sort_by_key(|info| info.version);
        Ok(infos)
    }

    async fn current_version(&self, path: &str) -> AppResult<i32> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .get(path)
            .map(|o| o.current_version)
            .unwrap_or(0))
    }

    async fn health(&self) -> AppResult<VaultHealth> {
        Ok(VaultHealth {
            initialized: true,
            sealed: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_is_monotonic() {
        let vault = MemoryVault::new();
        assert_eq!(vault.put("warden/7/a", "p1", None).await.unwrap(), 1);
        assert_eq!(vault.put("warden/7/a", "p2", None).await.unwrap(), 2);
        assert_eq!(vault.put("warden/7/a", "p3", None).await.unwrap(), 3);
        assert_eq!(vault.current_version("warden/7/a").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_get_current_and_version() {
        let vault = MemoryVault::new();
        vault.put("warden/7/a", "p", None).await.unwrap();
        vault.put("warden/7/a", "q", None).await.unwrap();

        let (password, version) = vault.get_current("warden/7/a").await.unwrap();
        assert_eq!(password, "q");
        assert_eq!(version, 2);
        assert_eq!(vault.get_version("warden/7/a", 1).await.unwrap(), "p");
    }

    #[tokio::test]
    async fn test_restore_round_trip_at_kv_layer() {
        let vault = MemoryVault::new();
        let path = "warden/7/s1";
        vault.put(path, "p", None).await.unwrap();
        vault.put(path, "q", None).await.unwrap();
        vault.put(path, "r", None).await.unwrap();

        // Restore appends the old payload as a new version.
        let old = vault.get_version(path, 1).await.unwrap();
        let restored = vault.put(path, &old, None).await.unwrap();

        assert_eq!(restored, 4);
        let (current, version) = vault.get_current(path).await.unwrap();
        assert_eq!(current, "p");
        assert_eq!(version, 4);
        assert_eq!(vault.get_version(path, 2).await.unwrap(), "q");
    }

    #[tokio::test]
    async fn test_soft_delete_and_undelete() {
        let vault = MemoryVault::new();
        vault.put("warden/7/a", "p", None).await.unwrap();

        vault
            .soft_delete_versions("warden/7/a", &[1])
            .await
            .unwrap();
        assert!(vault.get_version("warden/7/a", 1).await.is_err());

        vault.undelete_versions("warden/7/a", &[1]).await.unwrap();
        assert_eq!(vault.get_version("warden/7/a", 1).await.unwrap(), "p");
    }

    #[tokio::test]
    async fn test_destroy_versions_is_permanent() {
        let vault = MemoryVault::new();
        vault.put("warden/7/a", "p", None).await.unwrap();
        vault.destroy_versions("warden/7/a", &[1]).await.unwrap();
        assert!(vault.get_version("warden/7/a", 1).await.is_err());

        // Undelete cannot bring a destroyed version back.
        vault.undelete_versions("warden/7/a", &[1]).await.unwrap();
        assert!(vault.get_version("warden/7/a", 1).await.is_err());
    }

    #[tokio::test]
    async fn test_destroy_all_is_idempotent() {
        let vault = MemoryVault::new();
        vault.put("warden/7/a", "p", None).await.unwrap();

        vault.destroy_all("warden/7/a").await.unwrap();
        assert!(!vault.contains("warden/7/a"));
        assert!(vault.get_current("warden/7/a").await.is_err());
        assert_eq!(vault.current_version("warden/7/a").await.unwrap(), 0);

        // Destroying a missing object still succeeds.
        vault.destroy_all("warden/7/a").await.unwrap();
    }

    #[tokio::test]
    async fn test_injected_put_failure() {
        let vault = MemoryVault::new();
        vault.fail_next_put();
        assert!(vault.put("warden/7/a", "p", None).await.is_err());
        assert!(!vault.contains("warden/7/a"));

        // The failure is one-shot; the retry succeeds cleanly.
        assert_eq!(vault.put("warden/7/a", "p", None).await.unwrap(), 1);
    }
}
