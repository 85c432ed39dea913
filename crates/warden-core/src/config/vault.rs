//! Vault KV store configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the external Vault KV v2 store.
///
/// AppRole credentials may be supplied inline, as file paths, or through the
/// `VAULT_ROLE_ID`/`VAULT_SECRET_ID` (or `*_FILE`) environment variables;
/// resolution happens in the vault client, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Vault server address.
    #[serde(default = "default_address")]
    pub address: String,
    /// Backend mode: `"vault"` for the real server, `"memory"` for the
    /// in-process store used in development.
    #[serde(default = "default_mode")]
    pub mode: String,
    /// AppRole role id.
    #[serde(default)]
    pub role_id: Option<String>,
    /// AppRole secret id.
    #[serde(default)]
    pub secret_id: Option<String>,
    /// Path to a file containing the role id.
    #[serde(default)]
    pub role_id_file: Option<String>,
    /// Path to a file containing the secret id.
    #[serde(default)]
    pub secret_id_file: Option<String>,
    /// KV v2 mount path.
    #[serde(default = "default_mount_path")]
    pub mount_path: String,
    /// Optional Vault namespace.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Maximum retries for failed requests.
    #[serde(default = "default_retry_max")]
    pub retry_max: u32,
    /// Minimum backoff between retries, in milliseconds.
    #[serde(default = "default_retry_wait_min_ms")]
    pub retry_wait_min_ms: u64,
    /// Maximum backoff between retries, in milliseconds.
    #[serde(default = "default_retry_wait_max_ms")]
    pub retry_wait_max_ms: u64,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            mode: default_mode(),
            role_id: None,
            secret_id: None,
            role_id_file: None,
            secret_id_file: None,
            mount_path: default_mount_path(),
            namespace: None,
            retry_max: default_retry_max(),
            retry_wait_min_ms: default_retry_wait_min_ms(),
            retry_wait_max_ms: default_retry_wait_max_ms(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_address() -> String {
    "http://localhost:8200".to_string()
}

fn default_mode() -> String {
    "vault".to_string()
}

fn default_mount_path() -> String {
    "warden".to_string()
}

fn default_retry_max() -> u32 {
    3
}

fn default_retry_wait_min_ms() -> u64 {
    1_000
}

fn default_retry_wait_max_ms() -> u64 {
    5_000
}

fn default_timeout() -> u64 {
    30
}
