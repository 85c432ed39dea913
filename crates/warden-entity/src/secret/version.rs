//! Secret version history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One entry in a secret's version history.
///
/// Version numbers are contiguous from 1 upward per secret and unique within
/// it. History is append-only; rows are pruned only on permanent delete.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SecretVersion {
    /// Surrogate row id.
    pub id: i64,
    /// Parent secret.
    pub secret_id: Uuid,
    /// Version number (1, 2, 3...).
    pub version_number: i32,
    /// Vault path holding this version.
    pub vault_path: String,
    /// Comment describing the change.
    pub comment: Option<String>,
    /// Hex SHA-256 checksum of the stored password (64 chars).
    pub checksum: String,
    /// User who created the version.
    pub created_by: Option<i64>,
    /// When the version was created.
    pub created_at: DateTime<Utc>,
}

/// Data required to record a new version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSecretVersion {
    /// Parent secret.
    pub secret_id: Uuid,
    /// Version number assigned by the KV store.
    pub version_number: i32,
    /// Vault path holding this version.
    pub vault_path: String,
    /// Comment describing the change.
    pub comment: Option<String>,
    /// Hex SHA-256 checksum of the stored password.
    pub checksum: String,
    /// User who created the version.
    pub created_by: Option<u32>,
}
