//! Secret entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::status::SecretStatus;

/// A secret's catalog row.
///
/// The password itself never touches the catalog: `vault_path` points at the
/// versioned object in the external KV store, and `current_version` tracks
/// the highest version recorded in history.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Secret {
    /// Unique secret identifier.
    pub id: Uuid,
    /// Tenant owning the secret.
    pub tenant_id: i64,
    /// Containing folder (null for root-level secrets).
    pub folder_id: Option<Uuid>,
    /// Secret name, unique within `(tenant, folder)`.
    pub name: String,
    /// Associated username.
    pub username: Option<String>,
    /// Host or URL the credential belongs to.
    pub host_url: Option<String>,
    /// Reference path into the external KV store. Globally unique.
    pub vault_path: String,
    /// Current active version number (>= 1).
    pub current_version: i32,
    /// Custom fields, notes, tags.
    pub metadata: Option<serde_json::Value>,
    /// Optional description.
    pub description: Option<String>,
    /// Lifecycle status.
    pub status: SecretStatus,
    /// User who created the secret.
    pub created_by: Option<i64>,
    /// User who last updated the secret.
    pub updated_by: Option<i64>,
    /// When the secret was created.
    pub created_at: DateTime<Utc>,
    /// When the secret was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Data required to create a new secret row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSecret {
    /// Pre-allocated secret id (also embedded in the vault path).
    pub id: Uuid,
    /// Tenant owning the secret.
    pub tenant_id: u32,
    /// Containing folder.
    pub folder_id: Option<Uuid>,
    /// Secret name.
    pub name: String,
    /// Associated username.
    pub username: Option<String>,
    /// Host or URL.
    pub host_url: Option<String>,
    /// Reference path into the external KV store.
    pub vault_path: String,
    /// Custom fields, notes, tags.
    pub metadata: Option<serde_json::Value>,
    /// Optional description.
    pub description: Option<String>,
    /// User creating the secret.
    pub created_by: Option<u32>,
}

/// Metadata fields updatable on a secret. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSecret {
    /// New name.
    pub name: Option<String>,
    /// New username.
    pub username: Option<String>,
    /// New host or URL.
    pub host_url: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// Replacement metadata map.
    pub metadata: Option<serde_json::Value>,
    /// New status.
    pub status: Option<SecretStatus>,
}

/// Filters applied to secret list/search queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretFilter {
    /// Restrict to a folder. `Some(None)` matches root-level secrets.
    pub folder_id: Option<Option<Uuid>>,
    /// Restrict to secrets whose folder path lies under this prefix.
    pub path_prefix: Option<String>,
    /// Restrict to a status.
    pub status: Option<SecretStatus>,
    /// Substring match on the name.
    pub name_contains: Option<String>,
}
