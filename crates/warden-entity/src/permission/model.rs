//! Permission tuple entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::relation::{Relation, ResourceType, SubjectType};

/// A single authorization fact: `(resource, relation, subject)` scoped to a
/// tenant.
///
/// The 6-tuple `(tenant_id, resource_type, resource_id, relation,
/// subject_type, subject_id)` is unique. An expired tuple is ignored at
/// evaluation time but not auto-deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PermissionTuple {
    /// Surrogate row id.
    pub id: i64,
    /// Tenant the tuple belongs to.
    pub tenant_id: i64,
    /// Type of resource this tuple applies to.
    pub resource_type: ResourceType,
    /// ID of the folder or secret.
    pub resource_id: Uuid,
    /// The granted relation.
    pub relation: Relation,
    /// Type of subject holding the relation.
    pub subject_type: SubjectType,
    /// User id, role name, or the tenant-wide subject `"all"`.
    pub subject_id: String,
    /// User who granted this tuple.
    pub granted_by: Option<i64>,
    /// When this tuple expires (None = never).
    pub expires_at: Option<DateTime<Utc>>,
    /// When this tuple was created.
    pub created_at: DateTime<Utc>,
}

impl PermissionTuple {
    /// Whether this tuple has expired as of `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|exp| exp <= now).unwrap_or(false)
    }

    /// Whether this tuple has expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Data required to create a new permission tuple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePermissionTuple {
    /// Tenant the tuple belongs to.
    pub tenant_id: u32,
    /// Type of resource.
    pub resource_type: ResourceType,
    /// ID of the folder or secret.
    pub resource_id: Uuid,
    /// The granted relation.
    pub relation: Relation,
    /// Type of subject.
    pub subject_type: SubjectType,
    /// User id, role name, or `"all"`.
    pub subject_id: String,
    /// User granting the tuple.
    pub granted_by: Option<u32>,
    /// Optional expiry.
    pub expires_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn tuple(expires_at: Option<DateTime<Utc>>) -> PermissionTuple {
        PermissionTuple {
            id: 1,
            tenant_id: 7,
            resource_type: ResourceType::Secret,
            resource_id: Uuid::new_v4(),
            relation: Relation::Viewer,
            subject_type: SubjectType::User,
            subject_id: "11".to_string(),
            granted_by: None,
            expires_at,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_never_expires() {
        assert!(!tuple(None).is_expired());
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        assert!(tuple(Some(now - Duration::minutes(1))).is_expired_at(now));
        assert!(!tuple(Some(now + Duration::minutes(1))).is_expired_at(now));
    }
}
