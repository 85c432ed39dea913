//! The authorization engine.
//!
//! Decision procedure for `check`, in contract order:
//!
//! 1. direct user tuple on the resource
//! 2. direct role tuple, per role in request order
//! 3. direct tenant-wide tuple (subject id `"all"`)
//! 4. the same three steps against each ancestor folder, walking up from the
//!    secret's folder or the folder's parent
//!
//! The first allowing tuple wins, which keeps decision reasons deterministic
//! even when several tuples could allow. Expired tuples are treated as
//! absent. The engine is stateless; every input flows in through the store
//! and lookup traits on each call.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use warden_core::AppResult;
use warden_entity::permission::{
    CreatePermissionTuple, Permission, PermissionTuple, Relation, ResourceType, SubjectType,
    ALL_PERMISSIONS, TENANT_WIDE_SUBJECT,
};

/// Read access to stored permission tuples, as required by the engine.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// The tuple for an exact `(resource, subject)` pair, if any.
    ///
    /// Callers apply expiration; the store returns the raw tuple.
    async fn exact(
        &self,
        tenant_id: u32,
        resource_type: ResourceType,
        resource_id: Uuid,
        subject_type: SubjectType,
        subject_id: &str,
    ) -> AppResult<Option<PermissionTuple>>;

    /// Ids of all resources of `resource_type` the subject holds tuples on.
    async fn resource_ids_by_subject(
        &self,
        tenant_id: u32,
        subject_type: SubjectType,
        subject_id: &str,
        resource_type: ResourceType,
    ) -> AppResult<Vec<Uuid>>;

    /// Persist a new tuple. Fails with `AlreadyExists` on the 6-tuple key.
    async fn insert(&self, tuple: CreatePermissionTuple) -> AppResult<PermissionTuple>;
}

/// Hierarchy lookups feeding the ancestor walk.
///
/// Implementations treat an unknown id as "no parent", not an error.
#[async_trait]
pub trait ResourceLookup: Send + Sync {
    /// Parent folder of a folder, when it has one.
    async fn folder_parent(&self, tenant_id: u32, folder_id: Uuid) -> AppResult<Option<Uuid>>;

    /// Containing folder of a secret, when it has one.
    async fn secret_folder(&self, tenant_id: u32, secret_id: Uuid) -> AppResult<Option<Uuid>>;
}

/// Inputs to a permission check.
///
/// Roles arrive with the request metadata and are carried here explicitly;
/// the engine never reaches into transport state.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    /// Tenant scope of the check.
    pub tenant_id: u32,
    /// Subject user id.
    pub user_id: String,
    /// Roles held by the user, in request order.
    pub roles: Vec<String>,
    /// Type of the resource being checked.
    pub resource_type: ResourceType,
    /// Id of the resource being checked.
    pub resource_id: Uuid,
    /// The permission required.
    pub permission: Permission,
}

/// Outcome of a permission check.
#[derive(Debug, Clone)]
pub struct CheckDecision {
    /// Whether access is allowed.
    pub allowed: bool,
    /// The relation that allowed access, when allowed.
    pub relation: Option<Relation>,
    /// Human-readable reason for the decision.
    pub reason: String,
}

impl CheckDecision {
    fn allow(relation: Relation, reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            relation: Some(relation),
            reason: reason.into(),
        }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            relation: None,
            reason: reason.into(),
        }
    }
}

/// Evaluates permission checks against the tuple store and the folder
/// hierarchy.
pub struct Engine {
    store: std::sync::Arc<dyn PermissionStore>,
    lookup: std::sync::Arc<dyn ResourceLookup>,
}

impl Engine {
    /// Creates a new authorization engine.
    pub fn new(
        store: std::sync::Arc<dyn PermissionStore>,
        lookup: std::sync::Arc<dyn ResourceLookup>,
    ) -> Self {
        Self { store, lookup }
    }

    /// Performs a permission check.
    pub async fn check(&self, req: &CheckRequest) -> AppResult<CheckDecision> {
        debug!(
            tenant_id = req.tenant_id,
            user_id = %req.user_id,
            resource = %format!("{}:{}", req.resource_type, req.resource_id),
            permission = %req.permission,
            "Checking permission"
        );

        // Step 1: direct user permission on the resource.
        if let Some(decision) = self
            .direct(
                req,
                req.resource_type,
                req.resource_id,
                SubjectType::User,
                &req.user_id,
            )
            .await?
        {
            return Ok(decision);
        }

        // Step 2: the user's roles, in request order.
        for role in &req.roles {
            if let Some(mut decision) = self
                .direct(
                    req,
                    req.resource_type,
                    req.resource_id,
                    SubjectType::Role,
                    role,
                )
                .await?
            {
                decision.reason = "direct permission via role".to_string();
                return Ok(decision);
            }
        }

        // Step 3: tenant-wide permission.
        if let Some(mut decision) = self
            .direct(
                req,
                req.resource_type,
                req.resource_id,
                SubjectType::Tenant,
                TENANT_WIDE_SUBJECT,
            )
            .await?
        {
            decision.reason = "direct permission via tenant".to_string();
            return Ok(decision);
        }

        // Step 4: walk ancestor folders.
        if let Some(decision) = self.check_hierarchy(req).await? {
            return Ok(decision);
        }

        Ok(CheckDecision::deny("no permission found"))
    }

    /// Checks for an unexpired tuple on `(resource, subject)` granting the
    /// required permission. Returns `None` when the step does not allow.
    async fn direct(
        &self,
        req: &CheckRequest,
        resource_type: ResourceType,
        resource_id: Uuid,
        subject_type: SubjectType,
        subject_id: &str,
    ) -> AppResult<Option<CheckDecision>> {
        let tuple = self
            .store
            .exact(
                req.tenant_id,
                resource_type,
                resource_id,
                subject_type,
                subject_id,
            )
            .await?;

        let Some(tuple) = tuple else {
            return Ok(None);
        };

        if tuple.is_expired_at(Utc::now()) {
            return Ok(None);
        }

        if tuple.relation.grants(req.permission) {
            return Ok(Some(CheckDecision::allow(
                tuple.relation,
                "direct permission",
            )));
        }

        Ok(None)
    }

    /// Re-runs the direct checks against each ancestor folder.
    async fn check_hierarchy(&self, req: &CheckRequest) -> AppResult<Option<CheckDecision>> {
        let mut current = match req.resource_type {
            ResourceType::Secret => {
                self.lookup
                    .secret_folder(req.tenant_id, req.resource_id)
                    .await?
            }
            ResourceType::Folder => {
                self.lookup
                    .folder_parent(req.tenant_id, req.resource_id)
                    .await?
            }
        };

        // Guards against corrupted parent pointers forming a cycle.
        let mut visited: HashSet<Uuid> = HashSet::new();

        while let Some(folder_id) = current {
            if !visited.insert(folder_id) {
                break;
            }

            if let Some(mut decision) = self
                .direct(
                    req,
                    ResourceType::Folder,
                    folder_id,
                    SubjectType::User,
                    &req.user_id,
                )
                .await?
            {
                decision.reason = "inherited from parent folder".to_string();
                return Ok(Some(decision));
            }

            for role in &req.roles {
                if let Some(mut decision) = self
                    .direct(req, ResourceType::Folder, folder_id, SubjectType::Role, role)
                    .await?
                {
                    decision.reason = "inherited from parent folder via role".to_string();
                    return Ok(Some(decision));
                }
            }

            if let Some(mut decision) = self
                .direct(
                    req,
                    ResourceType::Folder,
                    folder_id,
                    SubjectType::Tenant,
                    TENANT_WIDE_SUBJECT,
                )
                .await?
            {
                decision.reason = "inherited from parent folder via tenant".to_string();
                return Ok(Some(decision));
            }

            current = self.lookup.folder_parent(req.tenant_id, folder_id).await?;
        }

        Ok(None)
    }

    /// Ids of all resources of `resource_type` the user can reach through a
    /// direct tuple: their own, any of their roles', or the tenant-wide
    /// subject's. Ancestor inheritance is not materialised into this list.
    /// Duplicates are removed; order is unspecified.
    pub async fn list_accessible_resources(
        &self,
        tenant_id: u32,
        user_id: &str,
        roles: &[String],
        resource_type: ResourceType,
    ) -> AppResult<Vec<Uuid>> {
        let mut accessible: HashSet<Uuid> = HashSet::new();

        accessible.extend(
            self.store
                .resource_ids_by_subject(tenant_id, SubjectType::User, user_id, resource_type)
                .await?,
        );

        for role in roles {
            accessible.extend(
                self.store
                    .resource_ids_by_subject(tenant_id, SubjectType::Role, role, resource_type)
                    .await?,
            );
        }

        accessible.extend(
            self.store
                .resource_ids_by_subject(
                    tenant_id,
                    SubjectType::Tenant,
                    TENANT_WIDE_SUBJECT,
                    resource_type,
                )
                .await?,
        );

        Ok(accessible.into_iter().collect())
    }

    /// Evaluates `check` for every permission and returns the allowed set
    /// together with the highest relation observed.
    pub async fn effective_permissions(
        &self,
        tenant_id: u32,
        user_id: &str,
        roles: &[String],
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> AppResult<(Vec<Permission>, Option<Relation>)> {
        let mut allowed = Vec::new();
        let mut highest: Option<Relation> = None;

        for permission in ALL_PERMISSIONS {
            let req = CheckRequest {
                tenant_id,
                user_id: user_id.to_string(),
                roles: roles.to_vec(),
                resource_type,
                resource_id,
                permission,
            };
            let decision = self.check(&req).await?;
            if decision.allowed {
                allowed.push(permission);
                if let Some(relation) = decision.relation {
                    highest = match highest {
                        Some(current) if current.at_least(relation) => Some(current),
                        _ => Some(relation),
                    };
                }
            }
        }

        Ok((allowed, highest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::Mutex;

    /// In-memory tuple store keyed on the unique 6-tuple.
    #[derive(Default)]
    struct MemoryStore {
        tuples: Mutex<Vec<PermissionTuple>>,
        next_id: Mutex<i64>,
    }

    impl MemoryStore {
        fn grant(
            &self,
            tenant_id: u32,
            resource_type: ResourceType,
            resource_id: Uuid,
            relation: Relation,
            subject_type: SubjectType,
            subject_id: &str,
        ) {
            self.grant_expiring(
                tenant_id,
                resource_type,
                resource_id,
                relation,
                subject_type,
                subject_id,
                None,
            );
        }

        #[allow(clippy::too_many_arguments)]
        fn grant_expiring(
            &self,
            tenant_id: u32,
            resource_type: ResourceType,
            resource_id: Uuid,
            relation: Relation,
            subject_type: SubjectType,
            subject_id: &str,
            expires_at: Option<chrono::DateTime<Utc>>,
        ) {
            let mut id = self.next_id.lock().unwrap();
            *id += 1;
            self.tuples.lock().unwrap().push(PermissionTuple {
                id: *id,
                tenant_id: tenant_id as i64,
                resource_type,
                resource_id,
                relation,
                subject_type,
                subject_id: subject_id.to_string(),
                granted_by: None,
                expires_at,
                created_at: Utc::now(),
            });
        }
    }

    #[async_trait]
    impl PermissionStore for MemoryStore {
        async fn exact(
            &self,
            tenant_id: u32,
            resource_type: ResourceType,
            resource_id: Uuid,
            subject_type: SubjectType,
            subject_id: &str,
        ) -> AppResult<Option<PermissionTuple>> {
            Ok(self
                .tuples
                .lock()
                .unwrap()
                .iter()
                .find(|t| {
                    t.tenant_id == tenant_id as i64
                        && t.resource_type == resource_type
                        && t.resource_id == resource_id
                        && t.subject_type == subject_type
                        && t.subject_id == subject_id
                })
                .cloned())
        }

        async fn resource_ids_by_subject(
            &self,
            tenant_id: u32,
            subject_type: SubjectType,
            subject_id: &str,
            resource_type: ResourceType,
        ) -> AppResult<Vec<Uuid>> {
            Ok(self
                .tuples
                .lock()
                .unwrap()
                .iter()
                .filter(|t| {
                    t.tenant_id == tenant_id as i64
                        && t.subject_type == subject_type
                        && t.subject_id == subject_id
                        && t.resource_type == resource_type
                })
                .map(|t| t.resource_id)
                .collect())
        }

        async fn insert(&self, tuple: CreatePermissionTuple) -> AppResult<PermissionTuple> {
            self.grant_expiring(
                tuple.tenant_id,
                tuple.resource_type,
                tuple.resource_id,
                tuple.relation,
                tuple.subject_type,
                &tuple.subject_id,
                tuple.expires_at,
            );
            Ok(self.tuples.lock().unwrap().last().unwrap().clone())
        }
    }

    /// Static hierarchy: folder parents and secret containment.
    #[derive(Default)]
    struct MemoryLookup {
        folder_parents: HashMap<Uuid, Uuid>,
        secret_folders: HashMap<Uuid, Uuid>,
    }

    #[async_trait]
    impl ResourceLookup for MemoryLookup {
        async fn folder_parent(&self, _tenant_id: u32, folder_id: Uuid) -> AppResult<Option<Uuid>> {
            Ok(self.folder_parents.get(&folder_id).copied())
        }

        async fn secret_folder(&self, _tenant_id: u32, secret_id: Uuid) -> AppResult<Option<Uuid>> {
            Ok(self.secret_folders.get(&secret_id).copied())
        }
    }

    fn check_req(
        user: &str,
        roles: &[&str],
        resource_type: ResourceType,
        resource_id: Uuid,
        permission: Permission,
    ) -> CheckRequest {
        CheckRequest {
            tenant_id: 7,
            user_id: user.to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            resource_type,
            resource_id,
            permission,
        }
    }

    #[tokio::test]
    async fn test_direct_user_permission() {
        let store = Arc::new(MemoryStore::default());
        let secret = Uuid::new_v4();
        store.grant(
            7,
            ResourceType::Secret,
            secret,
            Relation::Owner,
            SubjectType::User,
            "11",
        );
        let engine = Engine::new(store, Arc::new(MemoryLookup::default()));

        let decision = engine
            .check(&check_req(
                "11",
                &[],
                ResourceType::Secret,
                secret,
                Permission::Write,
            ))
            .await
            .unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.relation, Some(Relation::Owner));
        assert_eq!(decision.reason, "direct permission");
    }

    #[tokio::test]
    async fn test_relation_must_grant_permission() {
        let store = Arc::new(MemoryStore::default());
        let secret = Uuid::new_v4();
        store.grant(
            7,
            ResourceType::Secret,
            secret,
            Relation::Viewer,
            SubjectType::User,
            "11",
        );
        let engine = Engine::new(store, Arc::new(MemoryLookup::default()));

        let read = engine
            .check(&check_req(
                "11",
                &[],
                ResourceType::Secret,
                secret,
                Permission::Read,
            ))
            .await
            .unwrap();
        assert!(read.allowed);

        let write = engine
            .check(&check_req(
                "11",
                &[],
                ResourceType::Secret,
                secret,
                Permission::Write,
            ))
            .await
            .unwrap();
        assert!(!write.allowed);
        assert_eq!(write.reason, "no permission found");
    }

    #[tokio::test]
    async fn test_role_permission_in_order() {
        let store = Arc::new(MemoryStore::default());
        let folder = Uuid::new_v4();
        store.grant(
            7,
            ResourceType::Folder,
            folder,
            Relation::Editor,
            SubjectType::Role,
            "ops",
        );
        let engine = Engine::new(store, Arc::new(MemoryLookup::default()));

        let decision = engine
            .check(&check_req(
                "22",
                &["dev", "ops"],
                ResourceType::Folder,
                folder,
                Permission::Write,
            ))
            .await
            .unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.reason, "direct permission via role");
        assert_eq!(decision.relation, Some(Relation::Editor));
    }

    #[tokio::test]
    async fn test_tenant_wide_permission() {
        let store = Arc::new(MemoryStore::default());
        let folder = Uuid::new_v4();
        store.grant(
            7,
            ResourceType::Folder,
            folder,
            Relation::Viewer,
            SubjectType::Tenant,
            TENANT_WIDE_SUBJECT,
        );
        let engine = Engine::new(store, Arc::new(MemoryLookup::default()));

        let decision = engine
            .check(&check_req(
                "anyone",
                &[],
                ResourceType::Folder,
                folder,
                Permission::Read,
            ))
            .await
            .unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.reason, "direct permission via tenant");
    }

    #[tokio::test]
    async fn test_secret_inherits_from_folder() {
        let store = Arc::new(MemoryStore::default());
        let folder = Uuid::new_v4();
        let secret = Uuid::new_v4();
        store.grant(
            7,
            ResourceType::Folder,
            folder,
            Relation::Viewer,
            SubjectType::User,
            "22",
        );

        let mut lookup = MemoryLookup::default();
        lookup.secret_folders.insert(secret, folder);
        let engine = Engine::new(store, Arc::new(lookup));

        // Read on the secret inherits the folder grant.
        let read = engine
            .check(&check_req(
                "22",
                &[],
                ResourceType::Secret,
                secret,
                Permission::Read,
            ))
            .await
            .unwrap();
        assert!(read.allowed);
        assert_eq!(read.reason, "inherited from parent folder");

        // Write is not granted by Viewer anywhere in the chain.
        let write = engine
            .check(&check_req(
                "22",
                &[],
                ResourceType::Secret,
                secret,
                Permission::Write,
            ))
            .await
            .unwrap();
        assert!(!write.allowed);
    }

    #[tokio::test]
    async fn test_inheritance_walks_multiple_levels() {
        let store = Arc::new(MemoryStore::default());
        let root = Uuid::new_v4();
        let mid = Uuid::new_v4();
        let leaf = Uuid::new_v4();
        let secret = Uuid::new_v4();
        store.grant(
            7,
            ResourceType::Folder,
            root,
            Relation::Editor,
            SubjectType::Role,
            "ops",
        );

        let mut lookup = MemoryLookup::default();
        lookup.folder_parents.insert(mid, root);
        lookup.folder_parents.insert(leaf, mid);
        lookup.secret_folders.insert(secret, leaf);
        let engine = Engine::new(store, Arc::new(lookup));

        let decision = engine
            .check(&check_req(
                "22",
                &["ops"],
                ResourceType::Secret,
                secret,
                Permission::Write,
            ))
            .await
            .unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.reason, "inherited from parent folder via role");
    }

    #[tokio::test]
    async fn test_expired_tuple_is_absent() {
        let store = Arc::new(MemoryStore::default());
        let secret = Uuid::new_v4();
        store.grant_expiring(
            7,
            ResourceType::Secret,
            secret,
            Relation::Owner,
            SubjectType::User,
            "11",
            Some(Utc::now() - Duration::minutes(5)),
        );
        let engine = Engine::new(store, Arc::new(MemoryLookup::default()));

        let decision = engine
            .check(&check_req(
                "11",
                &[],
                ResourceType::Secret,
                secret,
                Permission::Read,
            ))
            .await
            .unwrap();
        assert!(!decision.allowed);
        assert_eq!(decision.reason, "no permission found");
    }

    #[tokio::test]
    async fn test_corrupted_parent_cycle_terminates() {
        let store = Arc::new(MemoryStore::default());
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let mut lookup = MemoryLookup::default();
        lookup.folder_parents.insert(a, b);
        lookup.folder_parents.insert(b, a);
        let engine = Engine::new(store, Arc::new(lookup));

        let decision = engine
            .check(&check_req(
                "11",
                &[],
                ResourceType::Folder,
                a,
                Permission::Read,
            ))
            .await
            .unwrap();
        assert!(!decision.allowed);
    }

    #[tokio::test]
    async fn test_tenant_isolation() {
        let store = Arc::new(MemoryStore::default());
        let secret = Uuid::new_v4();
        store.grant(
            8,
            ResourceType::Secret,
            secret,
            Relation::Owner,
            SubjectType::User,
            "11",
        );
        let engine = Engine::new(store, Arc::new(MemoryLookup::default()));

        // Same user, same resource id, different tenant.
        let decision = engine
            .check(&check_req(
                "11",
                &[],
                ResourceType::Secret,
                secret,
                Permission::Read,
            ))
            .await
            .unwrap();
        assert!(!decision.allowed);
    }

    #[tokio::test]
    async fn test_effective_permissions() {
        let store = Arc::new(MemoryStore::default());
        let folder = Uuid::new_v4();
        let secret = Uuid::new_v4();
        store.grant(
            7,
            ResourceType::Secret,
            secret,
            Relation::Sharer,
            SubjectType::User,
            "11",
        );
        store.grant(
            7,
            ResourceType::Folder,
            folder,
            Relation::Editor,
            SubjectType::User,
            "11",
        );

        let mut lookup = MemoryLookup::default();
        lookup.secret_folders.insert(secret, folder);
        let engine = Engine::new(store, Arc::new(lookup));

        let (allowed, highest) = engine
            .effective_permissions(7, "11", &[], ResourceType::Secret, secret)
            .await
            .unwrap();

        // Sharer grants read/share directly; Editor on the folder adds write.
        assert!(allowed.contains(&Permission::Read));
        assert!(allowed.contains(&Permission::Write));
        assert!(allowed.contains(&Permission::Share));
        assert!(!allowed.contains(&Permission::Delete));
        assert_eq!(highest, Some(Relation::Editor));
    }

    #[tokio::test]
    async fn test_list_accessible_resources_deduplicates() {
        let store = Arc::new(MemoryStore::default());
        let s1 = Uuid::new_v4();
        let s2 = Uuid::new_v4();
        store.grant(
            7,
            ResourceType::Secret,
            s1,
            Relation::Owner,
            SubjectType::User,
            "11",
        );
        store.grant(
            7,
            ResourceType::Secret,
            s1,
            Relation::Viewer,
            SubjectType::Role,
            "ops",
        );
        store.grant(
            7,
            ResourceType::Secret,
            s2,
            Relation::Viewer,
            SubjectType::Tenant,
            TENANT_WIDE_SUBJECT,
        );
        let engine = Engine::new(store, Arc::new(MemoryLookup::default()));

        let ids = engine
            .list_accessible_resources(7, "11", &["ops".to_string()], ResourceType::Secret)
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&s1));
        assert!(ids.contains(&s2));
    }
}
