//! Permission checking facade used by the lifecycle services.

use std::sync::Arc;

use uuid::Uuid;

use warden_core::{AppError, AppResult, RequestContext};
use warden_entity::permission::{Permission, Relation, ResourceType};

use crate::engine::{CheckDecision, CheckRequest, Engine};

/// Convenience wrapper around the [`Engine`] for the common
/// check-and-propagate pattern.
#[derive(Clone)]
pub struct Checker {
    engine: Arc<Engine>,
}

impl Checker {
    /// Creates a new permission checker.
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    /// The wrapped engine.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Checks a permission for the calling principal.
    ///
    /// Contexts carrying a platform-wide admin role are allowed without
    /// consulting the tuple store.
    pub async fn check(
        &self,
        ctx: &RequestContext,
        resource_type: ResourceType,
        resource_id: Uuid,
        permission: Permission,
    ) -> AppResult<CheckDecision> {
        if ctx.is_platform_admin() {
            return Ok(CheckDecision {
                allowed: true,
                relation: Some(Relation::Owner),
                reason: "platform administrator".to_string(),
            });
        }

        self.engine
            .check(&CheckRequest {
                tenant_id: ctx.tenant_id,
                user_id: ctx.user_id.clone(),
                roles: ctx.roles.clone(),
                resource_type,
                resource_id,
                permission,
            })
            .await
    }

    /// Checks a permission and maps a denial onto `AccessDenied` carrying
    /// the decision reason.
    pub async fn require(
        &self,
        ctx: &RequestContext,
        resource_type: ResourceType,
        resource_id: Uuid,
        permission: Permission,
    ) -> AppResult<()> {
        let decision = self
            .check(ctx, resource_type, resource_id, permission)
            .await?;
        if !decision.allowed {
            return Err(AppError::access_denied(format!(
                "access denied: {}",
                decision.reason
            )));
        }
        Ok(())
    }

    /// Requires READ on a resource.
    pub async fn require_read(
        &self,
        ctx: &RequestContext,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> AppResult<()> {
        self.require(ctx, resource_type, resource_id, Permission::Read)
            .await
    }

    /// Requires WRITE on a resource.
    pub async fn require_write(
        &self,
        ctx: &RequestContext,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> AppResult<()> {
        self.require(ctx, resource_type, resource_id, Permission::Write)
            .await
    }

    /// Requires DELETE on a resource.
    pub async fn require_delete(
        &self,
        ctx: &RequestContext,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> AppResult<()> {
        self.require(ctx, resource_type, resource_id, Permission::Delete)
            .await
    }

    /// Requires SHARE on a resource.
    pub async fn require_share(
        &self,
        ctx: &RequestContext,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> AppResult<()> {
        self.require(ctx, resource_type, resource_id, Permission::Share)
            .await
    }

    /// Whether the calling principal can READ a resource.
    ///
    /// Used by list/search flows that silently filter rather than fail.
    pub async fn can_read(
        &self,
        ctx: &RequestContext,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> AppResult<bool> {
        Ok(self
            .check(ctx, resource_type, resource_id, Permission::Read)
            .await?
            .allowed)
    }
}
