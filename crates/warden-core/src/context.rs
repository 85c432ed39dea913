//! Request context carrying the calling principal.
//!
//! The transport layer authenticates requests and forwards the principal as
//! request-scoped metadata headers. The context constructor owns the parsing
//! of those headers; core operations never reach into transport state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Metadata header carrying the tenant id (unsigned 32-bit decimal).
pub const HEADER_TENANT_ID: &str = "x-md-global-tenant-id";
/// Metadata header carrying the user id (decimal string).
pub const HEADER_USER_ID: &str = "x-md-global-user-id";
/// Metadata header carrying the username.
pub const HEADER_USERNAME: &str = "x-md-global-username";
/// Metadata header carrying comma-separated role names.
pub const HEADER_ROLES: &str = "x-md-global-roles";

/// Reserved role granting platform-wide privileges.
pub const ROLE_PLATFORM_ADMIN: &str = "platform:admin";
/// Reserved role granting platform-wide privileges.
pub const ROLE_SUPER_ADMIN: &str = "super:admin";

/// Context for the current request.
///
/// Extracted from transport metadata and passed into service methods so that
/// every operation knows *who* is acting and in *which* tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// Tenant the request operates in. 0 means no tenant.
    pub tenant_id: u32,
    /// The acting user's id.
    pub user_id: String,
    /// The acting user's name (convenience field).
    pub username: String,
    /// Role names attached to the request, in header order.
    pub roles: Vec<String>,
}

impl RequestContext {
    /// Creates a new request context.
    pub fn new(
        tenant_id: u32,
        user_id: impl Into<String>,
        username: impl Into<String>,
        roles: Vec<String>,
    ) -> Self {
        Self {
            tenant_id,
            user_id: user_id.into(),
            username: username.into(),
            roles,
        }
    }

    /// Builds a context from request metadata headers.
    ///
    /// An absent or unparseable tenant id yields tenant 0. The roles header
    /// is split on commas with entries trimmed and empty entries dropped.
    pub fn from_metadata(metadata: &HashMap<String, String>) -> Self {
        let tenant_id = metadata
            .get(HEADER_TENANT_ID)
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(0);

        let user_id = metadata.get(HEADER_USER_ID).cloned().unwrap_or_default();
        let username = metadata.get(HEADER_USERNAME).cloned().unwrap_or_default();

        let roles = metadata
            .get(HEADER_ROLES)
            .map(|raw| parse_roles(raw))
            .unwrap_or_default();

        Self {
            tenant_id,
            user_id,
            username,
            roles,
        }
    }

    /// Whether the request carries a platform-wide admin role.
    pub fn is_platform_admin(&self) -> bool {
        self.roles
            .iter()
            .any(|r| r == ROLE_PLATFORM_ADMIN || r == ROLE_SUPER_ADMIN)
    }

    /// The acting user's id as a numeric value, when it parses as one.
    ///
    /// Used for `created_by`/`updated_by` audit columns.
    pub fn numeric_user_id(&self) -> Option<u32> {
        self.user_id.trim().parse().ok()
    }
}

/// Splits a comma-separated roles header, trimming whitespace and dropping
/// empty entries.
fn parse_roles(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_from_metadata() {
        let ctx = RequestContext::from_metadata(&metadata(&[
            (HEADER_TENANT_ID, "7"),
            (HEADER_USER_ID, "11"),
            (HEADER_USERNAME, "alice"),
            (HEADER_ROLES, "dev-team, ops ,, security"),
        ]));
        assert_eq!(ctx.tenant_id, 7);
        assert_eq!(ctx.user_id, "11");
        assert_eq!(ctx.username, "alice");
        assert_eq!(ctx.roles, vec!["dev-team", "ops", "security"]);
        assert_eq!(ctx.numeric_user_id(), Some(11));
    }

    #[test]
    fn test_missing_tenant_defaults_to_zero() {
        let ctx = RequestContext::from_metadata(&metadata(&[(HEADER_USER_ID, "11")]));
        assert_eq!(ctx.tenant_id, 0);

        let ctx =
            RequestContext::from_metadata(&metadata(&[(HEADER_TENANT_ID, "not-a-number")]));
        assert_eq!(ctx.tenant_id, 0);
    }

    #[test]
    fn test_empty_roles_header() {
        let ctx = RequestContext::from_metadata(&metadata(&[(HEADER_ROLES, " , ,")]));
        assert!(ctx.roles.is_empty());
        assert!(!ctx.is_platform_admin());
    }

    #[test]
    fn test_platform_admin_detection() {
        let ctx = RequestContext::from_metadata(&metadata(&[(
            HEADER_ROLES,
            "dev-team,platform:admin",
        )]));
        assert!(ctx.is_platform_admin());

        let ctx = RequestContext::new(1, "9", "root", vec!["super:admin".into()]);
        assert!(ctx.is_platform_admin());
    }

    #[test]
    fn test_non_numeric_user_id() {
        let ctx = RequestContext::new(1, "svc-account", "svc", vec![]);
        assert_eq!(ctx.numeric_user_id(), None);
    }
}
