//! Permission management services.

pub mod service;

pub use service::{GrantAccessRequest, PermissionService};
