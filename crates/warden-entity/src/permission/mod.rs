//! Permission tuples and the relation algebra.

pub mod model;
pub mod relation;

pub use model::{CreatePermissionTuple, PermissionTuple};
pub use relation::{
    Permission, Relation, ResourceType, SubjectType, ALL_PERMISSIONS, TENANT_WIDE_SUBJECT,
};
