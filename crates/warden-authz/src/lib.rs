//! # warden-authz
//!
//! Relationship-based authorization for Warden. The [`engine::Engine`]
//! evaluates permission checks against stored tuples, walking the folder
//! hierarchy; the [`checker::Checker`] is the facade services call.

pub mod checker;
pub mod engine;
pub mod lookup;

pub use checker::Checker;
pub use engine::{CheckDecision, CheckRequest, Engine, PermissionStore, ResourceLookup};
pub use lookup::CatalogLookup;
