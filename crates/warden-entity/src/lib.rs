//! # warden-entity
//!
//! Domain entities for the Warden secret-management service: folders,
//! secrets, secret versions, permission tuples, and the closed relation
//! algebra that maps relations onto granted permissions.

pub mod folder;
pub mod permission;
pub mod secret;
