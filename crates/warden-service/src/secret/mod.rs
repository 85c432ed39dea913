//! Secret lifecycle services.

pub mod service;
pub mod version;

pub use service::{CreateSecretRequest, InitialPermission, SecretService};
pub use version::VersionService;
