//! # warden-service
//!
//! Lifecycle orchestration for the Warden secret-management service. The
//! services here combine the catalog repositories, the authorization
//! checker, and the vault adapter, owning the cross-store ordering and
//! compensation rules for every operation.

pub mod folder;
pub mod permission;
pub mod secret;

pub use folder::service::FolderService;
pub use folder::tree::TreeService;
pub use permission::service::PermissionService;
pub use secret::service::SecretService;
pub use secret::version::VersionService;

/// The full set of core services the transport layer binds to.
#[derive(Clone)]
pub struct Services {
    /// Folder lifecycle.
    pub folders: FolderService,
    /// Folder tree queries.
    pub trees: TreeService,
    /// Secret lifecycle.
    pub secrets: std::sync::Arc<SecretService>,
    /// Password version history.
    pub versions: VersionService,
    /// Permission management.
    pub permissions: PermissionService,
}
