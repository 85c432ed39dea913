//! Folder lifecycle services.

pub mod service;
pub mod tree;

pub use service::{CreateFolderRequest, FolderDetails, FolderService};
pub use tree::TreeService;
