//! Folder entities and path helpers.

pub mod model;

pub use model::{child_path, is_descendant_path};
pub use model::{CreateFolder, Folder, FolderTreeNode};
