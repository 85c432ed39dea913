//! Secret entities: catalog metadata, status, and version history.

pub mod model;
pub mod status;
pub mod version;

pub use model::{CreateSecret, Secret, SecretFilter, UpdateSecret};
pub use status::SecretStatus;
pub use version::{CreateSecretVersion, SecretVersion};
