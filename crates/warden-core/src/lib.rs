//! # warden-core
//!
//! Core crate for the Warden secret-management service. Contains the
//! unified error system, configuration schemas, the request context, and
//! shared pagination types.
//!
//! This crate has **no** internal dependencies on other Warden crates.

pub mod config;
pub mod context;
pub mod error;
pub mod result;
pub mod types;

pub use context::RequestContext;
pub use error::AppError;
pub use result::AppResult;
