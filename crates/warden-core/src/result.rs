//! Shared result alias.

use crate::error::AppError;

/// Result type used across all Warden crates.
pub type AppResult<T> = Result<T, AppError>;
