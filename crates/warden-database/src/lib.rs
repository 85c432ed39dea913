//! # warden-database
//!
//! PostgreSQL persistence for the Warden catalog: folders, secrets, secret
//! versions, and permission tuples.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
