//! # warden-vault
//!
//! Uniform interface over a versioned key-value store holding password
//! payloads. [`kv::PasswordVault`] is the seam the secret lifecycle talks
//! to; [`kv::VaultKv`] implements it against a HashiCorp Vault KV v2 mount
//! and [`memory::MemoryVault`] implements it in process for development
//! and tests.

pub mod client;
pub mod kv;
pub mod memory;

pub use client::{VaultClient, VaultHealth};
pub use kv::{build_vault_path, checksum, PasswordVault, VaultKv, VersionInfo};
pub use memory::MemoryVault;
