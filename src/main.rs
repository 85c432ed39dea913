//! Warden server — multi-tenant secret management.
//!
//! Main entry point that wires the catalog, the authorization engine, and
//! the vault adapter together and waits for shutdown. The RPC transport is
//! hosted by the platform gateway and attaches to the services constructed
//! here.

use std::sync::Arc;

use tracing_subscriber::{fmt, EnvFilter};

use warden_authz::{CatalogLookup, Checker, Engine};
use warden_core::config::AppConfig;
use warden_core::error::AppError;
use warden_database::repositories::{
    FolderRepository, PermissionRepository, SecretRepository, SecretVersionRepository,
};
use warden_service::{
    FolderService, PermissionService, SecretService, Services, TreeService, VersionService,
};
use warden_vault::{MemoryVault, PasswordVault, VaultClient, VaultKv};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    }
}

/// Load configuration from file and environment.
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("WARDEN_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging.
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt().json().with_env_filter(filter).with_target(true).init();
        }
        _ => {
            fmt().pretty().with_env_filter(filter).with_target(true).init();
        }
    }
}

/// Main server run function.
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Connecting to database...");
    let db_pool = warden_database::DatabasePool::connect(&config.database).await?;
    warden_database::migration::run_migrations(db_pool.pool()).await?;

    let folder_repo = Arc::new(FolderRepository::new(db_pool.pool().clone()));
    let secret_repo = Arc::new(SecretRepository::new(db_pool.pool().clone()));
    let version_repo = Arc::new(SecretVersionRepository::new(db_pool.pool().clone()));
    let perm_repo = Arc::new(PermissionRepository::new(db_pool.pool().clone()));

    let vault_client = if config.vault.mode == "vault" {
        Some(VaultClient::connect(&config.vault).await?)
    } else {
        tracing::warn!("Using in-memory vault backend; passwords will not survive restarts");
        None
    };
    let vault: Arc<dyn PasswordVault> = match &vault_client {
        Some(client) => Arc::new(VaultKv::new(client.clone(), config.vault.mount_path.clone())),
        None => Arc::new(MemoryVault::new()),
    };

    let engine = Arc::new(Engine::new(
        perm_repo.clone(),
        Arc::new(CatalogLookup::new(folder_repo.clone(), secret_repo.clone())),
    ));
    let checker = Checker::new(engine.clone());

    let secrets = Arc::new(SecretService::new(
        secret_repo.clone(),
        version_repo.clone(),
        folder_repo.clone(),
        perm_repo.clone(),
        vault.clone(),
        checker.clone(),
        config.vault.mount_path.clone(),
    ));
    let services = Services {
        folders: FolderService::new(
            folder_repo.clone(),
            secret_repo.clone(),
            perm_repo.clone(),
            secrets.clone(),
            checker.clone(),
        ),
        trees: TreeService::new(folder_repo.clone(), checker.clone()),
        versions: VersionService::new(
            secret_repo.clone(),
            version_repo.clone(),
            vault.clone(),
            checker.clone(),
        ),
        permissions: PermissionService::new(
            perm_repo,
            folder_repo,
            secret_repo,
            engine,
            checker,
        ),
        secrets,
    };

    tracing::info!(
        advertise_address = %config.server.advertise_address,
        "Warden core ready"
    );
    serve(&services).await?;

    tracing::info!("Shutting down");
    if let Some(client) = vault_client {
        client.shutdown();
    }
    db_pool.close().await;

    Ok(())
}

/// Hand the services to the transport and block until shutdown.
///
/// The gRPC stack lives in the platform gateway; this process only keeps
/// the core alive until it receives a termination signal.
async fn serve(_services: &Services) -> Result<(), AppError> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| AppError::internal(format!("Failed to listen for shutdown signal: {e}")))
}
