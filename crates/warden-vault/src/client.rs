//! HashiCorp Vault API client with AppRole authentication.
//!
//! The client holds a renewable token behind a lock. A single background
//! task, started at construction and stopped through [`VaultClient::shutdown`],
//! renews the token ahead of expiry and re-authenticates from the persisted
//! AppRole credentials once the lease can no longer be renewed.

use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::{watch, RwLock};
use tracing::{debug, error, info, warn};

use warden_core::config::VaultConfig;
use warden_core::{AppError, AppResult};

/// Environment variables consulted for AppRole credentials.
const ENV_ROLE_ID: &str = "VAULT_ROLE_ID";
const ENV_SECRET_ID: &str = "VAULT_SECRET_ID";
const ENV_ROLE_ID_FILE: &str = "VAULT_ROLE_ID_FILE";
const ENV_SECRET_ID_FILE: &str = "VAULT_SECRET_ID_FILE";

/// Liveness and seal state reported by the Vault server.
#[derive(Debug, Clone, Deserialize)]
pub struct VaultHealth {
    /// Whether the server has been initialized.
    #[serde(default)]
    pub initialized: bool,
    /// Whether the server is sealed.
    #[serde(default)]
    pub sealed: bool,
}

#[derive(Debug, Deserialize)]
struct AuthInfo {
    client_token: String,
    #[serde(default)]
    lease_duration: u64,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    auth: AuthInfo,
}

struct Inner {
    http: reqwest::Client,
    address: String,
    namespace: Option<String>,
    role_id: String,
    secret_id: String,
    retry_max: u32,
    retry_wait_min: Duration,
    retry_wait_max: Duration,
    token: RwLock<Option<String>>,
}

/// Vault API client shared by all requests.
#[derive(Clone)]
pub struct VaultClient {
    inner: std::sync::Arc<Inner>,
    shutdown: watch::Sender<bool>,
}

impl VaultClient {
    /// Connects to Vault, authenticates with AppRole when credentials are
    /// available, and starts the token renewal task.
    pub async fn connect(config: &VaultConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| {
                AppError::with_source(
                    warden_core::error::ErrorKind::Vault,
                    "Failed to build HTTP client",
                    e,
                )
            })?;

        let (role_id, secret_id) = resolve_credentials(config)?;

        let inner = std::sync::Arc::new(Inner {
            http,
            address: config.address.trim_end_matches('/').to_string(),
            namespace: config.namespace.clone(),
            role_id,
            secret_id,
            retry_max: config.retry_max,
            retry_wait_min: Duration::from_millis(config.retry_wait_min_ms),
            retry_wait_max: Duration::from_millis(config.retry_wait_max_ms),
            token: RwLock::new(None),
        });

        let (shutdown, shutdown_rx) = watch::channel(false);
        let client = Self { inner, shutdown };

        if !client.inner.role_id.is_empty() && !client.inner.secret_id.is_empty() {
            let lease = client.inner.login().await?;
            tokio::spawn(renew_loop(client.inner.clone(), lease, shutdown_rx));
        } else {
            warn!("No AppRole credentials configured; Vault requests will be unauthenticated");
        }

        Ok(client)
    }

    /// Stops the background token renewal task.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        info!("Vault token renewal stopped");
    }

    /// Vault liveness and seal state.
    ///
    /// The health endpoint encodes state in the HTTP status; any response
    /// with a parseable body counts as reachable.
    pub async fn health(&self) -> AppResult<VaultHealth> {
        let url = format!("{}/v1/sys/health", self.inner.address);
        let response = self
            .inner
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| {
                AppError::with_source(
                    warden_core::error::ErrorKind::Vault,
                    "Vault health check failed",
                    e,
                )
            })?;

        response.json::<VaultHealth>().await.map_err(|e| {
            AppError::with_source(
                warden_core::error::ErrorKind::Vault,
                "Vault health response malformed",
                e,
            )
        })
    }

    /// Whether Vault is sealed. Errors are reported as sealed.
    pub async fn is_sealed(&self) -> bool {
        self.health().await.map(|h| h.sealed).unwrap_or(true)
    }

    /// Issues an authenticated request against the Vault API, retrying
    /// transient failures with bounded backoff.
    ///
    /// `api_path` is relative to `/v1/` (e.g. `warden/data/7/abc`). Returns
    /// the response body, or `None` for 204 responses. 404 maps onto
    /// `NotFound`; other non-success statuses map onto `Vault`.
    pub(crate) async fn request(
        &self,
        method: Method,
        api_path: &str,
        body: Option<Value>,
    ) -> AppResult<Option<Value>> {
        let url = format!("{}/v1/{}", self.inner.address, api_path);
        let mut attempt = 0u32;
        let mut backoff = self.inner.retry_wait_min;

        loop {
            attempt += 1;
            let mut request = self.inner.http.request(method.clone(), &url);
            if let Some(token) = self.inner.token.read().await.as_deref() {
                request = request.header("X-Vault-Token", token);
            }
            if let Some(ns) = &self.inner.namespace {
                request = request.header("X-Vault-Namespace", ns);
            }
            if let Some(ref body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        if status == StatusCode::NO_CONTENT {
                            return Ok(None);
                        }
                        let value = response.json::<Value>().await.map_err(|e| {
                            AppError::with_source(
                                warden_core::error::ErrorKind::Vault,
                                "Vault response malformed",
                                e,
                            )
                        })?;
                        return Ok(Some(value));
                    }
                    if status == StatusCode::NOT_FOUND {
                        return Err(AppError::not_found(format!(
                            "no secret data found at path: {api_path}"
                        )));
                    }
                    if status.is_server_error() && attempt <= self.inner.retry_max {
                        debug!(%url, %status, attempt, "Retrying Vault request");
                    } else {
                        let text = response.text().await.unwrap_or_default();
                        return Err(AppError::vault(format!(
                            "Vault request failed with {status}: {text}"
                        )));
                    }
                }
                Err(e) if attempt <= self.inner.retry_max => {
                    debug!(%url, error = %e, attempt, "Retrying Vault request");
                }
                Err(e) if e.is_timeout() => {
                    return Err(AppError::with_source(
                        warden_core::error::ErrorKind::Timeout,
                        format!("Vault request to {api_path} timed out"),
                        e,
                    ));
                }
                Err(e) => {
                    return Err(AppError::with_source(
                        warden_core::error::ErrorKind::Vault,
                        format!("Vault request to {api_path} failed"),
                        e,
                    ));
                }
            }

            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(self.inner.retry_wait_max);
        }
    }
}

impl Inner {
    /// Authenticates with AppRole and stores the returned token.
    /// Returns the token lease duration.
    async fn login(&self) -> AppResult<Duration> {
        let url = format!("{}/v1/auth/approle/login", self.address);
        let body = serde_json::json!({
            "role_id": self.role_id,
            "secret_id": self.secret_id,
        });

        let mut request = self.http.post(&url).json(&body);
        if let Some(ns) = &self.namespace {
            request = request.header("X-Vault-Namespace", ns);
        }

        let response = request.send().await.map_err(|e| {
            AppError::with_source(
                warden_core::error::ErrorKind::Vault,
                "AppRole login request failed",
                e,
            )
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::vault(format!(
                "AppRole login failed with {status}: {text}"
            )));
        }

        let login: LoginResponse = response.json().await.map_err(|e| {
            AppError::with_source(
                warden_core::error::ErrorKind::Vault,
                "AppRole login response malformed",
                e,
            )
        })?;

        *self.token.write().await = Some(login.auth.client_token);
        info!("Successfully authenticated with Vault using AppRole");

        Ok(Duration::from_secs(login.auth.lease_duration.max(60)))
    }

    /// Renews the current token, returning the fresh lease duration.
    async fn renew(&self) -> AppResult<Duration> {
        let token = self
            .token
            .read()
            .await
            .clone()
            .ok_or_else(|| AppError::vault("no token to renew"))?;

        let url = format!("{}/v1/auth/token/renew-self", self.address);
        let response = self
            .http
            .post(&url)
            .header("X-Vault-Token", &token)
            .send()
            .await
            .map_err(|e| {
                AppError::with_source(
                    warden_core::error::ErrorKind::Vault,
                    "Token renewal request failed",
                    e,
                )
            })?;

        if !response.status().is_success() {
            return Err(AppError::vault(format!(
                "token renewal failed with {}",
                response.status()
            )));
        }

        let renewed: LoginResponse = response.json().await.map_err(|e| {
            AppError::with_source(
                warden_core::error::ErrorKind::Vault,
                "Token renewal response malformed",
                e,
            )
        })?;

        *self.token.write().await = Some(renewed.auth.client_token);
        Ok(Duration::from_secs(renewed.auth.lease_duration.max(60)))
    }
}

/// Background loop renewing the token at two thirds of each lease.
///
/// If renewal fails (past max TTL or revoked), re-authenticates with
/// AppRole; login failures back off and retry until shutdown.
async fn renew_loop(
    inner: std::sync::Arc<Inner>,
    initial_lease: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut lease = initial_lease;

    loop {
        let wait = lease.mul_f32(2.0 / 3.0).max(Duration::from_secs(10));
        tokio::select! {
            _ = shutdown.changed() => {
                debug!("Vault renewal loop exiting");
                return;
            }
            _ = tokio::time::sleep(wait) => {}
        }

        match inner.renew().await {
            Ok(next) => {
                debug!(lease_seconds = next.as_secs(), "Vault token renewed");
                lease = next;
            }
            Err(renew_err) => {
                warn!(error = %renew_err, "Vault token renewal ended, re-authenticating");
                match inner.login().await {
                    Ok(next) => lease = next,
                    Err(login_err) => {
                        error!(error = %login_err, "Failed to re-authenticate with Vault");
                        lease = Duration::from_secs(15);
                    }
                }
            }
        }
    }
}

/// Resolve AppRole credentials from the configuration: inline values first,
/// then configured files, then the environment.
fn resolve_credentials(config: &VaultConfig) -> AppResult<(String, String)> {
    let role_id = resolve_one(
        config.role_id.as_deref(),
        config.role_id_file.as_deref(),
        ENV_ROLE_ID,
        ENV_ROLE_ID_FILE,
    )?;
    let secret_id = resolve_one(
        config.secret_id.as_deref(),
        config.secret_id_file.as_deref(),
        ENV_SECRET_ID,
        ENV_SECRET_ID_FILE,
    )?;
    Ok((role_id, secret_id))
}

fn resolve_one(
    inline: Option<&str>,
    file: Option<&str>,
    env_value: &str,
    env_file: &str,
) -> AppResult<String> {
    if let Some(value) = inline {
        if !value.is_empty() {
            return Ok(value.to_string());
        }
    }
    if let Some(path) = file {
        if !path.is_empty() {
            return read_credential_file(path);
        }
    }
    if let Ok(value) = std::env::var(env_value) {
        if !value.is_empty() {
            return Ok(value);
        }
    }
    if let Ok(path) = std::env::var(env_file) {
        if !path.is_empty() {
            return read_credential_file(&path);
        }
    }
    Ok(String::new())
}

fn read_credential_file(path: &str) -> AppResult<String> {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            AppError::with_source(
                warden_core::error::ErrorKind::Configuration,
                format!("failed to read credential file {path}"),
                e,
            )
        })
}
