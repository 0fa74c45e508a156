//! Global configuration parsing, validation, and credential loading.

use std::env;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::{AppError, Result};

/// Keyring service name under which runtime secrets are stored.
const KEYRING_SERVICE: &str = "rosterbridge";

/// Nested CRM connection configuration.
///
/// OAuth client credentials and the optional password-flow credentials are
/// loaded at runtime via OS keychain or environment variables, not from the
/// TOML config file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct CrmConfig {
    /// OAuth login host, e.g. `https://login.salesforce.com`.
    #[serde(default = "default_login_url")]
    pub login_url: String,
    /// REST API version segment, e.g. `61.0`.
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Redirect URI registered with the connected app.
    pub callback_url: String,
    /// Outbound request timeout applied to every CRM call.
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
    /// Chunk size for batched display-name lookups.
    #[serde(default = "default_name_chunk_size")]
    pub name_chunk_size: usize,
    /// Connected-app consumer key (populated at runtime).
    #[serde(skip)]
    pub client_id: String,
    /// Connected-app consumer secret (populated at runtime).
    #[serde(skip)]
    pub client_secret: String,
    /// Integration username for the password flow (optional, runtime).
    #[serde(skip)]
    pub username: Option<String>,
    /// Integration password for the password flow (optional, runtime).
    #[serde(skip)]
    pub password: Option<String>,
    /// Security token appended to the password (optional, runtime).
    #[serde(skip)]
    pub security_token: Option<String>,
}

fn default_login_url() -> String {
    "https://login.salesforce.com".into()
}

fn default_api_version() -> String {
    "61.0".into()
}

fn default_request_timeout_seconds() -> u64 {
    30
}

fn default_name_chunk_size() -> usize {
    100
}

/// Session store configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SessionConfig {
    /// Seconds a session credential stays valid after creation.
    #[serde(default = "default_session_ttl_seconds")]
    pub ttl_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_session_ttl_seconds(),
        }
    }
}

fn default_session_ttl_seconds() -> u64 {
    8 * 60 * 60
}

fn default_http_port() -> u16 {
    3000
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// HTTP port the relay listens on.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Browser origins allowed by the CORS layer; empty permits any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Mark the session cookie `Secure` (set behind TLS in production).
    #[serde(default)]
    pub cookie_secure: bool,
    /// CRM connection settings.
    pub crm: CrmConfig,
    /// Session store settings.
    #[serde(default)]
    pub session: SessionConfig,
    /// Static bearer token required on every `/api` request
    /// (populated at runtime).
    #[serde(skip)]
    pub api_bearer_token: String,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load runtime secrets from the OS keychain with env-var fallback.
    ///
    /// Tries the `rosterbridge` keyring service first, then falls back to
    /// `API_BEARER_TOKEN`, `SF_CLIENT_ID`, `SF_CLIENT_SECRET`, and the
    /// optional `SF_USERNAME` / `SF_PASSWORD` / `SF_SECURITY_TOKEN`
    /// environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a mandatory secret is found in neither
    /// the keychain nor the environment.
    pub async fn load_credentials(&mut self) -> Result<()> {
        self.api_bearer_token = load_credential("api_bearer_token", "API_BEARER_TOKEN").await?;
        self.crm.client_id = load_credential("sf_client_id", "SF_CLIENT_ID").await?;
        self.crm.client_secret = load_credential("sf_client_secret", "SF_CLIENT_SECRET").await?;
        self.crm.username = load_optional_credential("sf_username", "SF_USERNAME").await;
        self.crm.password = load_optional_credential("sf_password", "SF_PASSWORD").await;
        self.crm.security_token =
            load_optional_credential("sf_security_token", "SF_SECURITY_TOKEN").await;
        Ok(())
    }

    /// Whether the password login fallback is configured.
    #[must_use]
    pub fn has_password_login(&self) -> bool {
        self.crm.username.is_some() && self.crm.password.is_some()
    }

    fn validate(&self) -> Result<()> {
        if self.http_port == 0 {
            return Err(AppError::Config("http_port must be greater than zero".into()));
        }

        if self.crm.api_version.trim().is_empty() {
            return Err(AppError::Config("crm.api_version must not be empty".into()));
        }

        if self.crm.callback_url.trim().is_empty() {
            return Err(AppError::Config("crm.callback_url must not be empty".into()));
        }

        if self.crm.name_chunk_size == 0 {
            return Err(AppError::Config(
                "crm.name_chunk_size must be greater than zero".into(),
            ));
        }

        if self.session.ttl_seconds == 0 {
            return Err(AppError::Config(
                "session.ttl_seconds must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

/// Load a single mandatory credential from OS keychain with env-var fallback.
async fn load_credential(keyring_key: &str, env_key: &str) -> Result<String> {
    match lookup_keychain(keyring_key).await? {
        Some(value) => Ok(value),
        None => env::var(env_key).map_err(|_| {
            AppError::Config(format!(
                "credential {keyring_key} not found in keychain or {env_key} env var"
            ))
        }),
    }
}

/// Load an optional credential; absence is not an error.
async fn load_optional_credential(keyring_key: &str, env_key: &str) -> Option<String> {
    match lookup_keychain(keyring_key).await {
        Ok(Some(value)) => Some(value),
        _ => env::var(env_key).ok().filter(|v| !v.is_empty()),
    }
}

/// Query the OS keychain for a key, returning `None` when the entry is
/// missing or empty so the caller can fall back to the environment.
async fn lookup_keychain(keyring_key: &str) -> Result<Option<String>> {
    let key = keyring_key.to_owned();

    // keyring is synchronous I/O; run it off the async threads.
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYRING_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await
    .map_err(|err| AppError::Config(format!("keychain task panicked: {err}")))?;

    match keychain_result {
        Ok(value) if !value.is_empty() => Ok(Some(value)),
        Ok(_) => {
            warn!(key = keyring_key, "keychain entry is empty, trying env var");
            Ok(None)
        }
        Err(err) => {
            warn!(
                key = keyring_key,
                ?err,
                "keychain lookup failed, trying env var"
            );
            Ok(None)
        }
    }
}
