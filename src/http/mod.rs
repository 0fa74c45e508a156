//! HTTP surface: router assembly, middleware, and shared request helpers.
//!
//! Thin wrappers only — domain behavior lives in [`crate::crm`]. Every
//! `/api` route sits behind the static bearer gate; `/health` stays open
//! for liveness probes.

pub mod attendance;
pub mod auth;
pub mod query;
pub mod roster;

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::config::GlobalConfig;
use crate::crm::auth::OAuthClient;
use crate::crm::client::RestClient;
use crate::crm::identity::ReferenceParser;
use crate::models::credential::SessionCredential;
use crate::session::{SessionStore, SESSION_COOKIE};
use crate::{AppError, Result};

/// Shared application state accessible by all handlers.
pub struct AppState {
    /// Global configuration.
    pub config: Arc<GlobalConfig>,
    /// Per-caller CRM credentials.
    pub sessions: SessionStore,
    /// Shared outbound HTTP client carrying the request timeout.
    pub http: reqwest::Client,
    /// OAuth flows against the login host.
    pub oauth: OAuthClient,
    /// Contact reference parser, compiled once at startup.
    pub contacts: ReferenceParser,
}

impl AppState {
    /// Assemble application state from loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the outbound HTTP client or the
    /// reference patterns cannot be built.
    pub fn from_config(config: Arc<GlobalConfig>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(
                config.crm.request_timeout_seconds,
            ))
            .build()
            .map_err(|err| AppError::Config(format!("failed to build http client: {err}")))?;
        Ok(Self {
            sessions: SessionStore::new(config.session.ttl_seconds),
            oauth: OAuthClient::new(http.clone(), &config.crm),
            contacts: ReferenceParser::contacts()?,
            http,
            config,
        })
    }
}

/// Handler for `GET /health` — liveness probe, no auth.
async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Build the full application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/auth/login", get(auth::login))
        .route("/auth/callback", get(auth::callback))
        .route("/auth/login-password", post(auth::login_password))
        .route("/auth/logout", post(auth::logout))
        .route("/sfdc/whoami", get(auth::whoami))
        .route("/sfdc/query", get(query::run))
        .route("/sfdc/teachers/by-year", get(roster::by_year))
        .route("/sfdc/attendance/by-meeting", get(attendance::by_meeting))
        .route("/sfdc/attendance/updates", post(attendance::apply_updates))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            bearer_gate,
        ));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config))
        .with_state(state)
}

fn cors_layer(config: &GlobalConfig) -> CorsLayer {
    if config.cors_origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(%origin, %err, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    // Credentials mode forbids wildcards, so methods and headers are
    // listed explicitly.
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
        ]))
        .allow_credentials(true)
}

/// Static bearer-token gate applied to every `/api` route.
async fn bearer_gate(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> std::result::Result<Response, AppError> {
    let expected = state.config.api_bearer_token.trim();
    if expected.is_empty() {
        return Err(AppError::Config(
            "server misconfigured: API_BEARER_TOKEN is not set".into(),
        ));
    }

    let supplied = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map_or("", str::trim);

    if supplied.is_empty() || supplied != expected {
        return Err(AppError::Unauthorized("unauthorized".into()));
    }

    Ok(next.run(request).await)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Unauthorized(msg) | Self::Session(msg) => (StatusCode::UNAUTHORIZED, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Crm(msg) => (StatusCode::BAD_GATEWAY, msg),
            Self::Discovery(msg) | Self::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        if status.is_server_error() {
            error!(%status, detail = %message, "request failed");
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Extract the session id from the request's cookie header.
#[must_use]
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_owned())
        .filter(|value| !value.is_empty())
}

fn session_cookie_value(config: &GlobalConfig, id: &str) -> String {
    let mut value = format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax");
    if config.cookie_secure {
        value.push_str("; Secure");
    }
    value
}

fn clear_cookie_value(config: &GlobalConfig) -> String {
    let mut value = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if config.cookie_secure {
        value.push_str("; Secure");
    }
    value
}

fn append_set_cookie(mut response: Response, cookie: &str) -> Response {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(err) => warn!(%err, "failed to encode session cookie header"),
    }
    response
}

/// An established CRM connection for the current request.
pub struct Connection {
    /// REST client bound to the session credential.
    pub client: RestClient,
    /// Credential backing the client (used by identity calls).
    pub credential: SessionCredential,
    /// Session the credential lives under.
    pub session_id: String,
    /// Whether this request minted a new session (cookie must be set).
    pub established: bool,
}

impl Connection {
    /// Attach the session cookie to a response when one was established.
    #[must_use]
    pub fn finalize(&self, state: &AppState, response: Response) -> Response {
        if self.established {
            let cookie = session_cookie_value(&state.config, &self.session_id);
            append_set_cookie(response, &cookie)
        } else {
            response
        }
    }
}

/// Resolve a CRM connection for the caller: the session credential when
/// one exists, otherwise the configured password-flow fallback.
///
/// # Errors
///
/// Returns `AppError::Session` when no credential exists and no password
/// fallback is configured, or the fallback login's failure.
pub async fn ensure_connection(state: &AppState, headers: &HeaderMap) -> Result<Connection> {
    let session_id = session_id_from_headers(headers);

    if let Some(ref id) = session_id {
        if let Some(credential) = state.sessions.get(id).await {
            return Ok(Connection {
                client: RestClient::new(
                    state.http.clone(),
                    &credential,
                    &state.config.crm.api_version,
                ),
                credential,
                session_id: id.clone(),
                established: false,
            });
        }
    }

    let (Some(username), Some(password)) =
        (&state.config.crm.username, &state.config.crm.password)
    else {
        return Err(AppError::Session(
            "no CRM session; authenticate via /api/auth/login".into(),
        ));
    };

    let credential = state
        .oauth
        .password_login(
            username,
            password,
            state.config.crm.security_token.as_deref(),
        )
        .await?;
    let client = RestClient::new(
        state.http.clone(),
        &credential,
        &state.config.crm.api_version,
    );
    let session_id = state
        .sessions
        .put(session_id.as_deref(), credential.clone())
        .await;

    Ok(Connection {
        client,
        credential,
        session_id,
        established: true,
    })
}
