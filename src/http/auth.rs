//! Authentication routes: OAuth redirect flow, password fallback, logout,
//! and identity echo.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{
    append_set_cookie, clear_cookie_value, ensure_connection, session_cookie_value,
    session_id_from_headers, AppState,
};
use crate::{AppError, Result};

/// `GET /api/auth/login` — redirect the browser to the CRM consent page.
///
/// # Errors
///
/// Returns `AppError::Config` when the login host URL is malformed.
pub async fn login(State(state): State<Arc<AppState>>) -> Result<Redirect> {
    let url = state.oauth.authorization_url()?;
    Ok(Redirect::temporary(&url))
}

/// Query parameters of the OAuth callback.
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    /// Authorization code issued by the CRM.
    pub code: Option<String>,
}

/// `GET /api/auth/callback` — exchange the code and establish a session.
///
/// # Errors
///
/// Returns `AppError::Validation` when the code is missing and
/// `AppError::Crm` when the exchange is rejected.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Result<Response> {
    let code = params
        .code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::Validation("missing code".into()))?;

    let credential = state.oauth.exchange_code(code).await?;
    let user_info = json!({
        "id": credential.user_id,
        "organizationId": credential.org_id,
    });

    let existing = session_id_from_headers(&headers);
    let session_id = state.sessions.put(existing.as_deref(), credential).await;
    info!("authorization code exchanged; session established");

    let response = Json(json!({ "ok": true, "userInfo": user_info })).into_response();
    let cookie = session_cookie_value(&state.config, &session_id);
    Ok(append_set_cookie(response, &cookie))
}

/// `POST /api/auth/login-password` — integration-user password flow.
///
/// # Errors
///
/// Returns `AppError::Config` when the password credentials are not
/// configured and `AppError::Crm` when the CRM rejects them.
pub async fn login_password(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response> {
    let (Some(username), Some(password)) =
        (&state.config.crm.username, &state.config.crm.password)
    else {
        return Err(AppError::Config(
            "SF_USERNAME and SF_PASSWORD are required".into(),
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
    let user_info = state.oauth.identity(&credential).await?;

    let existing = session_id_from_headers(&headers);
    let session_id = state.sessions.put(existing.as_deref(), credential).await;
    info!("password login succeeded; session established");

    let response = Json(json!({ "ok": true, "userInfo": user_info })).into_response();
    let cookie = session_cookie_value(&state.config, &session_id);
    Ok(append_set_cookie(response, &cookie))
}

/// `POST /api/auth/logout` — destroy the session and clear the cookie.
pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Some(id) = session_id_from_headers(&headers) {
        state.sessions.destroy(&id).await;
    }
    let response = Json(json!({ "ok": true })).into_response();
    append_set_cookie(response, &clear_cookie_value(&state.config))
}

/// `GET /api/sfdc/whoami` — identity document of the connected user.
///
/// # Errors
///
/// Returns `AppError::Session` when no CRM connection can be established
/// and `AppError::Crm` when the identity call fails.
pub async fn whoami(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<Response> {
    let connection = ensure_connection(&state, &headers).await?;
    let identity = state.oauth.identity(&connection.credential).await?;
    Ok(connection.finalize(&state, Json(identity).into_response()))
}
