//! OAuth flows against the CRM login host.
//!
//! Two paths produce a [`SessionCredential`]: the browser redirect flow
//! (authorization URL + code exchange) and the server-side
//! username/password flow used as the integration fallback.

use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::config::CrmConfig;
use crate::models::credential::SessionCredential;
use crate::{AppError, Result};

/// OAuth scopes requested for the browser flow.
const OAUTH_SCOPE: &str = "api refresh_token offline_access id web";

/// Token endpoint response shape.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    instance_url: String,
    /// Identity URL: `…/id/<org id>/<user id>`.
    #[serde(default)]
    id: Option<String>,
}

/// OAuth client bound to the connected-app configuration.
pub struct OAuthClient {
    http: reqwest::Client,
    login_url: String,
    client_id: String,
    client_secret: String,
    callback_url: String,
}

impl OAuthClient {
    /// Build from the CRM configuration section.
    #[must_use]
    pub fn new(http: reqwest::Client, config: &CrmConfig) -> Self {
        Self {
            http,
            login_url: config.login_url.trim_end_matches('/').to_owned(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            callback_url: config.callback_url.clone(),
        }
    }

    /// Authorization URL the browser is redirected to.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` when the configured login host is not a
    /// valid URL.
    pub fn authorization_url(&self) -> Result<String> {
        let mut url = Url::parse(&format!("{}/services/oauth2/authorize", self.login_url))
            .map_err(|err| AppError::Config(format!("invalid login_url: {err}")))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.callback_url)
            .append_pair("scope", OAUTH_SCOPE)
            .append_pair("prompt", "login consent");
        Ok(url.into())
    }

    /// Exchange an authorization code for a session credential.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Crm` when the token endpoint rejects the code.
    pub async fn exchange_code(&self, code: &str) -> Result<SessionCredential> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("redirect_uri", &self.callback_url),
        ])
        .await
    }

    /// Username/password flow; the security token, when present, is
    /// appended to the password as the CRM requires.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Crm` when the token endpoint rejects the
    /// credentials.
    pub async fn password_login(
        &self,
        username: &str,
        password: &str,
        security_token: Option<&str>,
    ) -> Result<SessionCredential> {
        let secret = match security_token {
            Some(token) if !token.is_empty() => format!("{password}{token}"),
            _ => password.to_owned(),
        };
        self.token_request(&[
            ("grant_type", "password"),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("username", username),
            ("password", &secret),
        ])
        .await
    }

    /// Fetch the authenticated user's identity document.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Crm` when the userinfo endpoint fails.
    pub async fn identity(&self, credential: &SessionCredential) -> Result<Value> {
        let response = self
            .http
            .get(format!("{}/services/oauth2/userinfo", self.login_url))
            .bearer_auth(&credential.access_token)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Crm(format!("identity failed ({status}): {body}")));
        }
        Ok(response.json().await?)
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<SessionCredential> {
        let response = self
            .http
            .post(format!("{}/services/oauth2/token", self.login_url))
            .form(form)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Crm(format!(
                "token request failed ({status}): {body}"
            )));
        }
        let token: TokenResponse = response.json().await?;
        let (org_id, user_id) = token
            .id
            .as_deref()
            .map_or((None, None), parse_identity_url);
        Ok(SessionCredential {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            instance_url: token.instance_url,
            user_id,
            org_id,
        })
    }
}

/// Split an identity URL (`…/id/<org id>/<user id>`) into its parts.
fn parse_identity_url(id_url: &str) -> (Option<String>, Option<String>) {
    let mut segments = id_url.trim_end_matches('/').rsplit('/');
    let user_id = segments.next().map(str::to_owned).filter(|s| !s.is_empty());
    let org_id = segments.next().map(str::to_owned).filter(|s| !s.is_empty());
    (org_id, user_id)
}
