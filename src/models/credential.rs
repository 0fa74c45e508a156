//! Session-held CRM credential.

use std::fmt::{Debug, Formatter};

/// OAuth credential for one caller's CRM connection.
///
/// Lives only in the in-memory session store: created on successful
/// authorization, read on every CRM call, destroyed on logout or expiry.
/// Token material must never reach logs, so `Debug` is hand-written to
/// redact it.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredential {
    /// Bearer token presented on every REST call.
    pub access_token: String,
    /// Refresh token, when the grant included one.
    pub refresh_token: Option<String>,
    /// Org-specific REST host, e.g. `https://example.my.salesforce.com`.
    pub instance_url: String,
    /// Authenticated user's record id.
    pub user_id: Option<String>,
    /// Org identifier.
    pub org_id: Option<String>,
}

impl Debug for SessionCredential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCredential")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("instance_url", &self.instance_url)
            .field("user_id", &self.user_id)
            .field("org_id", &self.org_id)
            .finish()
    }
}
