//! In-memory session store holding per-caller CRM credentials.
//!
//! The relay is stateless apart from this map: a session is created when
//! authorization succeeds, read on every subsequent CRM call, and removed
//! on logout or TTL expiry. Nothing is ever persisted to disk.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::credential::SessionCredential;

/// Cookie carrying the session identifier.
pub const SESSION_COOKIE: &str = "rb_session";

struct SessionEntry {
    credential: SessionCredential,
    expires_at: DateTime<Utc>,
}

/// Thread-safe map of session id to CRM credential with TTL expiry.
pub struct SessionStore {
    ttl: TimeDelta,
    inner: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionStore {
    /// Create a store whose sessions live for `ttl_seconds` after creation.
    #[must_use]
    pub fn new(ttl_seconds: u64) -> Self {
        let ttl = i64::try_from(ttl_seconds)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX);
        Self {
            ttl,
            inner: RwLock::new(HashMap::new()),
        }
    }

    fn expiry(&self) -> DateTime<Utc> {
        Utc::now()
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Store a credential under a freshly generated session id.
    pub async fn create(&self, credential: SessionCredential) -> String {
        let id = Uuid::new_v4().to_string();
        let entry = SessionEntry {
            credential,
            expires_at: self.expiry(),
        };
        self.inner.write().await.insert(id.clone(), entry);
        id
    }

    /// Replace the credential of an existing session, or mint a new session
    /// when the id is unknown or already expired.
    pub async fn put(&self, id: Option<&str>, credential: SessionCredential) -> String {
        if let Some(id) = id {
            let mut guard = self.inner.write().await;
            if let Some(entry) = guard.get_mut(id) {
                if entry.expires_at > Utc::now() {
                    entry.credential = credential;
                    return id.to_owned();
                }
                guard.remove(id);
            }
        }
        self.create(credential).await
    }

    /// Fetch the credential for a live session.
    ///
    /// Expired entries are dropped on access and read as absent.
    pub async fn get(&self, id: &str) -> Option<SessionCredential> {
        {
            let guard = self.inner.read().await;
            match guard.get(id) {
                Some(entry) if entry.expires_at > Utc::now() => {
                    return Some(entry.credential.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }
        // Entry exists but has expired; upgrade to a write lock to drop it.
        self.inner.write().await.remove(id);
        None
    }

    /// Destroy a session, if present.
    pub async fn destroy(&self, id: &str) {
        self.inner.write().await.remove(id);
    }

    /// Drop all expired sessions; returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut guard = self.inner.write().await;
        let before = guard.len();
        guard.retain(|_, entry| entry.expires_at > now);
        before - guard.len()
    }
}
