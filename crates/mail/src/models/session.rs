//! Session and credential models

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque session handle handed to the web client
///
/// This is the only identifier that ever crosses the boundary; the
/// credential it maps to stays on the server.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh random identifier (UUIDv4, OS CSPRNG)
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Wrap an identifier received from the client
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Extract the session id from an `Authorization: Bearer <id>` header value
    ///
    /// Returns `None` for a missing scheme or an empty token.
    pub fn from_bearer(header: &str) -> Option<Self> {
        let token = header.strip_prefix("Bearer ")?.trim();
        if token.is_empty() {
            None
        } else {
            Some(Self(token.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Session ids are bearer secrets; keep them out of debug logs.
impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionId(<redacted>)")
    }
}

/// OAuth credential material for one Google account
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// When the access token stops being accepted; `None` means unknown
    pub expiry: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expiry: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expiry,
        }
    }

    /// Whether the access token should be treated as expired at `now`
    ///
    /// A token is considered expired `skew` before its actual expiry so that
    /// requests in flight don't race the deadline. Without a known expiry the
    /// token is assumed valid.
    pub fn is_expired_at(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        match self.expiry {
            Some(expiry) => now >= expiry - skew,
            None => false,
        }
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Server-held record binding a session id to a credential and user address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: SessionId,
    pub credential: Credential,
    /// Address of the authenticated user (may be empty if userinfo failed)
    pub email: String,
    pub created_at: DateTime<Utc>,
}
