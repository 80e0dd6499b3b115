//! Session store trait definition

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::models::{Credential, Session, SessionId};

/// Trait for session storage operations
///
/// An `Ok(None)` or `Ok(false)` means the session does not exist, which callers
/// treat as "not authenticated". `Err` is reserved for the store itself failing.
pub trait SessionStore: Send + Sync {
    /// Store a new session and return its freshly generated id
    fn create(&self, credential: Credential, email: String) -> Result<SessionId>;

    /// Get a session by ID
    fn get(&self, id: &SessionId) -> Result<Option<Session>>;

    /// Replace the access token and expiry after a refresh
    ///
    /// Returns false if the session no longer exists. The refresh token is
    /// left untouched.
    fn update_tokens(
        &self,
        id: &SessionId,
        access_token: String,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<bool>;

    /// Remove a session; returns whether it existed
    fn delete(&self, id: &SessionId) -> Result<bool>;
}
