//! Boundary traits for the remote services
//!
//! The core never talks HTTP directly; it goes through these traits so the
//! Google implementations can be swapped for fakes in tests.

use anyhow::Result;
use chrono::{DateTime, Utc};

use super::api::GmailMessage;
use crate::models::{Credential, MessageId, SentMessage, ThreadId};

/// Tokens returned by an authorization-code or refresh exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    /// Google only returns this on the first consent (or with `prompt=consent`)
    pub refresh_token: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
}

impl TokenGrant {
    pub fn into_credential(self) -> Credential {
        Credential::new(self.access_token, self.refresh_token, self.expiry)
    }
}

/// OAuth2 authorization server
pub trait AuthProvider: Send + Sync {
    /// Consent URL the browser is redirected to
    fn authorization_url(&self, state: Option<&str>) -> String;

    /// Exchange an authorization code for tokens
    fn exchange_code(&self, code: &str) -> Result<TokenGrant>;

    /// Exchange a refresh token for a new access token
    fn refresh(&self, refresh_token: &str) -> Result<TokenGrant>;

    /// Look up the address of the account an access token belongs to
    fn user_email(&self, access_token: &str) -> Result<String>;
}

/// Remote mailbox operations
///
/// Implementations must be shareable across the fetch worker pool.
pub trait Mailbox: Send + Sync {
    /// List message IDs matching a Gmail search query
    fn list_message_ids(
        &self,
        credential: &Credential,
        query: Option<&str>,
        max_results: usize,
    ) -> Result<Vec<MessageId>>;

    /// Fetch a message's metadata (snippet, labels, and the named headers)
    fn get_message_metadata(
        &self,
        credential: &Credential,
        id: &MessageId,
        headers: &[&str],
    ) -> Result<GmailMessage>;

    /// Fetch a message including its body parts
    fn get_message_full(&self, credential: &Credential, id: &MessageId) -> Result<GmailMessage>;

    /// Send a raw (base64url RFC 822) message, optionally into an existing thread
    fn send(
        &self,
        credential: &Credential,
        raw: &str,
        thread_id: Option<&ThreadId>,
    ) -> Result<SentMessage>;
}
