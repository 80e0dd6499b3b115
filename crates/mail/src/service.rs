//! MailService facade
//!
//! The single entry point an HTTP layer or CLI talks to. It resolves the
//! caller's session from the `Authorization` header, makes sure the stored
//! credential is fresh, and dispatches to the fetcher, the composer and the
//! Gmail boundary.

use chrono::Duration;
use log::{error, info, warn};
use std::sync::Arc;

use crate::compose::{self, REPLY_HEADERS};
use crate::config::ServiceConfig;
use crate::error::{AuthError, ServiceError, UpstreamError};
use crate::fetch::{MessageFetcher, MessageListing};
use crate::gmail::{AuthProvider, GmailClient, GoogleAuth, Mailbox, reply_context, to_detail};
use crate::models::{Credential, MessageDetail, MessageId, SentMessage, Session, SessionId};
use crate::session::{CredentialRefresher, InMemorySessionStore, SessionStore};

/// Query parameters Google appends to the OAuth redirect
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub error: Option<String>,
}

impl CallbackParams {
    /// Parse a raw query string such as `code=4/abc&scope=...`
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }
}

/// Main service object for mail operations
pub struct MailService {
    store: Arc<dyn SessionStore>,
    refresher: CredentialRefresher,
    fetcher: MessageFetcher,
    auth: Arc<dyn AuthProvider>,
    mailbox: Arc<dyn Mailbox>,
    frontend_url: String,
}

impl MailService {
    /// Wire a service from explicit components
    pub fn new(
        config: &ServiceConfig,
        store: Arc<dyn SessionStore>,
        auth: Arc<dyn AuthProvider>,
        mailbox: Arc<dyn Mailbox>,
    ) -> Result<Self, ServiceError> {
        config.validate()?;

        let fetcher = MessageFetcher::new(config.fetch_workers, config.list_limit)?;
        let refresher = CredentialRefresher::new(
            Arc::clone(&store),
            Arc::clone(&auth),
            Duration::seconds(config.expiry_skew_secs),
        );

        Ok(Self {
            store,
            refresher,
            fetcher,
            auth,
            mailbox,
            frontend_url: config.frontend_url.trim_end_matches('/').to_string(),
        })
    }

    /// Production wiring: Google OAuth, the Gmail REST API, in-memory sessions
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let auth = GoogleAuth::new(&config.credentials, config.redirect_uri.clone());
        Self::new(
            config,
            Arc::new(InMemorySessionStore::new()),
            Arc::new(auth),
            Arc::new(GmailClient::new()),
        )
    }

    // === Authentication ===

    /// Google consent URL to send the browser to
    pub fn login_url(&self, state: Option<&str>) -> String {
        self.auth.authorization_url(state)
    }

    /// Handle the OAuth redirect and open a session
    pub fn complete_login(&self, params: CallbackParams) -> Result<SessionId, ServiceError> {
        if let Some(reason) = params.error {
            warn!("Authorization denied: {}", reason);
            return Err(AuthError::AccessDenied(reason).into());
        }

        let code = params
            .code
            .filter(|c| !c.trim().is_empty())
            .ok_or(AuthError::MissingCode)?;

        let grant = self.auth.exchange_code(&code).map_err(|e| {
            error!("Authorization code exchange failed: {:#}", e);
            AuthError::CodeExchangeFailed(format!("{:#}", e))
        })?;
        let credential = grant.into_credential();

        // A missing address only matters when sending, so don't fail the login
        let email = match self.auth.user_email(&credential.access_token) {
            Ok(email) => email,
            Err(e) => {
                warn!("Failed to fetch user email: {:#}", e);
                String::new()
            }
        };

        info!("Logged in {}", if email.is_empty() { "<unknown>" } else { email.as_str() });
        let id = self.store.create(credential, email)?;
        Ok(id)
    }

    /// Where to send the browser after the OAuth callback has been handled
    pub fn callback_redirect(&self, result: &Result<SessionId, ServiceError>) -> String {
        match result {
            Ok(id) => format!(
                "{}/home?token={}",
                self.frontend_url,
                urlencoding::encode(id.as_str())
            ),
            Err(e) => format!("{}/login?error={}", self.frontend_url, login_error_code(e)),
        }
    }

    /// Address of the signed-in user
    pub fn current_user(&self, token: Option<&str>) -> Result<String, ServiceError> {
        Ok(self.authenticate(token)?.email)
    }

    /// End a session. Unknown or missing tokens are not an error.
    pub fn logout(&self, token: Option<&str>) -> Result<(), ServiceError> {
        if let Some(id) = token.and_then(SessionId::from_bearer) {
            let deleted = self.store.delete(&id);
            self.refresher.forget(&id);
            if deleted? {
                info!("Session logged out");
            }
        }
        Ok(())
    }

    // === Reading ===

    /// List and categorize recent messages, newest first
    pub fn list_messages(
        &self,
        token: Option<&str>,
        query: Option<&str>,
        max_results: usize,
    ) -> Result<MessageListing, ServiceError> {
        let (_, credential) = self.authorize(token)?;

        let max_results = max_results.clamp(1, GmailClient::MAX_PAGE_SIZE);
        let ids = self
            .mailbox
            .list_message_ids(&credential, query, max_results)
            .map_err(upstream("list messages"))?;

        let listing = self
            .fetcher
            .fetch_recent(self.mailbox.as_ref(), &credential, &ids);

        if listing.is_partial() {
            warn!(
                "Listing is partial: {} of {} messages failed",
                listing.failed, listing.requested
            );
        }
        info!("Listed {} messages", listing.messages.len());
        Ok(listing)
    }

    /// Fetch one message with its plain-text body
    pub fn get_message(&self, token: Option<&str>, id: &str) -> Result<MessageDetail, ServiceError> {
        let (_, credential) = self.authorize(token)?;

        let msg = self
            .mailbox
            .get_message_full(&credential, &MessageId::new(id))
            .map_err(upstream("get message"))?;
        Ok(to_detail(msg))
    }

    // === Sending ===

    /// Send a new message from the signed-in user
    pub fn send(
        &self,
        token: Option<&str>,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<SentMessage, ServiceError> {
        let session = self.authenticate(token)?;
        let message = compose::compose(&session.email, to, subject, body)?;
        let credential = self.refresher.ensure_valid(&session)?;

        let sent = self
            .mailbox
            .send(&credential, &message.to_raw(), None)
            .map_err(upstream("send message"))?;
        info!("Sent message {}", sent.id.as_str());
        Ok(sent)
    }

    /// Reply to message `id` inside its thread
    pub fn reply(
        &self,
        token: Option<&str>,
        id: &str,
        body: &str,
    ) -> Result<SentMessage, ServiceError> {
        let session = self.authenticate(token)?;
        compose::validate_reply_body(body)?;
        compose::validate_sender(&session.email)?;
        let credential = self.refresher.ensure_valid(&session)?;

        let original = self
            .mailbox
            .get_message_metadata(&credential, &MessageId::new(id), &REPLY_HEADERS)
            .map_err(upstream("get message"))?;
        let context = reply_context(&original);
        let message = compose::compose_reply(&session.email, &context, body)?;

        let sent = self
            .mailbox
            .send(&credential, &message.to_raw(), message.thread_id.as_ref())
            .map_err(upstream("send reply"))?;
        info!("Sent reply {} to {}", sent.id.as_str(), id);
        Ok(sent)
    }

    // === Helpers ===

    /// Resolve the session behind an `Authorization` header value
    fn authenticate(&self, token: Option<&str>) -> Result<Session, ServiceError> {
        let id = token
            .and_then(SessionId::from_bearer)
            .ok_or(AuthError::NotAuthenticated)?;
        self.store
            .get(&id)?
            .ok_or_else(|| AuthError::NotAuthenticated.into())
    }

    /// Resolve the session and make sure its access token is usable
    fn authorize(&self, token: Option<&str>) -> Result<(Session, Credential), ServiceError> {
        let session = self.authenticate(token)?;
        let credential = self.refresher.ensure_valid(&session)?;
        Ok((session, credential))
    }
}

fn upstream(operation: &'static str) -> impl FnOnce(anyhow::Error) -> UpstreamError {
    move |e| {
        error!("{} failed: {:#}", operation, e);
        UpstreamError::new(operation, format!("{:#}", e))
    }
}

/// Stable error code the frontend's login page understands
fn login_error_code(err: &ServiceError) -> &'static str {
    match err {
        ServiceError::Auth(AuthError::AccessDenied(_)) => "access_denied",
        ServiceError::Auth(AuthError::MissingCode) => "no_code",
        _ => "token_exchange_failed",
    }
}
