//! UnClutter mail core - Gmail mediation for a categorized inbox
//!
//! This crate sits between a web client and the user's Gmail account:
//! - Session store mapping opaque session ids to Google credentials
//! - Credential refresher renewing expired access tokens
//! - Rule-based categorization engine
//! - Concurrent fetcher for categorized message listings
//! - Composer for new messages and threaded replies
//!
//! [`MailService`] is the facade the HTTP layer (or the `unclutter` CLI)
//! calls. Google is reached only through the [`AuthProvider`] and
//! [`Mailbox`] traits, so tests can run against fakes.

pub mod categorize;
pub mod compose;
pub mod config;
pub mod error;
pub mod fetch;
pub mod gmail;
pub mod models;
pub mod service;
pub mod session;

pub use categorize::categorize;
pub use compose::{OutgoingMessage, ReplyContext};
pub use config::{OAuthCredentials, ServiceConfig};
pub use error::{AuthError, ServiceError, UpstreamError, ValidationError};
pub use fetch::{MessageFetcher, MessageListing};
pub use gmail::{AuthProvider, GmailClient, GoogleAuth, Mailbox, TokenGrant};
pub use models::{
    Category, Credential, MessageDetail, MessageId, MessageSummary, SentMessage, Session,
    SessionId, ThreadId,
};
pub use service::{CallbackParams, MailService};
pub use session::{CredentialRefresher, InMemorySessionStore, SessionStore};
