//! Error taxonomy for the mail service
//!
//! Every failure a caller can observe falls into one of three families:
//! - [`AuthError`]: the caller is not (or no longer) authenticated
//! - [`ValidationError`]: user-correctable input problems, raised before any
//!   external call is made
//! - [`UpstreamError`]: Gmail or the OAuth endpoint failed
//!
//! [`ServiceError`] wraps all of them for the facade in [`crate::service`].

/// Authentication failures. All of these mean "prompt the user to log in again".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Missing, malformed, unknown, or deleted session token
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Access token expired and there is no refresh token to renew it
    #[error("Access token expired and cannot be refreshed")]
    Unrefreshable,

    /// The refresh exchange with the authorization server failed
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// The user (or Google) rejected the consent screen
    #[error("Authorization denied: {0}")]
    AccessDenied(String),

    /// OAuth callback arrived without an authorization code
    #[error("No authorization code received")]
    MissingCode,

    /// Exchanging the authorization code for tokens failed
    #[error("Authorization code exchange failed: {0}")]
    CodeExchangeFailed(String),
}

/// Input problems the user can fix
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("User email not found")]
    MissingSender,

    #[error("To is required")]
    MissingRecipient,

    #[error("Subject is required")]
    MissingSubject,

    #[error("Reply body is required")]
    MissingBody,
}

/// A list-level, get-level, or send-level failure reported by Gmail or Google OAuth
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{operation} failed: {message}")]
pub struct UpstreamError {
    /// What we were doing, e.g. "list messages"
    pub operation: &'static str,
    /// The upstream's own message
    pub message: String,
}

impl UpstreamError {
    pub fn new(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self {
            operation,
            message: err.to_string(),
        }
    }
}

/// Error returned by every [`crate::MailService`] operation
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// Local infrastructure failure (session store, worker pool)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// True for errors that should be surfaced as "not authenticated" (HTTP 401)
    pub fn is_auth(&self) -> bool {
        matches!(self, ServiceError::Auth(_))
    }

    /// True for user-correctable input errors (HTTP 400)
    pub fn is_validation(&self) -> bool {
        matches!(self, ServiceError::Validation(_))
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(e: anyhow::Error) -> Self {
        ServiceError::Internal(format!("{:#}", e))
    }
}
