//! Google OAuth2 client
//!
//! Implements the server side of the authorization code flow: building the
//! consent URL, exchanging codes and refresh tokens at the token endpoint,
//! and looking up the signed-in user's address.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use super::api::UserInfo;
use super::traits::{AuthProvider, TokenGrant};
use crate::config::OAuthCredentials;

/// OAuth2 client for Google accounts
pub struct GoogleAuth {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    agent: ureq::Agent,
}

/// Token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_grant(self, issued_at: DateTime<Utc>) -> TokenGrant {
        TokenGrant {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expiry: self.expires_in.map(|secs| issued_at + Duration::seconds(secs)),
        }
    }
}

impl GoogleAuth {
    const AUTH_URL: &'static str = "https://accounts.google.com/o/oauth2/v2/auth";
    const TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";
    const USERINFO_URL: &'static str = "https://www.googleapis.com/oauth2/v2/userinfo";

    /// Identity plus mailbox read and send
    pub const SCOPES: [&'static str; 5] = [
        "openid",
        "https://www.googleapis.com/auth/gmail.readonly",
        "https://www.googleapis.com/auth/gmail.send",
        "https://www.googleapis.com/auth/userinfo.email",
        "https://www.googleapis.com/auth/userinfo.profile",
    ];

    /// Create a client for the given OAuth app and registered redirect URI
    pub fn new(credentials: &OAuthCredentials, redirect_uri: impl Into<String>) -> Self {
        Self {
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            redirect_uri: redirect_uri.into(),
            agent: ureq::Agent::new_with_defaults(),
        }
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    fn request_tokens(&self, form: &[(&str, &str)], what: &str) -> Result<TokenResponse> {
        let mut response = self
            .agent
            .post(Self::TOKEN_URL)
            .send_form(form.iter().copied())
            .with_context(|| format!("Failed to send {} request", what))?;

        response
            .body_mut()
            .read_json()
            .with_context(|| format!("Failed to parse {} response", what))
    }
}

impl AuthProvider for GoogleAuth {
    fn authorization_url(&self, state: Option<&str>) -> String {
        let mut url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&include_granted_scopes=true&prompt=consent",
            Self::AUTH_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&Self::SCOPES.join(" ")),
        );

        if let Some(state) = state {
            url.push_str("&state=");
            url.push_str(&urlencoding::encode(state));
        }

        url
    }

    fn exchange_code(&self, code: &str) -> Result<TokenGrant> {
        let issued_at = Utc::now();
        let token = self.request_tokens(
            &[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", self.redirect_uri.as_str()),
            ],
            "authorization code exchange",
        )?;

        Ok(token.into_grant(issued_at))
    }

    fn refresh(&self, refresh_token: &str) -> Result<TokenGrant> {
        let issued_at = Utc::now();
        let token = self.request_tokens(
            &[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ],
            "token refresh",
        )?;

        let mut grant = token.into_grant(issued_at);
        // Google usually omits the refresh token on refresh; keep the old one
        if grant.refresh_token.is_none() {
            grant.refresh_token = Some(refresh_token.to_string());
        }
        Ok(grant)
    }

    fn user_email(&self, access_token: &str) -> Result<String> {
        let mut response = self
            .agent
            .get(Self::USERINFO_URL)
            .header("Authorization", &format!("Bearer {}", access_token))
            .call()
            .context("Failed to send userinfo request")?;

        let info: UserInfo = response
            .body_mut()
            .read_json()
            .context("Failed to parse userinfo response")?;

        info.email.context("Userinfo response has no email")
    }
}
