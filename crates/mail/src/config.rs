//! Configuration loading for the mail service
//!
//! OAuth client credentials are resolved from (in order of priority):
//! 1. Compile-time embedded credentials (for production builds)
//! 2. JSON file in the UnClutter config directory (Google Cloud Console format)
//! 3. Runtime environment variables
//!
//! Everything else in [`ServiceConfig`] comes from the environment with
//! development defaults.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

/// Credentials filename in the UnClutter config directory
const CREDENTIALS_FILE: &str = "google-credentials.json";

/// Config directory name under the platform config root
const APP_DIR: &str = "unclutter";

const DEFAULT_REDIRECT_URI: &str = "http://localhost:5001/api/auth/google/callback";
const DEFAULT_FRONTEND_URL: &str = "http://localhost:5174";

/// Maximum number of message ids fanned out per list request
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Concurrent metadata fetches per list request
pub const DEFAULT_FETCH_WORKERS: usize = 10;

/// Tokens are refreshed this many seconds before they actually expire
pub const DEFAULT_EXPIRY_SKEW_SECS: i64 = 300;

/// Largest accepted skew; access tokens never live longer than this
pub const MAX_EXPIRY_SKEW_SECS: i64 = 86_400;

/// OAuth client credentials for the Google Cloud project
#[derive(Clone)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Google Cloud Console credential file (either app type)
#[derive(Deserialize)]
struct GoogleCredentialFile {
    installed: Option<ClientSection>,
    web: Option<ClientSection>,
}

#[derive(Deserialize)]
struct ClientSection {
    client_id: String,
    client_secret: String,
}

impl OAuthCredentials {
    /// Resolve credentials from the first source that provides them
    pub fn load() -> Result<Self> {
        if let Some(creds) = Self::from_compile_time() {
            return Ok(creds);
        }

        if let Some(path) = Self::default_credentials_path()
            && path.exists()
        {
            return Self::from_file(&path);
        }

        Self::from_env()
    }

    /// Credentials baked in with
    /// `GOOGLE_CLIENT_ID=xxx GOOGLE_CLIENT_SECRET=yyy cargo build --release`
    pub fn from_compile_time() -> Option<Self> {
        let client_id = option_env!("GOOGLE_CLIENT_ID")?;
        let client_secret = option_env!("GOOGLE_CLIENT_SECRET")?;

        if client_id.is_empty() || client_secret.is_empty() {
            return None;
        }

        Some(Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        })
    }

    /// Load a credentials JSON file downloaded from Google Cloud Console
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read credentials file: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Invalid credentials file: {}", path.display()))
    }

    /// Parse the Google Cloud Console JSON format
    pub fn from_json(json: &str) -> Result<Self> {
        let file: GoogleCredentialFile =
            serde_json::from_str(json).context("Failed to parse credentials JSON")?;

        let section = file
            .web
            .or(file.installed)
            .context("Credentials file missing 'web' or 'installed' section")?;

        Ok(Self {
            client_id: section.client_id,
            client_secret: section.client_secret,
        })
    }

    /// Read `GOOGLE_CLIENT_ID` / `GOOGLE_CLIENT_SECRET`
    pub fn from_env() -> Result<Self> {
        let client_id = non_empty_env("GOOGLE_CLIENT_ID")
            .context("GOOGLE_CLIENT_ID environment variable not set")?;
        let client_secret = non_empty_env("GOOGLE_CLIENT_SECRET")
            .context("GOOGLE_CLIENT_SECRET environment variable not set")?;

        Ok(Self {
            client_id,
            client_secret,
        })
    }

    /// `~/.config/unclutter/google-credentials.json` (platform dependent)
    pub fn default_credentials_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join(CREDENTIALS_FILE))
    }
}

/// Runtime settings for [`crate::MailService`]
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub credentials: OAuthCredentials,
    /// OAuth redirect URI registered with Google
    pub redirect_uri: String,
    /// Where the browser is sent after the OAuth callback
    pub frontend_url: String,
    /// Cap on ids fanned out per listing
    pub list_limit: usize,
    /// Size of the metadata fetch worker pool
    pub fetch_workers: usize,
    /// Refresh tokens this long before expiry
    pub expiry_skew_secs: i64,
}

impl ServiceConfig {
    /// Config with default limits and the development URLs
    pub fn new(credentials: OAuthCredentials) -> Self {
        Self {
            credentials,
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            list_limit: DEFAULT_LIST_LIMIT,
            fetch_workers: DEFAULT_FETCH_WORKERS,
            expiry_skew_secs: DEFAULT_EXPIRY_SKEW_SECS,
        }
    }

    /// Load credentials plus `REDIRECT_URI` / `FRONTEND_URL` overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::new(OAuthCredentials::load()?);

        if let Some(redirect_uri) = non_empty_env("REDIRECT_URI") {
            config.redirect_uri = redirect_uri;
        }
        if let Some(frontend_url) = non_empty_env("FRONTEND_URL") {
            config.frontend_url = frontend_url;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = redirect_uri.into();
        self
    }

    pub fn with_frontend_url(mut self, frontend_url: impl Into<String>) -> Self {
        self.frontend_url = frontend_url.into();
        self
    }

    /// Check that URLs parse and limits are usable
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.redirect_uri)
            .with_context(|| format!("Invalid redirect URI: {}", self.redirect_uri))?;
        Url::parse(&self.frontend_url)
            .with_context(|| format!("Invalid frontend URL: {}", self.frontend_url))?;
        anyhow::ensure!(self.list_limit > 0, "list_limit must be positive");
        anyhow::ensure!(self.fetch_workers > 0, "fetch_workers must be positive");
        anyhow::ensure!(
            (0..=MAX_EXPIRY_SKEW_SECS).contains(&self.expiry_skew_secs),
            "expiry_skew_secs must be between 0 and {}",
            MAX_EXPIRY_SKEW_SECS
        );
        Ok(())
    }
}

/// The UnClutter config directory (`~/.config/unclutter/` on Linux)
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_DIR))
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
