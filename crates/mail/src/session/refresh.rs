//! Access-token refresh
//!
//! Google access tokens last about an hour. Before a session's credential is
//! used it passes through [`CredentialRefresher::ensure_valid`], which renews
//! it with the stored refresh token once it is within the skew window of its
//! expiry.

use chrono::{Duration, Utc};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use super::SessionStore;
use crate::error::AuthError;
use crate::gmail::AuthProvider;
use crate::models::{Credential, Session, SessionId};

/// Renews expired access tokens and writes them back to the session store
///
/// Refreshes are serialized per session: concurrent requests for the same
/// session perform at most one refresh exchange between them.
pub struct CredentialRefresher {
    store: Arc<dyn SessionStore>,
    auth: Arc<dyn AuthProvider>,
    skew: Duration,
    locks: Mutex<HashMap<SessionId, Arc<Mutex<()>>>>,
}

impl CredentialRefresher {
    pub fn new(
        store: Arc<dyn SessionStore>,
        auth: Arc<dyn AuthProvider>,
        skew: Duration,
    ) -> Self {
        Self {
            store,
            auth,
            skew,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Return a credential that is usable right now
    ///
    /// `session` may be a stale snapshot; the store is re-read under the
    /// session's refresh lock before deciding to refresh.
    pub fn ensure_valid(&self, session: &Session) -> Result<Credential, AuthError> {
        if !session.credential.is_expired_at(Utc::now(), self.skew) {
            return Ok(session.credential.clone());
        }
        if !session.credential.can_refresh() {
            return Err(AuthError::Unrefreshable);
        }

        let lock = self.lock_for(&session.id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let current = self
            .store
            .get(&session.id)
            .map_err(|e| store_failure(&session.id, e))?
            .ok_or(AuthError::NotAuthenticated)?;
        let credential = current.credential;

        if !credential.is_expired_at(Utc::now(), self.skew) {
            debug!("Session from {} already refreshed by another request", session.created_at);
            return Ok(credential);
        }

        let refresh_token = match credential.refresh_token.as_deref() {
            Some(token) if !token.is_empty() => token,
            _ => return Err(AuthError::Unrefreshable),
        };

        info!("Refreshing access token for session from {}", session.created_at);
        let grant = self.auth.refresh(refresh_token).map_err(|e| {
            warn!("Token refresh failed for session from {}: {:#}", session.created_at, e);
            AuthError::RefreshFailed(format!("{:#}", e))
        })?;

        let updated = self
            .store
            .update_tokens(&session.id, grant.access_token.clone(), grant.expiry)
            .map_err(|e| store_failure(&session.id, e))?;
        if !updated {
            // Logged out while the exchange was in flight
            return Err(AuthError::NotAuthenticated);
        }

        Ok(Credential {
            access_token: grant.access_token,
            refresh_token: credential.refresh_token,
            expiry: grant.expiry,
        })
    }

    /// Drop the refresh lock for a session that has been logged out
    pub fn forget(&self, id: &SessionId) {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    fn lock_for(&self, id: &SessionId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(id.clone()).or_default())
    }

    #[cfg(test)]
    pub(crate) fn lock_count(&self) -> usize {
        self.locks.lock().unwrap().len()
    }
}

fn store_failure(id: &SessionId, e: anyhow::Error) -> AuthError {
    error!("Session store failed during refresh of {:?}: {:#}", id, e);
    AuthError::RefreshFailed(format!("session store: {:#}", e))
}
