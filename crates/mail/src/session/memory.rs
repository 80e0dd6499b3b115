//! In-memory session store
//!
//! Sessions live only as long as the process. Restarting it logs every user
//! out.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::SessionStore;
use crate::models::{Credential, Session, SessionId};

/// In-memory implementation of SessionStore
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl InMemorySessionStore {
    /// Create a new empty in-memory store
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Number of live sessions
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.is_empty())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<SessionId, Session>>> {
        self.sessions
            .read()
            .map_err(|_| anyhow!("session store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<SessionId, Session>>> {
        self.sessions
            .write()
            .map_err(|_| anyhow!("session store lock poisoned"))
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for InMemorySessionStore {
    fn create(&self, credential: Credential, email: String) -> Result<SessionId> {
        let id = SessionId::generate();
        let session = Session {
            id: id.clone(),
            credential,
            email,
            created_at: Utc::now(),
        };
        self.write()?.insert(id.clone(), session);
        Ok(id)
    }

    fn get(&self, id: &SessionId) -> Result<Option<Session>> {
        Ok(self.read()?.get(id).cloned())
    }

    fn update_tokens(
        &self,
        id: &SessionId,
        access_token: String,
        expiry: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let mut sessions = self.write()?;
        match sessions.get_mut(id) {
            Some(session) => {
                session.credential.access_token = access_token;
                session.credential.expiry = expiry;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete(&self, id: &SessionId) -> Result<bool> {
        Ok(self.write()?.remove(id).is_some())
    }
}
