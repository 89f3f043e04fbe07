//! Session persistence interface
//!
//! Stores validate every record they accept. Expiry is driven from outside:
//! the store only answers which sessions were created before a cutoff.

use crate::{
    types::{Session, SessionId},
    Result,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// Durable key-value storage of sessions keyed by ID
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    /// Load a session
    fn get(&self, id: &SessionId) -> Result<Option<Session>>;

    /// Insert or replace a session
    fn put(&self, session: &Session) -> Result<()>;

    /// Remove a session, returning whether it existed
    fn delete(&self, id: &SessionId) -> Result<bool>;

    /// All stored sessions
    fn list(&self) -> Result<Vec<Session>>;

    /// IDs of sessions created strictly before `cutoff`
    fn list_expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<SessionId>>;
}

/// In-process store, lost on restart
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: DashMap<SessionId, Session>,
}

impl MemoryStore {
    /// Create empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, id: &SessionId) -> Result<Option<Session>> {
        Ok(self.sessions.get(id).map(|s| s.value().clone()))
    }

    fn put(&self, session: &Session) -> Result<()> {
        session.validate()?;
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    fn delete(&self, id: &SessionId) -> Result<bool> {
        Ok(self.sessions.remove(id).is_some())
    }

    fn list(&self) -> Result<Vec<Session>> {
        Ok(self.sessions.iter().map(|s| s.value().clone()).collect())
    }

    fn list_expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<SessionId>> {
        Ok(self
            .sessions
            .iter()
            .filter(|s| s.created_at < cutoff)
            .map(|s| s.key().clone())
            .collect())
    }
}
