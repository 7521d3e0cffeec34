//! Session persistence keyed by customer id.

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use crate::connection::SessionKey;
use crate::error::ServerError;

/// A customer's current session, written at login and read by the lobby.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub customer_id: u32,
    pub session_key: SessionKey,
    /// Context string the client sent with its login.
    pub context_id: String,
    /// Id of the login connection that created the session.
    pub connection_id: String,
}

impl SessionRecord {
    pub fn short_key(&self) -> String {
        self.session_key.short_key()
    }
}

/// Where the login service leaves sessions for the lobby to pick up.
///
/// There is at most one record per customer; a later login replaces the
/// earlier one.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fails with [`ServerError::SessionNotFound`] when the customer has no session.
    async fn get(&self, customer_id: u32) -> Result<SessionRecord, ServerError>;

    /// Inserts or replaces the record for `record.customer_id`.
    async fn put(&self, record: SessionRecord) -> Result<(), ServerError>;
}

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<u32, SessionRecord>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, customer_id: u32) -> Result<SessionRecord, ServerError> {
        self.sessions
            .get(&customer_id)
            .map(|entry| entry.value().clone())
            .ok_or(ServerError::SessionNotFound(customer_id))
    }

    async fn put(&self, record: SessionRecord) -> Result<(), ServerError> {
        debug!(customer = record.customer_id, skey = %record.short_key(), "Storing session");
        self.sessions.insert(record.customer_id, record);
        Ok(())
    }
}
