use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{aio::ConnectionManager, AsyncCommands};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::shared::AppError;

/// Server-side session record binding a session id to a user and an expiry.
/// Created once at login, read on refresh, deleted at logout; never updated
/// in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
}

impl Session {
    /// Creates an active session for the given user, expiring after `ttl`.
    /// Ids are UUIDv7 so concurrent sessions sort by creation time.
    pub fn new(user_id: &str, ttl: chrono::Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7().to_string(),
            user_id: user_id.to_string(),
            created_at: now,
            expires_at: now + ttl,
            is_active: true,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// Trait for the shared key-value session backend. Every call is a round
/// trip; nothing is cached in-process.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stores the session under its id, overwriting any previous entry, and
    /// schedules the entry to expire after `ttl`.
    async fn set(&self, session: &Session, ttl: Duration) -> Result<(), AppError>;

    /// Returns the session, or `None` when absent or already expired.
    async fn get(&self, session_id: &str) -> Result<Option<Session>, AppError>;

    /// Removes the session; absent entries are reported as not found.
    async fn delete(&self, session_id: &str) -> Result<(), AppError>;
}

/// In-memory implementation of SessionStore for development and testing
///
/// Entries honor their TTL the same way the Redis store does: an expired
/// entry is indistinguishable from a missing one.
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, (Session, Instant)>>,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the current number of live entries
    pub fn session_count(&self) -> usize {
        let now = Instant::now();
        self.sessions
            .lock()
            .unwrap()
            .values()
            .filter(|(_, deadline)| now < *deadline)
            .count()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    #[instrument(skip(self, session))]
    async fn set(&self, session: &Session, ttl: Duration) -> Result<(), AppError> {
        debug!(session_id = %session.id, user_id = %session.user_id, "storing session in memory");

        let deadline = Instant::now() + ttl;
        let mut sessions = self.sessions.lock().unwrap();
        sessions.insert(session.id.clone(), (session.clone(), deadline));
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, session_id: &str) -> Result<Option<Session>, AppError> {
        let mut sessions = self.sessions.lock().unwrap();

        let expired = matches!(
            sessions.get(session_id),
            Some((_, deadline)) if Instant::now() >= *deadline
        );
        if expired {
            debug!(session_id = %session_id, "session entry expired");
            sessions.remove(session_id);
            return Ok(None);
        }

        Ok(sessions.get(session_id).map(|(session, _)| session.clone()))
    }

    #[instrument(skip(self))]
    async fn delete(&self, session_id: &str) -> Result<(), AppError> {
        let mut sessions = self.sessions.lock().unwrap();
        if sessions.remove(session_id).is_none() {
            warn!(session_id = %session_id, "session not found for deletion");
            return Err(AppError::NotFound("session not found".to_string()));
        }

        debug!(session_id = %session_id, "session deleted from memory");
        Ok(())
    }
}

/// Redis implementation of the session store. Sessions are stored as JSON
/// under a `session:` key prefix with the TTL applied via `SET .. EX`, so
/// expiry is handled entirely by the backend.
pub struct RedisSessionStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisSessionStore {
    pub async fn connect(url: &str) -> Result<Self, AppError> {
        let client = redis::Client::open(url)
            .map_err(|e| AppError::SessionStoreUnavailable(format!("invalid redis url: {e}")))?;
        let conn = ConnectionManager::new(client).await.map_err(|e| {
            AppError::SessionStoreUnavailable(format!("redis connection failed: {e}"))
        })?;

        Ok(Self {
            conn,
            prefix: "session:".to_string(),
        })
    }

    fn key(&self, session_id: &str) -> String {
        format!("{}{}", self.prefix, session_id)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    #[instrument(skip(self, session))]
    async fn set(&self, session: &Session, ttl: Duration) -> Result<(), AppError> {
        let payload = serde_json::to_string(session)
            .map_err(|e| AppError::Internal(format!("failed to serialize session: {e}")))?;

        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(self.key(&session.id), payload, ttl.as_secs())
            .await
            .map_err(|e| {
                warn!(session_id = %session.id, error = %e, "failed to store session in redis");
                AppError::SessionStoreUnavailable(format!("failed to store session: {e}"))
            })?;

        debug!(session_id = %session.id, ttl_secs = ttl.as_secs(), "session stored in redis");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, session_id: &str) -> Result<Option<Session>, AppError> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn.get(self.key(session_id)).await.map_err(|e| {
            warn!(session_id = %session_id, error = %e, "failed to get session from redis");
            AppError::SessionStoreUnavailable(format!("failed to get session: {e}"))
        })?;

        match payload {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| AppError::Internal(format!("failed to deserialize session: {e}"))),
        }
    }

    #[instrument(skip(self))]
    async fn delete(&self, session_id: &str) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.del(self.key(session_id)).await.map_err(|e| {
            warn!(session_id = %session_id, error = %e, "failed to delete session from redis");
            AppError::SessionStoreUnavailable(format!("failed to delete session: {e}"))
        })?;

        if removed == 0 {
            warn!(session_id = %session_id, "session not found for deletion");
            return Err(AppError::NotFound("session not found".to_string()));
        }

        debug!(session_id = %session_id, "session deleted from redis");
        Ok(())
    }
}
