//! Session storage backends

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::record::SessionRecord;

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),

    #[error("malformed session record: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl From<redis::RedisError> for SessionError {
    fn from(err: redis::RedisError) -> Self {
        SessionError::Unavailable(err.to_string())
    }
}

/// Key-value store holding session records by session id
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Option<SessionRecord>>;

    /// Insert or replace a record, expiring it after `ttl`
    async fn save(&self, session_id: &str, record: &SessionRecord, ttl: Duration) -> Result<()>;

    async fn destroy(&self, session_id: &str) -> Result<()>;
}

/// In-process store for tests and single-node development
///
/// Records are kept in their serialized form so the JSON contract is exercised
/// exactly as with Redis.
#[derive(Default)]
pub struct MemorySessionStore {
    entries: RwLock<HashMap<String, (String, Instant)>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw JSON payload, bypassing serialization
    pub async fn insert_raw(&self, session_id: &str, raw: &str, ttl: Duration) {
        self.entries
            .write()
            .await
            .insert(session_id.to_string(), (raw.to_string(), Instant::now() + ttl));
    }

    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|(_, expires_at)| *expires_at > now)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let raw = {
            let mut entries = self.entries.write().await;
            match entries.get(session_id) {
                Some((_, expires_at)) if *expires_at <= Instant::now() => {
                    entries.remove(session_id);
                    None
                }
                Some((raw, _)) => Some(raw.clone()),
                None => None,
            }
        };

        raw.map(|raw| SessionRecord::from_json(&raw))
            .transpose()
            .map_err(SessionError::from)
    }

    async fn save(&self, session_id: &str, record: &SessionRecord, ttl: Duration) -> Result<()> {
        let raw = record.to_json()?;
        self.insert_raw(session_id, &raw, ttl).await;
        Ok(())
    }

    async fn destroy(&self, session_id: &str) -> Result<()> {
        self.entries.write().await.remove(session_id);
        Ok(())
    }
}
