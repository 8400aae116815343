use anyhow::{Context, Result as AnyResult};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Client;
use std::time::Duration;
use tracing::{debug, info};

use crate::record::SessionRecord;
use crate::store::{Result, SessionStore};

/// Key namespace shared by every service reading or writing sessions
pub const SESSION_KEY_PREFIX: &str = "sess:";

/// Redis-backed session store
///
/// `ConnectionManager` multiplexes a single connection and reconnects on failure,
/// so clones are cheap and can be handed to each request.
#[derive(Clone)]
pub struct RedisSessionStore {
    manager: ConnectionManager,
    prefix: String,
}

impl RedisSessionStore {
    pub async fn connect(redis_url: &str) -> AnyResult<Self> {
        let client = Client::open(redis_url).context("failed to parse Redis connection string")?;
        let manager = ConnectionManager::new(client)
            .await
            .context("failed to initialize Redis connection manager")?;

        info!("Redis session store connected");
        Ok(Self::from_manager(manager))
    }

    pub fn from_manager(manager: ConnectionManager) -> Self {
        Self {
            manager,
            prefix: SESSION_KEY_PREFIX.to_string(),
        }
    }

    pub fn key(&self, session_id: &str) -> String {
        format!("{}{}", self.prefix, session_id)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(self.key(session_id))
            .query_async(&mut conn)
            .await?;

        match raw {
            Some(raw) => Ok(Some(SessionRecord::from_json(&raw)?)),
            None => {
                debug!("session not found in Redis");
                Ok(None)
            }
        }
    }

    async fn save(&self, session_id: &str, record: &SessionRecord, ttl: Duration) -> Result<()> {
        let payload = record.to_json()?;
        // EX 0 is rejected by Redis
        let ttl_secs = ttl.as_secs().max(1);

        let mut conn = self.manager.clone();
        redis::cmd("SET")
            .arg(self.key(session_id))
            .arg(payload)
            .arg("EX")
            .arg(ttl_secs)
            .query_async::<_, ()>(&mut conn)
            .await?;

        Ok(())
    }

    async fn destroy(&self, session_id: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        redis::cmd("DEL")
            .arg(self.key(session_id))
            .query_async::<_, ()>(&mut conn)
            .await?;

        Ok(())
    }
}
