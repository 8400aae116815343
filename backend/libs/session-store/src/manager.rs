use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{SessionConfig, MAX_COOKIE_MAX_AGE_SECS};
use crate::cookie;
use crate::record::{CookieMeta, SessionRecord};
use crate::store::{Result, SessionError, SessionStore};

/// A session resolved from a request cookie
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedSession {
    pub id: String,
    pub record: SessionRecord,
}

/// Reads and writes sessions according to the shared contract
///
/// The API gateway only ever calls [`SessionManager::resolve_identity`]; writing
/// identity into a session is reserved to the identity service.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, config: SessionConfig) -> Self {
        Self { store, config }
    }

    pub fn cookie_name(&self) -> &str {
        &self.config.cookie_name
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Load the session referenced by a raw cookie value
    ///
    /// Missing cookies, bad signatures, unknown ids and unreadable records all
    /// resolve to `None`. Only store connectivity failures are errors.
    pub async fn load(&self, cookie_value: Option<&str>) -> Result<Option<LoadedSession>> {
        let Some(raw) = cookie_value else {
            return Ok(None);
        };

        let Some(id) = cookie::unsign(raw, &self.config.secret) else {
            debug!("ignoring session cookie with invalid signature");
            return Ok(None);
        };

        match self.store.load(&id).await {
            Ok(Some(record)) => Ok(Some(LoadedSession { id, record })),
            Ok(None) => Ok(None),
            Err(SessionError::Malformed(err)) => {
                warn!(error = %err, "discarding malformed session record");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Resolve the authenticated user id carried by a cookie, if any
    pub async fn resolve_identity(&self, cookie_value: Option<&str>) -> Result<Option<String>> {
        Ok(self
            .load(cookie_value)
            .await?
            .and_then(|session| session.record.user_id().map(str::to_string)))
    }

    /// Load the referenced session or start a new, unsaved one
    ///
    /// The boolean is `true` when the session is new and its cookie still has to
    /// be sent to the client.
    pub async fn load_or_start(&self, cookie_value: Option<&str>) -> Result<(LoadedSession, bool)> {
        match self.load(cookie_value).await? {
            Some(session) => Ok((session, false)),
            None => Ok((
                LoadedSession {
                    id: cookie::generate_session_id(),
                    record: self.new_record(),
                },
                true,
            )),
        }
    }

    pub fn new_record(&self) -> SessionRecord {
        SessionRecord::new(self.new_cookie_meta())
    }

    fn new_cookie_meta(&self) -> CookieMeta {
        match self.config.cookie_max_age_secs {
            Some(secs) => {
                let secs = secs.min(MAX_COOKIE_MAX_AGE_SECS) as i64;
                CookieMeta {
                    original_max_age: Some(secs * 1000),
                    expires: Some(Utc::now() + chrono::Duration::seconds(secs)),
                    ..CookieMeta::default()
                }
            }
            None => CookieMeta::default(),
        }
    }

    /// Bind `user_id` to a freshly issued session id and return that id
    ///
    /// The previous session, if any, is destroyed; non-identity state it held is
    /// carried over to the new record.
    pub async fn establish(&self, previous: Option<LoadedSession>, user_id: &str) -> Result<String> {
        let mut record = match previous {
            Some(previous) => {
                self.store.destroy(&previous.id).await?;
                let mut record = previous.record;
                record.cookie = self.new_cookie_meta();
                record
            }
            None => self.new_record(),
        };
        record.set_user_id(user_id);

        let id = cookie::generate_session_id();
        self.save(&id, &record).await?;
        debug!(user_id, "session established");
        Ok(id)
    }

    pub async fn save(&self, session_id: &str, record: &SessionRecord) -> Result<()> {
        let ttl = record
            .ttl_secs()
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.config.ttl());
        self.store.save(session_id, record, ttl).await
    }

    pub async fn destroy(&self, session_id: &str) -> Result<()> {
        self.store.destroy(session_id).await
    }

    /// Signed, unencoded cookie value for a session id
    pub fn signed_cookie_value(&self, session_id: &str) -> String {
        cookie::sign(session_id, &self.config.secret)
    }
}
