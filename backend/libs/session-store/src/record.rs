//! Serialized session record shared by every service reading the session store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Cookie metadata persisted alongside the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieMeta {
    /// Cookie lifetime in milliseconds; `None` means a browser-session cookie
    pub original_max_age: Option<i64>,
    pub expires: Option<DateTime<Utc>>,
    #[serde(default = "default_http_only")]
    pub http_only: bool,
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_http_only() -> bool {
    true
}

fn default_path() -> String {
    "/".to_string()
}

impl Default for CookieMeta {
    fn default() -> Self {
        Self {
            original_max_age: None,
            expires: None,
            http_only: default_http_only(),
            path: default_path(),
        }
    }
}

/// Authenticated identity written by the identity service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassportData {
    pub user: String,
}

/// A session record as stored under `sess:<sid>`
///
/// Keys other than `cookie` and `passport` are kept in `extra` so that a service
/// rewriting the record never drops state written by another one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(default)]
    pub cookie: CookieMeta,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passport: Option<PassportData>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionRecord {
    pub fn new(cookie: CookieMeta) -> Self {
        Self {
            cookie,
            passport: None,
            extra: Map::new(),
        }
    }

    /// Resolved user identity, if the session is authenticated
    pub fn user_id(&self) -> Option<&str> {
        self.passport
            .as_ref()
            .map(|p| p.user.as_str())
            .filter(|id| !id.is_empty())
    }

    pub fn set_user_id(&mut self, user_id: impl Into<String>) {
        self.passport = Some(PassportData {
            user: user_id.into(),
        });
    }

    pub fn clear_user_id(&mut self) {
        self.passport = None;
    }

    /// TTL in seconds derived from the cookie lifetime, if it has one
    pub fn ttl_secs(&self) -> Option<u64> {
        self.cookie
            .original_max_age
            .filter(|ms| *ms > 0)
            .map(|ms| (ms as u64).div_ceil(1000))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
