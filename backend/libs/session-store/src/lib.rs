//! Shared session contract between the API gateway and the identity service
//!
//! A login performed through the identity service is visible to the gateway
//! because both services:
//! - sign the session cookie with the same secret ([`cookie`]),
//! - store records under the same `sess:` namespace ([`RedisSessionStore`]),
//! - agree on the record layout ([`SessionRecord`]).

pub mod config;
pub mod cookie;
pub mod manager;
pub mod record;
pub mod redis_store;
pub mod store;

pub use config::{SessionConfig, MAX_COOKIE_MAX_AGE_SECS};
pub use manager::{LoadedSession, SessionManager};
pub use record::{CookieMeta, PassportData, SessionRecord};
pub use redis_store::{RedisSessionStore, SESSION_KEY_PREFIX};
pub use store::{MemorySessionStore, Result, SessionError, SessionStore};
