//! Session settings shared by every service
//!
//! Both services must load the same values for `SESSION_SECRET` and
//! `SESSION_COOKIE_NAME` and point at the same Redis, otherwise a login made
//! through one service is invisible to the other.

use anyhow::{bail, Context, Result};
use std::env;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_COOKIE_NAME: &str = "app-session-id";
pub const DEFAULT_TTL_SECS: u64 = 86_400;
/// Longest cookie lifetime accepted (400 days, the browser cap)
pub const MAX_COOKIE_MAX_AGE_SECS: u64 = 34_560_000;

#[derive(Clone)]
pub struct SessionConfig {
    /// Name of the session cookie
    pub cookie_name: String,
    /// HMAC key used to sign cookie values
    pub secret: String,
    /// Store TTL for records whose cookie has no max-age
    pub ttl_secs: u64,
    /// Optional cookie lifetime; `None` issues browser-session cookies
    pub cookie_max_age_secs: Option<u64>,
    /// Redis connection string
    pub redis_url: String,
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("cookie_name", &self.cookie_name)
            .field("secret", &"[REDACTED]")
            .field("ttl_secs", &self.ttl_secs)
            .field("cookie_max_age_secs", &self.cookie_max_age_secs)
            .field("redis_url", &self.redis_url)
            .finish()
    }
}

impl SessionConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            secret: secret.into(),
            ttl_secs: DEFAULT_TTL_SECS,
            cookie_max_age_secs: None,
            redis_url: "redis://127.0.0.1:6379".to_string(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let secret = env::var("SESSION_SECRET").context("SESSION_SECRET must be set")?;
        if secret.trim().is_empty() {
            bail!("SESSION_SECRET must not be empty");
        }

        let redis_url = match env::var("REDIS_URL") {
            Ok(url) => url,
            Err(_) => format!(
                "redis://{}:{}",
                env::var("REDIS_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
                env::var("REDIS_PORT").unwrap_or_else(|_| "6379".to_string()),
            ),
        };

        let cookie_max_age_secs: Option<u64> = env::var("SESSION_COOKIE_MAX_AGE_SECS")
            .ok()
            .map(|v| v.parse())
            .transpose()
            .context("Invalid SESSION_COOKIE_MAX_AGE_SECS")?;
        if let Some(secs) = cookie_max_age_secs.filter(|s| *s > MAX_COOKIE_MAX_AGE_SECS) {
            bail!(
                "SESSION_COOKIE_MAX_AGE_SECS must be at most {} (got {})",
                MAX_COOKIE_MAX_AGE_SECS,
                secs
            );
        }

        Ok(Self {
            cookie_name: env::var("SESSION_COOKIE_NAME")
                .unwrap_or_else(|_| DEFAULT_COOKIE_NAME.to_string()),
            secret,
            ttl_secs: env::var("SESSION_TTL_SECS")
                .unwrap_or_else(|_| DEFAULT_TTL_SECS.to_string())
                .parse()
                .context("Invalid SESSION_TTL_SECS")?,
            cookie_max_age_secs,
            redis_url,
        })
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}
