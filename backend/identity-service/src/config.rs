//! Configuration management for Identity Service
//!
//! Loads settings from environment variables, with `.env` support for local
//! development. Mail and each federated provider are optional: leaving their
//! variables unset disables the feature without failing startup.

use anyhow::{Context, Result};
use db_pool::DbConfig;
use session_store::SessionConfig;
use std::env;
use std::fmt;

/// Application settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DbConfig,
    pub session: SessionConfig,
    /// Browser origin allowed to call the service, and the post-login redirect
    pub origin_url: Option<String>,
    /// Mail plugin; `None` when `MAIL_FROM` is unset
    pub email: Option<EmailSettings>,
    pub oauth: OAuthSettings,
}

impl Settings {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let server = ServerSettings::from_env()?;
        Ok(Self {
            database: DbConfig::from_env("identity-service")
                .context("Failed to load database configuration")?,
            session: SessionConfig::from_env().context("Failed to load session configuration")?,
            origin_url: non_empty("ORIGIN_URL"),
            email: EmailSettings::from_env()?,
            oauth: OAuthSettings::from_env(&server.public_url),
            server,
        })
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Externally reachable base URL, used to build provider callbacks
    pub public_url: String,
}

impl ServerSettings {
    fn from_env() -> Result<Self> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "3001".to_string())
            .parse()
            .context("Invalid PORT")?;
        let public_url = non_empty("AUTH_PUBLIC_URL")
            .unwrap_or_else(|| format!("http://{}:{}", host, port))
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            host,
            port,
            public_url,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Mail plugin configuration
#[derive(Clone)]
pub struct EmailSettings {
    pub from: String,
    pub site_name: String,
    /// Base URL of the front end, used for links in messages
    pub url: String,
    /// SMTP relay; an empty host runs the mailer in no-op mode
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub use_starttls: bool,
}

impl fmt::Debug for EmailSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailSettings")
            .field("from", &self.from)
            .field("site_name", &self.site_name)
            .field("url", &self.url)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &self.smtp_password.as_ref().map(|_| "[REDACTED]"))
            .field("use_starttls", &self.use_starttls)
            .finish()
    }
}

impl EmailSettings {
    fn from_env() -> Result<Option<Self>> {
        let Some(from) = non_empty("MAIL_FROM") else {
            return Ok(None);
        };

        Ok(Some(Self {
            from,
            site_name: env::var("MAIL_SITE_NAME").unwrap_or_else(|_| "Blog".to_string()),
            url: env::var("MAIL_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string())
                .trim_end_matches('/')
                .to_string(),
            smtp_host: env::var("MAIL_SMTP_HOST").unwrap_or_default(),
            smtp_port: env::var("MAIL_SMTP_PORT")
                .unwrap_or_else(|_| "587".to_string())
                .parse()
                .context("Invalid MAIL_SMTP_PORT")?,
            smtp_username: non_empty("MAIL_SMTP_USERNAME"),
            smtp_password: non_empty("MAIL_SMTP_PASSWORD"),
            use_starttls: env::var("MAIL_SMTP_STARTTLS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
        }))
    }
}

/// Client credentials registered with one provider
#[derive(Clone)]
pub struct ProviderCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("callback_url", &self.callback_url)
            .finish()
    }
}

/// Federated provider configuration (Facebook, Google, Twitter)
#[derive(Debug, Clone, Default)]
pub struct OAuthSettings {
    pub facebook: Option<ProviderCredentials>,
    pub google: Option<ProviderCredentials>,
    pub twitter: Option<ProviderCredentials>,
}

impl OAuthSettings {
    fn from_env(public_url: &str) -> Self {
        Self {
            facebook: provider_from_env("FACEBOOK", "facebook", public_url),
            google: provider_from_env("GOOGLE", "google", public_url),
            twitter: provider_from_env("TWITTER", "twitter", public_url),
        }
    }
}

fn provider_from_env(prefix: &str, name: &str, public_url: &str) -> Option<ProviderCredentials> {
    let client_id = non_empty(&format!("{}_CLIENT_ID", prefix))?;
    Some(ProviderCredentials {
        client_id,
        client_secret: env::var(format!("{}_CLIENT_SECRET", prefix)).unwrap_or_default(),
        callback_url: non_empty(&format!("{}_CALLBACK_URL", prefix))
            .unwrap_or_else(|| format!("{}/auth/{}/callback", public_url, name)),
    })
}
