//! Document database connection management
//!
//! Provides unified MongoDB client creation and configuration for all services,
//! plus the identifier conversions every repository relies on.

pub mod ids;

pub use ids::{inserted_id_to_string, object_id_to_string, parse_object_id};

use mongodb::bson::doc;
use mongodb::options::ClientOptions;
use mongodb::{Client, Database};
use std::fmt;
use std::future::IntoFuture;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("database verification timed out after {0}s")]
    Timeout(u64),
}

/// Database connection configuration
#[derive(Clone)]
pub struct DbConfig {
    /// Service name, reported to the server as the client app name
    pub service_name: String,
    /// MongoDB connection string
    pub uri: String,
    /// Database holding the service's collections
    pub database: String,
    pub max_pool_size: u32,
    pub min_pool_size: u32,
    pub connect_timeout_secs: u64,
    pub server_selection_timeout_secs: u64,
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("service_name", &self.service_name)
            .field("uri", &"[REDACTED]")
            .field("database", &self.database)
            .field("max_pool_size", &self.max_pool_size)
            .field("min_pool_size", &self.min_pool_size)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field(
                "server_selection_timeout_secs",
                &self.server_selection_timeout_secs,
            )
            .finish()
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            service_name: String::from("unknown"),
            uri: String::from("mongodb://127.0.0.1:27017"),
            database: String::new(),
            max_pool_size: 10,
            min_pool_size: 0,
            connect_timeout_secs: 5,
            server_selection_timeout_secs: 10,
        }
    }
}

impl DbConfig {
    /// Load configuration from the environment
    ///
    /// `MONGO_URL` takes precedence; otherwise the URI is assembled from
    /// `MONGO_HOST` and `MONGO_PORT`. `MONGO_DB` is required.
    pub fn from_env(service_name: &str) -> Result<Self, PoolError> {
        let database = std::env::var("MONGO_DB")
            .map_err(|_| PoolError::Config("MONGO_DB environment variable not set".into()))?;

        let uri = match std::env::var("MONGO_URL") {
            Ok(uri) => uri,
            Err(_) => format!(
                "mongodb://{}:{}/{}",
                std::env::var("MONGO_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
                std::env::var("MONGO_PORT").unwrap_or_else(|_| "27017".to_string()),
                database,
            ),
        };

        let defaults = Self::default();
        Ok(Self {
            service_name: service_name.to_string(),
            uri,
            database,
            max_pool_size: parse_env("MONGO_MAX_POOL_SIZE", defaults.max_pool_size),
            min_pool_size: parse_env("MONGO_MIN_POOL_SIZE", defaults.min_pool_size),
            connect_timeout_secs: parse_env(
                "MONGO_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout_secs,
            ),
            server_selection_timeout_secs: parse_env(
                "MONGO_SERVER_SELECTION_TIMEOUT_SECS",
                defaults.server_selection_timeout_secs,
            ),
        })
    }

    pub fn log_config(&self) {
        info!(
            service = %self.service_name,
            database = %self.database,
            max_pool_size = self.max_pool_size,
            min_pool_size = self.min_pool_size,
            connect_timeout_secs = self.connect_timeout_secs,
            "Database configuration"
        );
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Connect to MongoDB and verify the server answers a ping
pub async fn create_database(config: &DbConfig) -> Result<Database, PoolError> {
    debug!(
        service = %config.service_name,
        max = config.max_pool_size,
        min = config.min_pool_size,
        "Creating database client"
    );

    let mut options = ClientOptions::parse(config.uri.as_str()).await?;
    options.app_name = Some(config.service_name.clone());
    options.max_pool_size = Some(config.max_pool_size);
    options.min_pool_size = Some(config.min_pool_size);
    options.connect_timeout = Some(Duration::from_secs(config.connect_timeout_secs));
    options.server_selection_timeout =
        Some(Duration::from_secs(config.server_selection_timeout_secs));

    let client = Client::with_options(options)?;
    let database = client.database(&config.database);

    match tokio::time::timeout(
        Duration::from_secs(config.server_selection_timeout_secs),
        database.run_command(doc! { "ping": 1 }).into_future(),
    )
    .await
    {
        Ok(Ok(_)) => {
            info!(
                service = %config.service_name,
                database = %config.database,
                "Database client created and verified successfully"
            );
            Ok(database)
        }
        Ok(Err(e)) => {
            error!(
                service = %config.service_name,
                error = %e,
                "Database connection verification failed"
            );
            Err(e.into())
        }
        Err(_) => {
            error!(
                service = %config.service_name,
                timeout_secs = config.server_selection_timeout_secs,
                "Database connection verification timeout"
            );
            Err(PoolError::Timeout(config.server_selection_timeout_secs))
        }
    }
}
