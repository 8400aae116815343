//! Configuration for GraphQL Gateway
//!
//! Loads settings from environment variables, with `.env` support for local
//! development.

use anyhow::{Context, Result};
use db_pool::DbConfig;
use session_store::SessionConfig;
use std::env;
use tracing::info;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,

    /// Document store holding posts and comments
    pub database: DbConfig,

    /// Shared session contract with the identity service
    pub session: SessionConfig,

    /// Allowed cross-origin caller; CORS is disabled when unset
    pub cors_origin: Option<String>,

    pub graphql: GraphQLConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct GraphQLConfig {
    /// Serve GraphQL Playground on browser GETs of the endpoint
    pub playground: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database =
            DbConfig::from_env("graphql-gateway").context("Failed to load database configuration")?;
        let session = SessionConfig::from_env().context("Failed to load session configuration")?;

        let config = Self {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()
                    .context("Invalid PORT")?,
            },
            database,
            session,
            cors_origin: env::var("ORIGIN_URL").ok().filter(|o| !o.is_empty()),
            graphql: GraphQLConfig {
                playground: env::var("GRAPHQL_PLAYGROUND")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(true),
            },
        };

        info!(
            bind_addr = %config.server.bind_addr(),
            cors_origin = ?config.cors_origin,
            playground = config.graphql.playground,
            "Gateway configuration loaded"
        );
        Ok(config)
    }
}
