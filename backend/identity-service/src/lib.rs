/// Identity Service Library
///
/// Authenticates blog users and writes the resulting identity into the shared
/// session that the API gateway reads.
///
/// ## Modules
///
/// - `config`: Service configuration
/// - `db`: User repositories (MongoDB and in-memory)
/// - `error`: Error types and their HTTP mapping
/// - `http`: `/auth` routes
/// - `models`: User records and request bodies
/// - `security`: Password hashing, tokens, PKCE
/// - `services`: Local credentials, federated providers, mail
/// - `validators`: Input validation
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod models;
pub mod security;
pub mod services;
pub mod validators;

// Re-export commonly used types
pub use error::{IdentityError, Result};
pub use http::AppState;
