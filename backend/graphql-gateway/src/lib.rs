//! Blog GraphQL API gateway
//!
//! Resolves the caller from the shared session cookie and serves posts and
//! comments stored in MongoDB.

pub mod config;
pub mod context;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod schema;
pub mod store;

pub use context::RequestContext;
pub use schema::{build_schema, AppSchema};
