//! GraphQL Gateway Middleware

pub mod session;

pub use session::SessionAuth;
