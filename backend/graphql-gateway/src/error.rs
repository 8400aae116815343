//! Gateway error taxonomy and its GraphQL representation

use async_graphql::ErrorExtensions;
use session_store::SessionError;
use thiserror::Error;

use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Mutation attempted without a resolved identity
    #[error("User not logged in.")]
    AuthenticationRequired,

    /// Document store or session store failure
    #[error("Upstream failure: {0}")]
    Upstream(String),
}

impl GatewayError {
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::AuthenticationRequired => "UNAUTHENTICATED",
            GatewayError::Upstream(_) => "INTERNAL_SERVER_ERROR",
        }
    }
}

impl ErrorExtensions for GatewayError {
    fn extend(&self) -> async_graphql::Error {
        async_graphql::Error::new(self.to_string()).extend_with(|_, e| e.set("code", self.code()))
    }
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = %err, "Document store error");
        GatewayError::Upstream(err.to_string())
    }
}

impl From<SessionError> for GatewayError {
    fn from(err: SessionError) -> Self {
        tracing::error!(error = %err, "Session store error");
        GatewayError::Upstream(err.to_string())
    }
}
