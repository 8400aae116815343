use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use session_store::SessionError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IdentityError>;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not logged in.")]
    NotLoggedIn,

    #[error("User not found")]
    UserNotFound,

    #[error("Email already exists")]
    EmailAlreadyExists,

    #[error("Username already exists")]
    UsernameAlreadyExists,

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Password too weak: {0}")]
    WeakPassword(String),

    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Email already verified")]
    AlreadyVerified,

    #[error("Invalid OAuth state")]
    InvalidOAuthState,

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("OAuth provider error: {0}")]
    OAuthError(String),

    #[error("This {0} account is already linked to another user")]
    ProviderAccountInUse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Session store error: {0}")]
    Session(String),

    #[error("Mail delivery error: {0}")]
    Mail(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IdentityError {
    /// Message safe to return to clients
    pub fn public_message(&self) -> String {
        match self {
            IdentityError::Database(_)
            | IdentityError::Session(_)
            | IdentityError::Mail(_)
            | IdentityError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl ResponseError for IdentityError {
    fn status_code(&self) -> StatusCode {
        match self {
            IdentityError::InvalidCredentials | IdentityError::NotLoggedIn => {
                StatusCode::UNAUTHORIZED
            }
            IdentityError::UserNotFound | IdentityError::UnknownProvider(_) => {
                StatusCode::NOT_FOUND
            }
            IdentityError::EmailAlreadyExists
            | IdentityError::UsernameAlreadyExists
            | IdentityError::ProviderAccountInUse(_) => StatusCode::CONFLICT,
            IdentityError::InvalidEmail(_)
            | IdentityError::WeakPassword(_)
            | IdentityError::InvalidUsername(_)
            | IdentityError::InvalidToken
            | IdentityError::TokenExpired
            | IdentityError::AlreadyVerified
            | IdentityError::InvalidOAuthState
            | IdentityError::Validation(_) => StatusCode::BAD_REQUEST,
            IdentityError::OAuthError(_) => StatusCode::BAD_GATEWAY,
            IdentityError::Session(_) => StatusCode::SERVICE_UNAVAILABLE,
            IdentityError::Database(_) | IdentityError::Mail(_) | IdentityError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.status_code().is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "status": "error",
            "message": self.public_message(),
        }))
    }
}

impl From<mongodb::error::Error> for IdentityError {
    fn from(err: mongodb::error::Error) -> Self {
        IdentityError::Database(err.to_string())
    }
}

impl From<SessionError> for IdentityError {
    fn from(err: SessionError) -> Self {
        IdentityError::Session(err.to_string())
    }
}

impl From<validator::ValidationErrors> for IdentityError {
    fn from(err: validator::ValidationErrors) -> Self {
        IdentityError::Validation(err.to_string())
    }
}
