use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

/// User model - core identity entity, stored in the `users` collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<LocalCredentials>,
    /// External accounts keyed by provider name
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderLink>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Email/password credentials
///
/// Tokens are stored as SHA-256 digests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Argon2 PHC string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_token_expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_reset_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_reset_token_expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderLink {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl User {
    pub fn new() -> Self {
        Self {
            id: ObjectId::new(),
            local: None,
            providers: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn id_string(&self) -> String {
        self.id.to_hex()
    }

    pub fn email(&self) -> Option<&str> {
        self.local.as_ref().and_then(|l| l.email.as_deref())
    }

    /// Local credentials, created empty on first use
    pub fn local_mut(&mut self) -> &mut LocalCredentials {
        self.local.get_or_insert_with(LocalCredentials::default)
    }

    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id_string(),
            local: self.local.as_ref().map(|l| PublicLocal {
                email: l.email.clone(),
                username: l.username.clone(),
                verified: l.verified,
            }),
            providers: self.providers.clone(),
        }
    }
}

impl Default for User {
    fn default() -> Self {
        Self::new()
    }
}

/// Client-facing projection; never carries hashes or tokens
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicUser {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local: Option<PublicLocal>,
    pub providers: BTreeMap<String, ProviderLink>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicLocal {
    pub email: Option<String>,
    pub username: Option<String>,
    pub verified: bool,
}

/// User registration request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// User login request; `username` may also be an email address
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(alias = "email")]
    #[validate(length(min = 1, max = 254))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyEmailRequest {
    pub user_id: String,
    pub token: String,
}

/// Password reset initiation request
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(alias = "email")]
    pub username: String,
}

/// Password reset completion request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub user_id: String,
    pub token: String,
    #[validate(length(min = 1, max = 128))]
    pub new_password: String,
}

/// Password change request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub password: String,
    #[validate(length(min = 1, max = 128))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetUsernameRequest {
    #[validate(custom(function = "crate::validators::validate_username_shape_validator"))]
    pub username: String,
}
