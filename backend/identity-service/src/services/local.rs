//! Local (email/username + password) credentials
use crate::db::UserRepository;
use crate::error::{IdentityError, Result};
use crate::models::User;
use crate::security::{generate_token, hash_password, hash_token, token_matches, verify_password};
use crate::services::email::AccountMailer;
use crate::validators::{normalize_email, validate_email, validate_username};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};

pub const VERIFICATION_TOKEN_TTL_HOURS: i64 = 24;
pub const PASSWORD_RESET_TOKEN_TTL_HOURS: i64 = 1;

#[derive(Clone)]
pub struct LocalAuthService {
    users: Arc<dyn UserRepository>,
    mailer: Option<AccountMailer>,
}

impl LocalAuthService {
    pub fn new(users: Arc<dyn UserRepository>, mailer: Option<AccountMailer>) -> Self {
        Self { users, mailer }
    }

    /// Create a user with local credentials
    ///
    /// The account starts unverified; a verification token is mailed when the
    /// mail plugin is enabled.
    pub async fn register(&self, email: &str, password: &str) -> Result<User> {
        let email = normalize_email(email);
        if !validate_email(&email) {
            return Err(IdentityError::InvalidEmail(email));
        }
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(IdentityError::EmailAlreadyExists);
        }

        let password_hash = hash_password(password)?;
        let token = generate_token();

        let mut user = User::new();
        let local = user.local_mut();
        local.email = Some(email.clone());
        local.password = Some(password_hash);
        local.verification_token = Some(hash_token(&token));
        local.verification_token_expires_at =
            Some(Utc::now() + Duration::hours(VERIFICATION_TOKEN_TTL_HOURS));

        self.users.insert(&user).await?;
        info!(user_id = %user.id_string(), "User registered");

        if let Some(mailer) = &self.mailer {
            notify(mailer.send_welcome(&email, &user.id_string(), &token).await);
        }
        Ok(user)
    }

    /// Authenticate by email or username
    pub async fn login(&self, username: &str, password: &str) -> Result<User> {
        let user = self
            .find_by_login(username)
            .await?
            .ok_or(IdentityError::InvalidCredentials)?;

        let Some(hash) = user.local.as_ref().and_then(|l| l.password.as_deref()) else {
            return Err(IdentityError::InvalidCredentials);
        };
        if !verify_password(password, hash)? {
            warn!(user_id = %user.id_string(), "Failed login attempt");
            return Err(IdentityError::InvalidCredentials);
        }

        Ok(user)
    }

    async fn find_by_login(&self, username: &str) -> Result<Option<User>> {
        if username.contains('@') {
            self.users.find_by_email(&normalize_email(username)).await
        } else {
            self.users.find_by_username(username.trim()).await
        }
    }

    async fn require_user(&self, user_id: &str) -> Result<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(IdentityError::UserNotFound)
    }

    pub async fn verify_email(&self, user_id: &str, token: &str) -> Result<User> {
        let mut user = self.require_user(user_id).await?;
        let local = user.local.as_mut().ok_or(IdentityError::InvalidToken)?;

        let stored = local
            .verification_token
            .as_deref()
            .ok_or(IdentityError::InvalidToken)?;
        if !token_matches(token, stored) {
            return Err(IdentityError::InvalidToken);
        }
        if local
            .verification_token_expires_at
            .map(|expires| expires < Utc::now())
            .unwrap_or(true)
        {
            return Err(IdentityError::TokenExpired);
        }

        local.verified = true;
        local.verification_token = None;
        local.verification_token_expires_at = None;
        self.users.update(&user).await?;
        info!(user_id = %user.id_string(), "Email verified");

        if let (Some(mailer), Some(email)) = (&self.mailer, user.email()) {
            notify(mailer.send_verified(email).await);
        }
        Ok(user)
    }

    /// Issue a fresh verification token for an unverified address
    pub async fn generate_verification_token(&self, user_id: &str) -> Result<()> {
        let mut user = self.require_user(user_id).await?;
        let local = user
            .local
            .as_mut()
            .filter(|l| l.email.is_some())
            .ok_or_else(|| IdentityError::Validation("No email address on this account".into()))?;
        if local.verified {
            return Err(IdentityError::AlreadyVerified);
        }

        let token = generate_token();
        local.verification_token = Some(hash_token(&token));
        local.verification_token_expires_at =
            Some(Utc::now() + Duration::hours(VERIFICATION_TOKEN_TTL_HOURS));
        self.users.update(&user).await?;

        if let (Some(mailer), Some(email)) = (&self.mailer, user.email()) {
            notify(mailer.send_verification(email, &user.id_string(), &token).await);
        }
        Ok(())
    }

    /// Start a password reset
    ///
    /// Unknown accounts are not reported to the caller.
    pub async fn forgot_password(&self, username: &str) -> Result<()> {
        let Some(mut user) = self.find_by_login(username).await? else {
            info!("Password reset requested for unknown account");
            return Ok(());
        };
        let Some(email) = user.email().map(str::to_string) else {
            info!(user_id = %user.id_string(), "Password reset requested for account without email");
            return Ok(());
        };

        let token = generate_token();
        let local = user.local_mut();
        local.password_reset_token = Some(hash_token(&token));
        local.password_reset_token_expires_at =
            Some(Utc::now() + Duration::hours(PASSWORD_RESET_TOKEN_TTL_HOURS));
        self.users.update(&user).await?;
        info!(user_id = %user.id_string(), "Password reset token issued");

        if let Some(mailer) = &self.mailer {
            notify(mailer.send_password_reset(&email, &user.id_string(), &token).await);
        }
        Ok(())
    }

    pub async fn reset_password(&self, user_id: &str, token: &str, new_password: &str) -> Result<()> {
        let mut user = self.require_user(user_id).await?;
        let local = user.local.as_mut().ok_or(IdentityError::InvalidToken)?;

        let stored = local
            .password_reset_token
            .as_deref()
            .ok_or(IdentityError::InvalidToken)?;
        if !token_matches(token, stored) {
            return Err(IdentityError::InvalidToken);
        }
        if local
            .password_reset_token_expires_at
            .map(|expires| expires < Utc::now())
            .unwrap_or(true)
        {
            return Err(IdentityError::TokenExpired);
        }

        local.password = Some(hash_password(new_password)?);
        local.password_reset_token = None;
        local.password_reset_token_expires_at = None;
        self.users.update(&user).await?;
        info!(user_id = %user.id_string(), "Password reset");

        if let (Some(mailer), Some(email)) = (&self.mailer, user.email()) {
            notify(mailer.send_password_changed(email).await);
        }
        Ok(())
    }

    pub async fn change_password(&self, user_id: &str, password: &str, new_password: &str) -> Result<()> {
        let mut user = self.require_user(user_id).await?;
        let current = user
            .local
            .as_ref()
            .and_then(|l| l.password.as_deref())
            .ok_or(IdentityError::InvalidCredentials)?;
        if !verify_password(password, current)? {
            return Err(IdentityError::InvalidCredentials);
        }

        user.local_mut().password = Some(hash_password(new_password)?);
        self.users.update(&user).await?;
        info!(user_id = %user.id_string(), "Password changed");

        if let (Some(mailer), Some(email)) = (&self.mailer, user.email()) {
            notify(mailer.send_password_changed(email).await);
        }
        Ok(())
    }

    pub async fn set_username(&self, user_id: &str, username: &str) -> Result<User> {
        let username = username.trim();
        if !validate_username(username) {
            return Err(IdentityError::InvalidUsername(
                "3-32 characters: letters, digits and underscore".to_string(),
            ));
        }

        let mut user = self.require_user(user_id).await?;
        if let Some(owner) = self.users.find_by_username(username).await? {
            if owner.id != user.id {
                return Err(IdentityError::UsernameAlreadyExists);
            }
        }

        user.local_mut().username = Some(username.to_string());
        self.users.update(&user).await?;
        Ok(user)
    }
}

/// Mail failures never undo the account change that triggered them
fn notify(result: Result<()>) {
    if let Err(e) = result {
        error!(error = %e, "Failed to send account email");
    }
}
