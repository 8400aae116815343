use super::session::{current_session, require_user, removal_cookie, session_cookie, set_cookie};
use super::AppState;
use crate::error::{IdentityError, Result};
use crate::models::{
    ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, RegisterRequest,
    ResetPasswordRequest, SetUsernameRequest, VerifyEmailRequest,
};
use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use tracing::info;
use validator::Validate;

fn ok() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse> {
    body.validate()?;
    let user = state.local.register(&body.email, &body.password).await?;
    Ok(HttpResponse::Created().json(json!({ "status": "ok", "user": user.public() })))
}

/// Check credentials and bind the user to a fresh session id
pub async fn login(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse> {
    body.validate()?;
    let user = state.local.login(&body.username, &body.password).await?;

    let previous = current_session(&req, &state.sessions).await?;
    let session_id = state
        .sessions
        .establish(previous, &user.id_string())
        .await?;
    info!(user_id = %user.id_string(), "User logged in");

    let mut response = HttpResponse::Ok();
    set_cookie(&mut response, &session_cookie(&state.sessions, &session_id));
    Ok(response.json(json!({ "status": "ok", "user": user.public() })))
}

pub async fn verify_email(
    state: web::Data<AppState>,
    body: web::Json<VerifyEmailRequest>,
) -> Result<HttpResponse> {
    let user = state.local.verify_email(&body.user_id, &body.token).await?;
    Ok(HttpResponse::Ok().json(json!({ "status": "ok", "user": user.public() })))
}

pub async fn generate_verification_token(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user_id = require_user(&req, &state.sessions).await?;
    state.local.generate_verification_token(&user_id).await?;
    Ok(ok())
}

/// Always succeeds so the endpoint cannot be used to probe for accounts
pub async fn forgot_password(
    state: web::Data<AppState>,
    body: web::Json<ForgotPasswordRequest>,
) -> Result<HttpResponse> {
    state.local.forgot_password(&body.username).await?;
    Ok(ok())
}

pub async fn reset_password(
    state: web::Data<AppState>,
    body: web::Json<ResetPasswordRequest>,
) -> Result<HttpResponse> {
    body.validate()?;
    state
        .local
        .reset_password(&body.user_id, &body.token, &body.new_password)
        .await?;
    Ok(ok())
}

pub async fn change_password(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse> {
    body.validate()?;
    let user_id = require_user(&req, &state.sessions).await?;
    state
        .local
        .change_password(&user_id, &body.password, &body.new_password)
        .await?;
    Ok(ok())
}

pub async fn set_username(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<SetUsernameRequest>,
) -> Result<HttpResponse> {
    let user_id = require_user(&req, &state.sessions).await?;
    body.validate()?;
    let user = state.local.set_username(&user_id, &body.username).await?;
    Ok(HttpResponse::Ok().json(json!({ "status": "ok", "user": user.public() })))
}

pub async fn current_user(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    let user_id = require_user(&req, &state.sessions).await?;
    let user = state
        .users
        .find_by_id(&user_id)
        .await?
        .ok_or(IdentityError::UserNotFound)?;
    Ok(HttpResponse::Ok().json(json!({ "status": "ok", "user": user.public() })))
}

/// Destroy the session record and expire the cookie
pub async fn logout(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    if let Some(session) = current_session(&req, &state.sessions).await? {
        state.sessions.destroy(&session.id).await?;
        if let Some(user_id) = session.record.user_id() {
            info!(user_id, "User logged out");
        }
    }

    let mut response = HttpResponse::Ok();
    set_cookie(&mut response, &removal_cookie(&state.sessions));
    Ok(response.json(json!({ "status": "ok" })))
}
