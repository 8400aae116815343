use super::session::{current_session, session_cookie, session_or_new, set_cookie};
use super::AppState;
use crate::error::{IdentityError, Result};
use crate::security::{hash_token, token_matches};
use crate::services::PendingAuthorization;
use actix_web::http::header::LOCATION;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

pub async fn list_providers(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok", "providers": state.providers.names() }))
}

/// Remember a fresh state in the session and redirect to the provider
pub async fn login(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let provider = state.providers.get(&path)?;
    let (mut session, is_new) = session_or_new(&req, &state.sessions).await?;

    let (pending, url) = PendingAuthorization::start(provider.as_ref());
    let pending = serde_json::to_value(&pending)
        .map_err(|e| IdentityError::Internal(e.to_string()))?;
    session
        .record
        .extra
        .insert(PendingAuthorization::session_key(provider.name()), pending);
    state.sessions.save(&session.id, &session.record).await?;

    let mut response = HttpResponse::Found();
    response.append_header((LOCATION, url));
    if is_new {
        set_cookie(&mut response, &session_cookie(&state.sessions, &session.id));
    }
    Ok(response.finish())
}

/// Complete the provider round trip and log the resolved user in
pub async fn callback(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<CallbackQuery>,
) -> Result<HttpResponse> {
    let provider = state.providers.get(&path)?;
    let mut session = current_session(&req, &state.sessions)
        .await?
        .ok_or(IdentityError::InvalidOAuthState)?;

    let pending: PendingAuthorization = session
        .record
        .extra
        .remove(&PendingAuthorization::session_key(provider.name()))
        .and_then(|value| serde_json::from_value(value).ok())
        .ok_or(IdentityError::InvalidOAuthState)?;
    // Single use, whatever the outcome below
    state.sessions.save(&session.id, &session.record).await?;

    if let Some(error) = &query.error {
        warn!(provider = provider.name(), error = %error, "Provider denied authorization");
        return Err(IdentityError::OAuthError(error.clone()));
    }

    let returned_state = query.state.as_deref().unwrap_or_default();
    if !token_matches(returned_state, &hash_token(&pending.state)) {
        return Err(IdentityError::InvalidOAuthState);
    }
    let code = query
        .code
        .as_deref()
        .ok_or_else(|| IdentityError::OAuthError("Missing authorization code".to_string()))?;

    let profile = provider
        .fetch_profile(code, pending.code_verifier.as_deref())
        .await?;
    let current_user = session.record.user_id().map(str::to_string);
    let user = state
        .federated
        .resolve(provider.name(), profile, current_user.as_deref())
        .await?;

    let session_id = state
        .sessions
        .establish(Some(session), &user.id_string())
        .await?;
    info!(user_id = %user.id_string(), provider = provider.name(), "User logged in with provider");

    let mut response = HttpResponse::Found();
    response.append_header((LOCATION, state.origin_url.as_deref().unwrap_or("/")));
    set_cookie(&mut response, &session_cookie(&state.sessions, &session_id));
    Ok(response.finish())
}
