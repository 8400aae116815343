//! Reading and writing the shared session from request handlers

use crate::error::{IdentityError, Result};
use actix_web::cookie::{time, Cookie, SameSite};
use actix_web::http::header::SET_COOKIE;
use actix_web::{HttpRequest, HttpResponseBuilder};
use session_store::{LoadedSession, SessionManager, MAX_COOKIE_MAX_AGE_SECS};

fn cookie_value(req: &HttpRequest, sessions: &SessionManager) -> Option<String> {
    req.cookie(sessions.cookie_name())
        .map(|cookie| cookie.value().to_string())
}

/// Session referenced by the request cookie, if it is valid and still stored
pub async fn current_session(
    req: &HttpRequest,
    sessions: &SessionManager,
) -> Result<Option<LoadedSession>> {
    Ok(sessions.load(cookie_value(req, sessions).as_deref()).await?)
}

/// Load the request's session, or start an unsaved one
///
/// The flag is `true` when the client does not hold a cookie for it yet.
pub async fn session_or_new(
    req: &HttpRequest,
    sessions: &SessionManager,
) -> Result<(LoadedSession, bool)> {
    Ok(sessions
        .load_or_start(cookie_value(req, sessions).as_deref())
        .await?)
}

pub async fn current_user_id(req: &HttpRequest, sessions: &SessionManager) -> Result<Option<String>> {
    Ok(sessions
        .resolve_identity(cookie_value(req, sessions).as_deref())
        .await?)
}

/// Authenticated user id, or `NotLoggedIn`
pub async fn require_user(req: &HttpRequest, sessions: &SessionManager) -> Result<String> {
    current_user_id(req, sessions)
        .await?
        .ok_or(IdentityError::NotLoggedIn)
}

/// Cookie carrying the signed id of `session_id`
///
/// The value is percent-encoded here because `Cookie`'s `Display` writes it
/// verbatim.
pub fn session_cookie(sessions: &SessionManager, session_id: &str) -> Cookie<'static> {
    let value = urlencoding::encode(&sessions.signed_cookie_value(session_id)).into_owned();
    let mut cookie = Cookie::build(sessions.cookie_name().to_string(), value)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .finish();
    if let Some(secs) = sessions.config().cookie_max_age_secs {
        cookie.set_max_age(time::Duration::seconds(
            secs.min(MAX_COOKIE_MAX_AGE_SECS) as i64,
        ));
    }
    cookie
}

/// Cookie that makes the browser drop the session cookie
pub fn removal_cookie(sessions: &SessionManager) -> Cookie<'static> {
    Cookie::build(sessions.cookie_name().to_string(), "")
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::ZERO)
        .expires(time::OffsetDateTime::UNIX_EPOCH)
        .finish()
}

pub fn set_cookie(builder: &mut HttpResponseBuilder, cookie: &Cookie<'_>) {
    builder.append_header((SET_COOKIE, cookie.to_string()));
}
