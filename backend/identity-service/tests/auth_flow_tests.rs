//! End-to-end `/auth` flows against in-memory stores

use actix_web::dev::ServiceResponse;
use actix_web::http::header::{COOKIE, LOCATION, SET_COOKIE};
use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use async_trait::async_trait;
use identity_service::db::MemoryUserRepository;
use identity_service::error::{IdentityError, Result};
use identity_service::http::{self, AppState};
use identity_service::services::{
    AccountMailer, ExternalProfile, IdentityProvider, Mailer, OutgoingMail, ProviderRegistry,
};
use serde_json::{json, Value};
use session_store::{MemorySessionStore, SessionConfig, SessionManager};
use std::sync::Arc;
use tokio::sync::Mutex;

const PASSWORD: &str = "Str0ng!Passw0rd";
const ORIGIN: &str = "http://localhost:8080";

#[derive(Default)]
struct Outbox(Mutex<Vec<OutgoingMail>>);

impl Outbox {
    /// Token from the link in the most recent message to `to`
    async fn token_for(&self, to: &str) -> String {
        let sent = self.0.lock().await;
        let mail = sent
            .iter()
            .rev()
            .find(|m| m.to == to)
            .expect("a message was sent");
        mail.text
            .split("token=")
            .nth(1)
            .and_then(|rest| rest.split_whitespace().next())
            .expect("message carries a token")
            .to_string()
    }
}

#[async_trait]
impl Mailer for Outbox {
    async fn send(&self, mail: OutgoingMail) -> Result<()> {
        self.0.lock().await.push(mail);
        Ok(())
    }
}

struct FakeProvider;

#[async_trait]
impl IdentityProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    fn uses_pkce(&self) -> bool {
        true
    }

    fn authorization_url(&self, state: &str, code_challenge: Option<&str>) -> String {
        format!(
            "https://provider.test/authorize?state={}&code_challenge={}",
            state,
            code_challenge.unwrap_or_default()
        )
    }

    async fn fetch_profile(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<ExternalProfile> {
        if code != "good-code" || code_verifier.is_none() {
            return Err(IdentityError::OAuthError("bad code".to_string()));
        }
        Ok(ExternalProfile {
            id: "fake-42".to_string(),
            email: Some("jane@provider.test".to_string()),
        })
    }
}

struct Harness {
    state: web::Data<AppState>,
    outbox: Arc<Outbox>,
    sessions: SessionManager,
}

fn harness() -> Harness {
    let users = Arc::new(MemoryUserRepository::new());
    let sessions = SessionManager::new(
        Arc::new(MemorySessionStore::new()),
        SessionConfig::new("test-session-secret"),
    );
    let outbox = Arc::new(Outbox::default());
    let mut providers = ProviderRegistry::new();
    providers.register(Arc::new(FakeProvider));

    let state = AppState::new(
        users,
        sessions.clone(),
        Some(AccountMailer::new(outbox.clone(), "Blog", ORIGIN)),
        providers,
        Some(ORIGIN.to_string()),
    );

    Harness {
        state: web::Data::new(state),
        outbox,
        sessions,
    }
}

macro_rules! identity_app {
    ($harness:expr) => {
        test::init_service(
            App::new()
                .app_data($harness.state.clone())
                .configure(http::configure),
        )
        .await
    };
}

/// `name=value` part of the session Set-Cookie header, ready to send back
fn session_cookie<B>(resp: &ServiceResponse<B>) -> Option<String> {
    resp.headers()
        .get_all(SET_COOKIE)
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("app-session-id="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

fn location<B>(resp: &ServiceResponse<B>) -> String {
    resp.headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn post(uri: &str, body: Value, cookie: Option<&str>) -> test::TestRequest {
    let req = test::TestRequest::post().uri(uri).set_json(body);
    match cookie {
        Some(cookie) => req.insert_header((COOKIE, cookie.to_string())),
        None => req,
    }
}

fn get(uri: &str, cookie: Option<&str>) -> test::TestRequest {
    let req = test::TestRequest::get().uri(uri);
    match cookie {
        Some(cookie) => req.insert_header((COOKIE, cookie.to_string())),
        None => req,
    }
}

fn raw_cookie_value(cookie: &str) -> String {
    let encoded = cookie.split_once('=').map(|(_, v)| v).unwrap_or_default();
    urlencoding::decode(encoded)
        .expect("cookie value is utf-8")
        .into_owned()
}

#[actix_web::test]
async fn test_register_verify_login_logout() {
    let harness = harness();
    let app = identity_app!(harness);

    let resp = test::call_service(
        &app,
        post(
            "/auth/local/register",
            json!({ "email": "Jane@Example.com", "password": PASSWORD }),
            None,
        )
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert!(session_cookie(&resp).is_none());
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["user"]["local"]["email"], "jane@example.com");
    assert_eq!(body["user"]["local"]["verified"], false);
    assert!(body["user"]["local"].get("password").is_none());
    let user_id = body["user"]["_id"].as_str().unwrap().to_string();

    let token = harness.outbox.token_for("jane@example.com").await;
    let resp = test::call_service(
        &app,
        post(
            "/auth/local/verify",
            json!({ "userId": user_id, "token": token }),
            None,
        )
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["user"]["local"]["verified"], true);

    let resp = test::call_service(
        &app,
        post(
            "/auth/local/login",
            json!({ "email": "jane@example.com", "password": PASSWORD }),
            None,
        )
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = session_cookie(&resp).expect("login sets the session cookie");
    assert!(resp
        .headers()
        .get(SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .contains("HttpOnly"));

    let resp = test::call_service(&app, get("/auth/user", Some(&cookie)).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["user"]["_id"], user_id.as_str());

    let resp = test::call_service(&app, post("/auth/logout", json!({}), Some(&cookie)).to_request())
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(session_cookie(&resp).as_deref(), Some("app-session-id="));

    let resp = test::call_service(&app, get("/auth/user", Some(&cookie)).to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body,
        json!({ "status": "error", "message": "User not logged in." })
    );
}

#[actix_web::test]
async fn test_login_writes_identity_into_shared_session() {
    let harness = harness();
    let app = identity_app!(harness);

    let resp = test::call_service(
        &app,
        post(
            "/auth/local/register",
            json!({ "email": "jane@example.com", "password": PASSWORD }),
            None,
        )
        .to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    let user_id = body["user"]["_id"].as_str().unwrap().to_string();

    let resp = test::call_service(
        &app,
        post(
            "/auth/local/login",
            json!({ "username": "jane@example.com", "password": PASSWORD }),
            None,
        )
        .to_request(),
    )
    .await;
    let cookie = session_cookie(&resp).unwrap();

    let identity = harness
        .sessions
        .resolve_identity(Some(&raw_cookie_value(&cookie)))
        .await
        .unwrap();
    assert_eq!(identity, Some(user_id));
}

#[actix_web::test]
async fn test_login_rotates_existing_session() {
    let harness = harness();
    let app = identity_app!(harness);

    test::call_service(
        &app,
        post(
            "/auth/local/register",
            json!({ "email": "jane@example.com", "password": PASSWORD }),
            None,
        )
        .to_request(),
    )
    .await;

    // Starting a provider login hands out an anonymous session first
    let resp = test::call_service(&app, get("/auth/fake/login", None).to_request()).await;
    let anonymous = session_cookie(&resp).unwrap();

    let resp = test::call_service(
        &app,
        post(
            "/auth/local/login",
            json!({ "email": "jane@example.com", "password": PASSWORD }),
            Some(&anonymous),
        )
        .to_request(),
    )
    .await;
    let authenticated = session_cookie(&resp).unwrap();

    assert_ne!(anonymous, authenticated);
    assert!(harness
        .sessions
        .load(Some(&raw_cookie_value(&anonymous)))
        .await
        .unwrap()
        .is_none());
}

#[actix_web::test]
async fn test_invalid_credentials() {
    let harness = harness();
    let app = identity_app!(harness);

    test::call_service(
        &app,
        post(
            "/auth/local/register",
            json!({ "email": "jane@example.com", "password": PASSWORD }),
            None,
        )
        .to_request(),
    )
    .await;

    let resp = test::call_service(
        &app,
        post(
            "/auth/local/login",
            json!({ "email": "jane@example.com", "password": "Wr0ng!Password" }),
            None,
        )
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(session_cookie(&resp).is_none());
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Invalid credentials");
}

#[actix_web::test]
async fn test_registration_rejections() {
    let harness = harness();
    let app = identity_app!(harness);

    let resp = test::call_service(
        &app,
        post(
            "/auth/local/register",
            json!({ "email": "jane@example.com", "password": "password" }),
            None,
        )
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = test::call_service(
        &app,
        post(
            "/auth/local/register",
            json!({ "email": "not-an-email", "password": PASSWORD }),
            None,
        )
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    for expected in [StatusCode::CREATED, StatusCode::CONFLICT] {
        let resp = test::call_service(
            &app,
            post(
                "/auth/local/register",
                json!({ "email": "jane@example.com", "password": PASSWORD }),
                None,
            )
            .to_request(),
        )
        .await;
        assert_eq!(resp.status(), expected);
    }
}

#[actix_web::test]
async fn test_set_username_then_login_with_it() {
    let harness = harness();
    let app = identity_app!(harness);

    let resp = test::call_service(
        &app,
        post("/auth/local/set-username", json!({ "username": "jane" }), None).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    test::call_service(
        &app,
        post(
            "/auth/local/register",
            json!({ "email": "jane@example.com", "password": PASSWORD }),
            None,
        )
        .to_request(),
    )
    .await;
    let resp = test::call_service(
        &app,
        post(
            "/auth/local/login",
            json!({ "email": "jane@example.com", "password": PASSWORD }),
            None,
        )
        .to_request(),
    )
    .await;
    let cookie = session_cookie(&resp).unwrap();

    let resp = test::call_service(
        &app,
        post(
            "/auth/local/set-username",
            json!({ "username": "no spaces allowed" }),
            Some(&cookie),
        )
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = test::call_service(
        &app,
        post(
            "/auth/local/set-username",
            json!({ "username": "jane_doe" }),
            Some(&cookie),
        )
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["user"]["local"]["username"], "jane_doe");

    let resp = test::call_service(
        &app,
        post(
            "/auth/local/login",
            json!({ "username": "jane_doe", "password": PASSWORD }),
            None,
        )
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_password_reset_flow() {
    let harness = harness();
    let app = identity_app!(harness);

    let resp = test::call_service(
        &app,
        post(
            "/auth/local/register",
            json!({ "email": "jane@example.com", "password": PASSWORD }),
            None,
        )
        .to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    let user_id = body["user"]["_id"].as_str().unwrap().to_string();

    let resp = test::call_service(
        &app,
        post(
            "/auth/local/forgot-password",
            json!({ "email": "nobody@example.com" }),
            None,
        )
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = test::call_service(
        &app,
        post(
            "/auth/local/forgot-password",
            json!({ "email": "jane@example.com" }),
            None,
        )
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let token = harness.outbox.token_for("jane@example.com").await;

    let resp = test::call_service(
        &app,
        post(
            "/auth/local/reset-password",
            json!({ "userId": user_id, "token": token, "newPassword": "N3w!Password" }),
            None,
        )
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = test::call_service(
        &app,
        post(
            "/auth/local/login",
            json!({ "email": "jane@example.com", "password": "N3w!Password" }),
            None,
        )
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    // Reset tokens are single use
    let resp = test::call_service(
        &app,
        post(
            "/auth/local/reset-password",
            json!({ "userId": user_id, "token": token, "newPassword": "An0ther!Password" }),
            None,
        )
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_provider_login_round_trip() {
    let harness = harness();
    let app = identity_app!(harness);

    let resp = test::call_service(&app, get("/auth/providers", None).to_request()).await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["providers"], json!(["fake"]));

    let resp = test::call_service(&app, get("/auth/fake/login", None).to_request()).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    let redirect = location(&resp);
    assert!(redirect.starts_with("https://provider.test/authorize?"));
    let cookie = session_cookie(&resp).expect("login starts a session");
    let state = redirect
        .split("state=")
        .nth(1)
        .and_then(|rest| rest.split('&').next())
        .unwrap()
        .to_string();

    let resp = test::call_service(
        &app,
        get(
            &format!("/auth/fake/callback?code=good-code&state={}", state),
            Some(&cookie),
        )
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), ORIGIN);
    let logged_in = session_cookie(&resp).expect("callback sets the session cookie");
    assert_ne!(logged_in, cookie);

    let resp = test::call_service(&app, get("/auth/user", Some(&logged_in)).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["user"]["providers"]["fake"]["id"], "fake-42");
}

#[actix_web::test]
async fn test_provider_callback_rejects_bad_state() {
    let harness = harness();
    let app = identity_app!(harness);

    let resp = test::call_service(
        &app,
        get("/auth/fake/callback?code=good-code&state=anything", None).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = test::call_service(&app, get("/auth/fake/login", None).to_request()).await;
    let cookie = session_cookie(&resp).unwrap();

    let resp = test::call_service(
        &app,
        get("/auth/fake/callback?code=good-code&state=forged", Some(&cookie)).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Invalid OAuth state");
}

#[actix_web::test]
async fn test_provider_state_is_consumed_by_failed_callback() {
    let harness = harness();
    let app = identity_app!(harness);

    let resp = test::call_service(&app, get("/auth/fake/login", None).to_request()).await;
    let cookie = session_cookie(&resp).unwrap();
    let state = location(&resp)
        .split("state=")
        .nth(1)
        .and_then(|rest| rest.split('&').next())
        .unwrap()
        .to_string();

    let resp = test::call_service(
        &app,
        get(
            &format!("/auth/fake/callback?code=bad-code&state={}", state),
            Some(&cookie),
        )
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

    let resp = test::call_service(
        &app,
        get(
            &format!("/auth/fake/callback?code=good-code&state={}", state),
            Some(&cookie),
        )
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Invalid OAuth state");
}

#[actix_web::test]
async fn test_provider_denial_consumes_state() {
    let harness = harness();
    let app = identity_app!(harness);

    let resp = test::call_service(&app, get("/auth/fake/login", None).to_request()).await;
    let cookie = session_cookie(&resp).unwrap();

    let resp = test::call_service(
        &app,
        get("/auth/fake/callback?error=access_denied", Some(&cookie)).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

    let session = harness
        .sessions
        .load(Some(&raw_cookie_value(&cookie)))
        .await
        .unwrap()
        .expect("session survives a failed callback");
    assert!(!session.record.extra.contains_key("oauth2:fake"));
}

#[actix_web::test]
async fn test_unknown_provider() {
    let harness = harness();
    let app = identity_app!(harness);

    let resp = test::call_service(&app, get("/auth/myspace/login", None).to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_health() {
    let harness = harness();
    let app = identity_app!(harness);

    let resp = test::call_service(&app, get("/health", None).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
}
