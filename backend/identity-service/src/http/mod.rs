/// HTTP API for browser clients
///
/// Everything lives under `/auth` except the health check. Successful
/// responses are JSON objects with `"status": "ok"`; failures go through
/// [`IdentityError`](crate::error::IdentityError)'s `ResponseError` impl.
mod local;
mod oauth;
pub mod session;

use crate::db::UserRepository;
use crate::services::{AccountMailer, FederatedLoginService, LocalAuthService, ProviderRegistry};
use actix_web::{web, HttpResponse};
use serde_json::json;
use session_store::SessionManager;
use std::sync::Arc;

/// Shared HTTP server state
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub sessions: SessionManager,
    pub local: LocalAuthService,
    pub federated: FederatedLoginService,
    pub providers: ProviderRegistry,
    /// Where the browser lands after a federated login
    pub origin_url: Option<String>,
}

impl AppState {
    pub fn new(
        users: Arc<dyn UserRepository>,
        sessions: SessionManager,
        mailer: Option<AccountMailer>,
        providers: ProviderRegistry,
        origin_url: Option<String>,
    ) -> Self {
        Self {
            local: LocalAuthService::new(users.clone(), mailer),
            federated: FederatedLoginService::new(users.clone()),
            users,
            sessions,
            providers,
            origin_url,
        }
    }
}

/// Register every route
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check)).service(
        web::scope("/auth")
            .service(
                web::scope("/local")
                    .route("/register", web::post().to(local::register))
                    .route("/login", web::post().to(local::login))
                    .route("/verify", web::post().to(local::verify_email))
                    .route(
                        "/generate-verification-token",
                        web::post().to(local::generate_verification_token),
                    )
                    .route("/forgot-password", web::post().to(local::forgot_password))
                    .route("/reset-password", web::post().to(local::reset_password))
                    .route("/change-password", web::post().to(local::change_password))
                    .route("/set-username", web::post().to(local::set_username)),
            )
            .route("/user", web::get().to(local::current_user))
            .route("/logout", web::post().to(local::logout))
            .route("/providers", web::get().to(oauth::list_providers))
            .route("/{provider}/login", web::get().to(oauth::login))
            .route("/{provider}/callback", web::get().to(oauth::callback)),
    );
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}
