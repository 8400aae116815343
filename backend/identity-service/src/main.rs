/// Identity Service Main Entry Point
///
/// Starts the HTTP server with:
/// - MongoDB user repository
/// - Redis session store shared with the API gateway
/// - Email service (SMTP), when configured
/// - Federated login providers, when configured
use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use identity_service::{
    config::Settings,
    db::MongoUserRepository,
    http::{self, AppState},
    services::{AccountMailer, EmailService, ProviderRegistry},
};
use session_store::{RedisSessionStore, SessionManager};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_actix_web::TracingLogger;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "identity_service=info,info".into()),
        )
        .with_target(false)
        .json()
        .init();

    if let Err(e) = run().await {
        error!(error = format!("{:#}", e), "Identity service failed to start");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    info!("Starting identity-service");

    let settings = Settings::load().context("Failed to load configuration")?;
    settings.database.log_config();

    let database = db_pool::create_database(&settings.database)
        .await
        .context("Failed to connect to MongoDB")?;
    let providers = ProviderRegistry::from_settings(&settings.oauth);
    let users = MongoUserRepository::new(&database);
    users
        .ensure_indexes(&providers.names())
        .await
        .context("Failed to create user indexes")?;
    let users = Arc::new(users);

    let session_store = RedisSessionStore::connect(&settings.session.redis_url)
        .await
        .context("Failed to connect to session store")?;
    let sessions = SessionManager::new(Arc::new(session_store), settings.session.clone());
    info!(cookie = %sessions.cookie_name(), "Session store connected");

    let mailer = match &settings.email {
        Some(email) => {
            let service = EmailService::new(email).context("Failed to configure email service")?;
            info!(enabled = service.is_enabled(), "Email service initialized");
            Some(AccountMailer::from_settings(Arc::new(service), email))
        }
        None => {
            warn!("MAIL_FROM not set; account emails are disabled");
            None
        }
    };

    let state = web::Data::new(AppState::new(
        users,
        sessions,
        mailer,
        providers,
        settings.origin_url.clone(),
    ));

    let origin_url = settings.origin_url.clone();
    let bind_addr = settings.server.bind_addr();
    info!("Identity service listening on http://{}", bind_addr);

    HttpServer::new(move || {
        let cors = match &origin_url {
            Some(origin) => Cors::default()
                .allowed_origin(origin)
                .allow_any_method()
                .allow_any_header()
                .supports_credentials(),
            None => Cors::default(),
        };

        App::new()
            .wrap(cors)
            .wrap(TracingLogger::default())
            .app_data(state.clone())
            .configure(http::configure)
    })
    .bind(&bind_addr)
    .with_context(|| format!("Failed to bind {}", bind_addr))?
    .run()
    .await
    .context("HTTP server error")
}
