use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use tracing::{error, info};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::prelude::*;

use graphql_gateway::config::Config;
use graphql_gateway::routes;
use graphql_gateway::schema::build_schema;
use graphql_gateway::store::MongoContentStore;
use session_store::{RedisSessionStore, SessionManager};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,graphql_gateway=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_line_number(true)
                .with_target(true),
        )
        .init();

    if let Err(e) = run().await {
        error!(error = format!("{:#}", e), "GraphQL Gateway failed to start");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    info!("Starting GraphQL Gateway...");

    let config = Config::from_env()?;
    config.database.log_config();

    let database = db_pool::create_database(&config.database)
        .await
        .context("Failed to connect to MongoDB")?;
    let store = Arc::new(MongoContentStore::new(&database));
    info!("Document store connected");

    let session_store = RedisSessionStore::connect(&config.session.redis_url)
        .await
        .context("Failed to connect to session store")?;
    let sessions = SessionManager::new(Arc::new(session_store), config.session.clone());
    info!(cookie = %sessions.cookie_name(), "Session store connected");

    let schema = build_schema(store);
    let graphql = config.graphql.clone();
    let cors_origin = config.cors_origin.clone();
    let bind_addr = config.server.bind_addr();

    info!("GraphQL Gateway starting on http://{}{}", bind_addr, routes::GRAPHQL_PATH);

    HttpServer::new(move || {
        let cors = match &cors_origin {
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
            .app_data(web::Data::new(schema.clone()))
            .app_data(web::Data::new(graphql.clone()))
            .configure(routes::configure(sessions.clone()))
    })
    .bind(&bind_addr)
    .with_context(|| format!("Failed to bind {}", bind_addr))?
    .run()
    .await
    .context("HTTP server error")
}
