//! HTTP routes
//!
//! `/api` carries GraphQL over POST and GET and is the only path that reads
//! the session. GET runs queries only. Operational endpoints stay available while the session store
//! is down.

use actix_web::{web, Either, FromRequest, HttpMessage, HttpRequest, HttpResponse};
use actix_web::http::header;
use async_graphql::http::{playground_source, GraphQLPlaygroundConfig};
use async_graphql::parser::parse_query;
use async_graphql::parser::types::{DocumentOperations, OperationType};
use async_graphql_actix_web::{GraphQLRequest, GraphQLResponse};
use serde_json::json;
use session_store::SessionManager;

use crate::config::GraphQLConfig;
use crate::context::RequestContext;
use crate::metrics;
use crate::middleware::SessionAuth;
use crate::schema::AppSchema;

pub const GRAPHQL_PATH: &str = "/api";

/// Register every route; the session middleware wraps the GraphQL endpoint
pub fn configure(sessions: SessionManager) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.service(
            web::resource(GRAPHQL_PATH)
                .wrap(SessionAuth::new(sessions))
                .route(web::post().to(graphql_handler))
                .route(web::get().to(graphql_get_handler)),
        )
        .route("/health", web::get().to(health_handler))
        .route("/schema", web::get().to(schema_handler))
        .route("/metrics", web::get().to(metrics::metrics_handler));
    }
}

async fn execute(schema: &AppSchema, http: &HttpRequest, req: GraphQLRequest) -> GraphQLResponse {
    let context = http
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_default();

    let response = schema.execute(req.into_inner().data(context)).await;
    metrics::record_graphql_request(response.is_err());
    response.into()
}

async fn graphql_handler(
    schema: web::Data<AppSchema>,
    http: HttpRequest,
    req: GraphQLRequest,
) -> GraphQLResponse {
    execute(&schema, &http, req).await
}

async fn graphql_get_handler(
    schema: web::Data<AppSchema>,
    settings: web::Data<GraphQLConfig>,
    http: HttpRequest,
) -> actix_web::Result<Either<HttpResponse, GraphQLResponse>> {
    if settings.playground && http.query_string().is_empty() && accepts_html(&http) {
        return Ok(Either::Left(playground_handler()));
    }

    let req = GraphQLRequest::extract(&http).await?;
    if let Some(ty) = selected_operation_type(&req.0) {
        if ty != OperationType::Query {
            return Ok(Either::Left(
                HttpResponse::MethodNotAllowed()
                    .insert_header((header::ALLOW, "POST"))
                    .json(json!({
                        "errors": [{ "message": "GET supports only query operations" }]
                    })),
            ));
        }
    }
    Ok(Either::Right(execute(&schema, &http, req).await))
}

/// Type of the operation a request would run
///
/// `None` when the document does not parse or names no single operation;
/// execution then reports the problem itself.
fn selected_operation_type(req: &async_graphql::Request) -> Option<OperationType> {
    let document = parse_query(&req.query).ok()?;
    match document.operations {
        DocumentOperations::Single(operation) => Some(operation.node.ty),
        DocumentOperations::Multiple(operations) => match req.operation_name.as_deref() {
            Some(name) => operations.get(name).map(|operation| operation.node.ty),
            None if operations.len() == 1 => {
                operations.values().next().map(|operation| operation.node.ty)
            }
            None => None,
        },
    }
}

fn accepts_html(http: &HttpRequest) -> bool {
    http.headers()
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/html"))
        .unwrap_or(false)
}

fn playground_handler() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(playground_source(
            GraphQLPlaygroundConfig::new(GRAPHQL_PATH).with_setting("editor.cursorShape", "line"),
        ))
}

async fn health_handler() -> &'static str {
    "ok"
}

/// SDL endpoint for schema introspection
async fn schema_handler(schema: web::Data<AppSchema>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain")
        .body(schema.sdl())
}
