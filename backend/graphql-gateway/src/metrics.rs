//! Prometheus metrics for the gateway

use actix_web::HttpResponse;
use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounterVec, TextEncoder};

lazy_static! {
    pub static ref GRAPHQL_REQUESTS_TOTAL: IntCounterVec = prometheus::register_int_counter_vec!(
        "graphql_requests_total",
        "GraphQL requests executed, by outcome",
        &["outcome"]
    )
    .expect("graphql_requests_total registers once");

    pub static ref SESSION_RESOLUTIONS_TOTAL: IntCounterVec = prometheus::register_int_counter_vec!(
        "session_resolutions_total",
        "Request identity resolutions, by outcome",
        &["outcome"]
    )
    .expect("session_resolutions_total registers once");

    pub static ref STORE_OPERATIONS_TOTAL: IntCounterVec = prometheus::register_int_counter_vec!(
        "store_operations_total",
        "Document store operations",
        &["collection", "operation"]
    )
    .expect("store_operations_total registers once");

    pub static ref STORE_ERRORS_TOTAL: IntCounterVec = prometheus::register_int_counter_vec!(
        "store_errors_total",
        "Failed document store operations",
        &["collection", "operation"]
    )
    .expect("store_errors_total registers once");
}

pub fn record_graphql_request(has_errors: bool) {
    let outcome = if has_errors { "error" } else { "ok" };
    GRAPHQL_REQUESTS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_session_resolution(outcome: &str) {
    SESSION_RESOLUTIONS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Text exposition of the default registry
pub async fn metrics_handler() -> HttpResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}
