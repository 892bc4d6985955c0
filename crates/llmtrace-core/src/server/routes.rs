//! API routes

use axum::{
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{self, AppState};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/health", get(handlers::health))
        // Trace ingestion (SDK wire contract)
        .route("/api/v1/ingest/trace", post(handlers::ingest_trace))
        .route("/api/v1/ingest/trace/:trace_id", patch(handlers::update_trace))
        .route("/api/v1/ingest/batch", post(handlers::ingest_batch))
        // Trace queries
        .route("/api/v1/traces", get(handlers::list_traces))
        .route("/api/v1/traces/:trace_id", get(handlers::get_trace))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
