//! Devgad Hapus Storefront library.
//!
//! This crate provides the storefront service as a library so the binary,
//! the CLI and the integration tests all build the same application.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Router, middleware::from_fn, routing::get};
use tower_http::trace::TraceLayer;

use state::AppState;
use store::StoreError;

/// Build the full application router around `state`.
pub fn app(state: AppState) -> Router {
    let session_layer = middleware::create_session_layer(state.config());

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::routes(state.config()))
        .layer(session_layer)
        .layer(from_fn(middleware::security_headers_middleware))
        .layer(from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Reads a single key from the document store. A permission error still
/// proves the store is reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.store().get("health").await {
        Ok(_) | Err(StoreError::PermissionDenied(_)) => StatusCode::OK,
        Err(err) => {
            tracing::warn!(error = %err, "document store not reachable");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
