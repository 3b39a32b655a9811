use axum::{extract::DefaultBodyLimit, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod auth;
pub mod batch;
pub mod config;
pub mod db;
pub mod error;
pub mod listing;
pub mod memory;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;
pub mod validation;

pub use state::AppState;

/// Full HTTP application: health probe, API routes and the shared middleware stack.
pub fn app(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(routes::router(state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
                .layer(DefaultBodyLimit::max(max_body_bytes)),
        )
}
