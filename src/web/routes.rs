//! Web API router construction.

use axum::Router;
use axum::http::{Method, header::CONTENT_TYPE};
use axum::routing::get;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::web::{records, status, stream};

/// Creates the web server router
pub fn create_router(app_state: AppState) -> Router {
    let api_router = Router::new()
        .route("/health", get(status::health))
        .route("/status", get(status::status))
        .route("/records/recent", get(records::recent_records))
        .route("/ws", get(stream::stream_ws))
        .with_state(app_state);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new().nest("/api", api_router).layer((
        TraceLayer::new_for_http(),
        cors,
        TimeoutLayer::new(Duration::from_secs(30)),
    ))
}
