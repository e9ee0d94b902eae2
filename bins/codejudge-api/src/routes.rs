use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::handlers;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/problems", get(handlers::get_problems))
        .route("/problems/:id", get(handlers::get_problem))
        .route("/submit", post(handlers::submit))
        .route("/status", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        .layer(CorsLayer::permissive())
}
