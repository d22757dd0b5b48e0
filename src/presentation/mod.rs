// Presentation layer - HTTP surface
pub mod app_state;
pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    battery_unavailable, current_session, get_insight, get_metrics, get_telemetry, health_check,
    ingest_battery, list_sessions,
};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/battery", post(ingest_battery))
        .route("/battery/unavailable", post(battery_unavailable))
        .route("/metrics", get(get_metrics))
        .route("/telemetry", get(get_telemetry))
        .route("/sessions", get(list_sessions))
        .route("/sessions/current", get(current_session))
        .route("/insight", get(get_insight))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
