// HTTP request handlers
use crate::application::charging_service::{BatterySignal, MetricsSnapshot};
use crate::application::insight::InsightState;
use crate::application::session_tracker::{TrackerError, TrackerUpdate};
use crate::domain::session::Session;
use crate::domain::telemetry::TelemetrySample;
use crate::presentation::app_state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct BatteryBody {
    pub charging: Option<bool>,
    pub level: Option<f64>,
}

impl IntoResponse for TrackerError {
    fn into_response(self) -> Response {
        let status = match self {
            TrackerError::InvalidLevel(_) | TrackerError::LevelUnknown => StatusCode::BAD_REQUEST,
            TrackerError::Unsupported => StatusCode::CONFLICT,
        };
        (status, self.to_string()).into_response()
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Ingest a battery status change
pub async fn ingest_battery(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BatteryBody>,
) -> Result<Json<TrackerUpdate>, TrackerError> {
    let signal = BatterySignal {
        charging: body.charging,
        level: body.level,
    };

    match state.charging_service.handle_signal(signal, Utc::now()).await {
        Ok(update) => Ok(Json(update)),
        Err(e) => {
            tracing::warn!(error = %e, "battery event rejected");
            Err(e)
        }
    }
}

/// The battery status source reported it cannot run on this platform
pub async fn battery_unavailable(State(state): State<Arc<AppState>>) -> StatusCode {
    state.charging_service.mark_unsupported(Utc::now()).await;
    StatusCode::NO_CONTENT
}

pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.charging_service.metrics().await)
}

pub async fn get_telemetry(State(state): State<Arc<AppState>>) -> Json<Vec<TelemetrySample>> {
    Json(state.charging_service.telemetry().await)
}

pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<Vec<Session>> {
    Json(state.charging_service.session_history().await)
}

pub async fn current_session(State(state): State<Arc<AppState>>) -> Json<Option<Session>> {
    Json(state.charging_service.current_session().await)
}

pub async fn get_insight(State(state): State<Arc<AppState>>) -> Json<InsightState> {
    Json(state.charging_service.insight().await)
}
