// Main entry point - Dependency injection and server setup
use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;

use charge_telemetry::application::charging_service::ChargingService;
use charge_telemetry::application::insight::{InsightGenerator, InsightService};
use charge_telemetry::application::session_tracker::SessionTracker;
use charge_telemetry::domain::estimator::RandomJitter;
use charge_telemetry::infrastructure::config::load_app_config;
use charge_telemetry::infrastructure::http_insight_client::{
    DisabledInsightGenerator, HttpInsightClient,
};
use charge_telemetry::infrastructure::json_session_store::JsonSessionStore;
use charge_telemetry::presentation::app_state::AppState;
use charge_telemetry::presentation::router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Load configuration
    let app_config = load_app_config()?;

    // Collaborators (infrastructure layer)
    let repository = Arc::new(JsonSessionStore::new(&app_config.storage.sessions_path));
    let generator: Arc<dyn InsightGenerator> = match &app_config.insight.endpoint {
        Some(endpoint) => Arc::new(HttpInsightClient::new(
            endpoint.clone(),
            app_config.insight.api_key.clone(),
            Duration::from_secs(app_config.insight.timeout_secs),
        )?),
        None => {
            tracing::warn!("no insight endpoint configured; insights will use fallback text");
            Arc::new(DisabledInsightGenerator)
        }
    };

    // Services (application layer)
    let tracker = SessionTracker::new(app_config.tracker_settings(), Box::new(RandomJitter::new()));
    let insights = InsightService::new(generator, app_config.insight.history_points);
    let charging_service = ChargingService::new(tracker, repository, insights);
    charging_service.restore().await;

    let state = Arc::new(AppState { charging_service });

    // Start server
    let addr: SocketAddr = app_config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid server.bind {}", app_config.server.bind))?;
    tracing::info!(
        %addr,
        capacity_wh = app_config.battery.capacity_wh,
        "starting charge-telemetry service"
    );

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router(state)).await?;

    Ok(())
}
