use serde::Deserialize;

use crate::application::insight::DEFAULT_INSIGHT_POINTS;
use crate::application::session_tracker::{TrackerSettings, DEFAULT_CAPACITY_WH};
use crate::domain::session::DEFAULT_SESSION_CAPACITY;
use crate::domain::telemetry::DEFAULT_TELEMETRY_CAPACITY;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub battery: BatterySettings,
    pub tracker: TrackerLimits,
    pub insight: InsightSettings,
    pub storage: StorageSettings,
    pub server: ServerSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BatterySettings {
    pub capacity_wh: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrackerLimits {
    pub telemetry_capacity: usize,
    pub session_capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InsightSettings {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    pub history_points: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    pub sessions_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub bind: String,
}

impl AppConfig {
    pub fn tracker_settings(&self) -> TrackerSettings {
        TrackerSettings {
            capacity_wh: self.battery.capacity_wh,
            telemetry_capacity: self.tracker.telemetry_capacity,
            session_capacity: self.tracker.session_capacity,
        }
    }
}

fn with_defaults(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> anyhow::Result<config::ConfigBuilder<config::builder::DefaultState>> {
    Ok(builder
        .set_default("battery.capacity_wh", DEFAULT_CAPACITY_WH)?
        .set_default("tracker.telemetry_capacity", DEFAULT_TELEMETRY_CAPACITY as u64)?
        .set_default("tracker.session_capacity", DEFAULT_SESSION_CAPACITY as u64)?
        .set_default("insight.history_points", DEFAULT_INSIGHT_POINTS as u64)?
        .set_default("insight.timeout_secs", 30_u64)?
        .set_default("storage.sessions_path", "data/sessions.json")?
        .set_default("server.bind", "0.0.0.0:8080")?)
}

const CONFIG_FILE: &str = "config/charging";

fn environment() -> config::Environment {
    config::Environment::with_prefix("CHARGE")
        .separator("__")
        .try_parsing(true)
}

/// Defaults, then `config/charging.*`, then `CHARGE__SECTION__KEY` variables.
pub fn load_app_config() -> anyhow::Result<AppConfig> {
    load_from(CONFIG_FILE, environment())
}

fn load_from(file_name: &str, env: config::Environment) -> anyhow::Result<AppConfig> {
    let settings = with_defaults(config::Config::builder())?
        .add_source(config::File::with_name(file_name).required(false))
        .add_source(env)
        .build()?;

    let app_config: AppConfig = settings.try_deserialize()?;
    let capacity = app_config.battery.capacity_wh;
    if !capacity.is_finite() || capacity <= 0.0 {
        anyhow::bail!("battery.capacity_wh must be positive and finite, got {}", capacity);
    }
    Ok(app_config)
}
