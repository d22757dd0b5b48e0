// Insight service - Fire-and-forget advisory text for closed sessions
use async_trait::async_trait;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::domain::session::Session;
use crate::domain::telemetry::TelemetrySample;

pub const INSIGHT_FALLBACK: &str = "Unable to generate insights at this time.";
pub const DEFAULT_INSIGHT_POINTS: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightPoint {
    pub time: String,
    pub level: f64,
    pub wattage: f64,
    pub voltage: f64,
    pub amperage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightRequest {
    pub points: Vec<InsightPoint>,
    pub avg_wattage: f64,
    pub max_wattage: f64,
}

impl InsightRequest {
    /// Build a request from a closed session and the newest `max_points` samples.
    pub fn from_session(
        session: &Session,
        telemetry: &[TelemetrySample],
        max_points: usize,
    ) -> Self {
        let skip = telemetry.len().saturating_sub(max_points);
        let points = telemetry
            .iter()
            .skip(skip)
            .map(|s| InsightPoint {
                time: s.timestamp.with_timezone(&Local).format("%H:%M:%S").to_string(),
                level: s.level_percent,
                wattage: s.wattage,
                voltage: s.voltage,
                amperage: s.amperage,
            })
            .collect();

        Self {
            points,
            avg_wattage: session.avg_wattage,
            max_wattage: session.max_wattage,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InsightState {
    pub text: Option<String>,
    pub loading: bool,
}

#[async_trait]
pub trait InsightGenerator: Send + Sync {
    /// Produce a short advisory text for a finished charging session
    async fn generate(&self, request: &InsightRequest) -> anyhow::Result<String>;
}

#[derive(Clone)]
pub struct InsightService {
    generator: Arc<dyn InsightGenerator>,
    state: Arc<RwLock<InsightState>>,
    generation: Arc<AtomicU64>,
    max_points: usize,
}

impl InsightService {
    pub fn new(generator: Arc<dyn InsightGenerator>, max_points: usize) -> Self {
        Self {
            generator,
            state: Arc::new(RwLock::new(InsightState::default())),
            generation: Arc::new(AtomicU64::new(0)),
            max_points,
        }
    }

    /// Start generating an insight without waiting for it. Failures surface as
    /// the fallback text; nothing is retried.
    pub async fn request(
        &self,
        session: &Session,
        telemetry: &[TelemetrySample],
    ) -> JoinHandle<()> {
        let request = InsightRequest::from_session(session, telemetry, self.max_points);
        let ticket = {
            let mut guard = self.state.write().await;
            guard.loading = true;
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        let generator = self.generator.clone();
        let state = self.state.clone();
        let generation = self.generation.clone();

        tokio::spawn(async move {
            let text = match generator.generate(&request).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(error = %e, "insight generation failed");
                    INSIGHT_FALLBACK.to_string()
                }
            };

            // tickets are issued under the same lock, so this check cannot race
            let mut guard = state.write().await;
            if generation.load(Ordering::SeqCst) != ticket {
                tracing::debug!(ticket, "discarding stale insight");
                return;
            }
            guard.text = Some(text);
            guard.loading = false;
        })
    }

    pub async fn state(&self) -> InsightState {
        self.state.read().await.clone()
    }
}
