// Charging service - Serializes battery events through the session tracker
use crate::application::insight::{InsightService, InsightState};
use crate::application::session_repository::SessionRepository;
use crate::application::session_tracker::{
    BatteryEvent, SessionTracker, TrackerError, TrackerUpdate,
};
use crate::domain::session::Session;
use crate::domain::telemetry::{ElectricalMetrics, TelemetrySample};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Partial battery signal; absent fields keep their last known value.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatterySignal {
    pub charging: Option<bool>,
    pub level: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    #[serde(flatten)]
    pub metrics: ElectricalMetrics,
    pub charging: bool,
    pub supported: bool,
    pub level: Option<f64>,
}

#[derive(Clone)]
pub struct ChargingService {
    tracker: Arc<Mutex<SessionTracker>>,
    repository: Arc<dyn SessionRepository>,
    insights: InsightService,
}

impl ChargingService {
    pub fn new(
        tracker: SessionTracker,
        repository: Arc<dyn SessionRepository>,
        insights: InsightService,
    ) -> Self {
        Self {
            tracker: Arc::new(Mutex::new(tracker)),
            repository,
            insights,
        }
    }

    /// Reload persisted sessions. Missing or unreadable history starts empty.
    pub async fn restore(&self) {
        let sessions = match self.repository.load().await {
            Ok(sessions) => sessions,
            Err(e) => {
                tracing::warn!(error = %e, "could not load session history, starting empty");
                Vec::new()
            }
        };
        tracing::info!(count = sessions.len(), "session history restored");
        self.tracker.lock().await.restore_history(sessions);
    }

    pub async fn handle_signal(
        &self,
        signal: BatterySignal,
        now: DateTime<Utc>,
    ) -> Result<TrackerUpdate, TrackerError> {
        let mut tracker = self.tracker.lock().await;
        let level = match signal.level.or_else(|| tracker.last_level()) {
            Some(level) => level,
            None if !tracker.is_supported() => return Err(TrackerError::Unsupported),
            None => return Err(TrackerError::LevelUnknown),
        };
        let event = BatteryEvent {
            charging: signal.charging.unwrap_or_else(|| tracker.is_charging()),
            level,
        };
        self.apply_locked(&mut tracker, event, now).await
    }

    pub async fn handle_event(
        &self,
        event: BatteryEvent,
        now: DateTime<Utc>,
    ) -> Result<TrackerUpdate, TrackerError> {
        let mut tracker = self.tracker.lock().await;
        self.apply_locked(&mut tracker, event, now).await
    }

    // The tracker lock is held for the whole step, persistence included, so
    // saved histories are written in transition order.
    async fn apply_locked(
        &self,
        tracker: &mut SessionTracker,
        event: BatteryEvent,
        now: DateTime<Utc>,
    ) -> Result<TrackerUpdate, TrackerError> {
        let update = tracker.apply_battery_event(event, now)?;

        if let Some(closed) = &update.session_closed {
            self.session_closed(tracker, closed).await;
        }

        Ok(update)
    }

    async fn session_closed(&self, tracker: &SessionTracker, closed: &Session) {
        if let Err(e) = self.repository.save(tracker.session_history()).await {
            tracing::error!(error = %e, "failed to persist session history");
        }
        let telemetry = tracker.telemetry();
        self.insights.request(closed, &telemetry).await;
    }

    /// Stop estimation for good. An open session is closed and persisted first.
    pub async fn mark_unsupported(&self, now: DateTime<Utc>) -> Option<Session> {
        let mut tracker = self.tracker.lock().await;
        let closed = tracker.mark_unsupported(now);
        if let Some(session) = &closed {
            self.session_closed(&tracker, session).await;
        }
        closed
    }

    pub async fn metrics(&self) -> MetricsSnapshot {
        let tracker = self.tracker.lock().await;
        MetricsSnapshot {
            metrics: tracker.metrics(),
            charging: tracker.is_charging(),
            supported: tracker.is_supported(),
            level: tracker.last_level(),
        }
    }

    pub async fn telemetry(&self) -> Vec<TelemetrySample> {
        self.tracker.lock().await.telemetry()
    }

    pub async fn current_session(&self) -> Option<Session> {
        self.tracker.lock().await.current_session().cloned()
    }

    pub async fn session_history(&self) -> Vec<Session> {
        self.tracker.lock().await.session_history().to_vec()
    }

    pub async fn insight(&self) -> InsightState {
        self.insights.state().await
    }
}
