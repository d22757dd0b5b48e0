// Session tracker - Charging state machine driven by battery events
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::estimator::{
    elapsed_hours, estimate_electrical_properties, estimate_wattage, VoltageJitter,
};
use crate::domain::session::{Session, SessionHistory, DEFAULT_SESSION_CAPACITY};
use crate::domain::telemetry::{
    ChargeStatus, ElectricalMetrics, TelemetryHistory, TelemetrySample, DEFAULT_TELEMETRY_CAPACITY,
};

pub const DEFAULT_CAPACITY_WH: f64 = 19.25;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrackerError {
    #[error("battery level {0} is outside [0, 1]")]
    InvalidLevel(f64),

    #[error("battery status source is unsupported")]
    Unsupported,

    #[error("no battery level has been reported yet")]
    LevelUnknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryEvent {
    pub charging: bool,
    pub level: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct TrackerSettings {
    pub capacity_wh: f64,
    pub telemetry_capacity: usize,
    pub session_capacity: usize,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            capacity_wh: DEFAULT_CAPACITY_WH,
            telemetry_capacity: DEFAULT_TELEMETRY_CAPACITY,
            session_capacity: DEFAULT_SESSION_CAPACITY,
        }
    }
}

/// Effects of one battery event, for the caller to propagate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerUpdate {
    pub metrics: ElectricalMetrics,
    pub new_sample: Option<TelemetrySample>,
    pub session_opened: bool,
    pub session_closed: Option<Session>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct LevelPoint {
    time: DateTime<Utc>,
    level: f64,
}

#[derive(Debug)]
enum TrackerState {
    Idle,
    Charging {
        session: Session,
        last_point: Option<LevelPoint>,
    },
    Unsupported,
}

pub struct SessionTracker {
    settings: TrackerSettings,
    jitter: Box<dyn VoltageJitter>,
    state: TrackerState,
    last_level: Option<f64>,
    metrics: ElectricalMetrics,
    telemetry: TelemetryHistory,
    history: SessionHistory,
}

impl SessionTracker {
    pub fn new(settings: TrackerSettings, jitter: Box<dyn VoltageJitter>) -> Self {
        Self {
            telemetry: TelemetryHistory::new(settings.telemetry_capacity),
            history: SessionHistory::new(settings.session_capacity),
            settings,
            jitter,
            state: TrackerState::Idle,
            last_level: None,
            metrics: ElectricalMetrics::default(),
        }
    }

    /// Apply one serialized battery snapshot.
    ///
    /// Charging-flag edges are handled first; otherwise a level change while
    /// charging produces at most one telemetry sample.
    pub fn apply_battery_event(
        &mut self,
        event: BatteryEvent,
        now: DateTime<Utc>,
    ) -> Result<TrackerUpdate, TrackerError> {
        if matches!(self.state, TrackerState::Unsupported) {
            return Err(TrackerError::Unsupported);
        }
        if !event.level.is_finite() || !(0.0..=1.0).contains(&event.level) {
            return Err(TrackerError::InvalidLevel(event.level));
        }

        let mut update = TrackerUpdate {
            metrics: self.metrics,
            new_sample: None,
            session_opened: false,
            session_closed: None,
        };
        let level_changed = self.last_level != Some(event.level);
        self.last_level = Some(event.level);

        let state = std::mem::replace(&mut self.state, TrackerState::Idle);
        self.state = match (state, event.charging) {
            (TrackerState::Idle, false) => TrackerState::Idle,
            (TrackerState::Idle, true) => {
                tracing::info!(level = event.level, "charging session opened");
                update.session_opened = true;
                TrackerState::Charging {
                    session: Session::open(now, event.level),
                    last_point: None,
                }
            }
            (
                TrackerState::Charging {
                    mut session,
                    mut last_point,
                },
                true,
            ) => {
                if level_changed {
                    let point = LevelPoint {
                        time: now,
                        level: event.level,
                    };
                    if let Some(prev) = last_point {
                        update.new_sample = self.record_sample(&mut session, prev, point);
                    }
                    last_point = Some(point);
                }
                TrackerState::Charging {
                    session,
                    last_point,
                }
            }
            (TrackerState::Charging { mut session, .. }, false) => {
                session.close(now, event.level);
                tracing::info!(
                    start_level = session.start_level,
                    end_level = event.level,
                    avg_wattage = session.avg_wattage,
                    max_wattage = session.max_wattage,
                    "charging session closed"
                );
                self.history.push_front(session.clone());
                self.metrics = ElectricalMetrics::default();
                update.session_closed = Some(session);
                TrackerState::Idle
            }
            (TrackerState::Unsupported, _) => TrackerState::Unsupported,
        };

        update.metrics = self.metrics;
        Ok(update)
    }

    pub fn apply_charging_changed(
        &mut self,
        charging: bool,
        now: DateTime<Utc>,
    ) -> Result<TrackerUpdate, TrackerError> {
        if !self.is_supported() {
            return Err(TrackerError::Unsupported);
        }
        let level = self.last_level.ok_or(TrackerError::LevelUnknown)?;
        self.apply_battery_event(BatteryEvent { charging, level }, now)
    }

    pub fn apply_level_changed(
        &mut self,
        level: f64,
        now: DateTime<Utc>,
    ) -> Result<TrackerUpdate, TrackerError> {
        let charging = self.is_charging();
        self.apply_battery_event(BatteryEvent { charging, level }, now)
    }

    /// Terminal: the battery status source cannot be read on this platform.
    ///
    /// A session still open is closed at `now` with the last known level and
    /// returned, so it lands in the history like any other closed session.
    pub fn mark_unsupported(&mut self, now: DateTime<Utc>) -> Option<Session> {
        let state = std::mem::replace(&mut self.state, TrackerState::Unsupported);
        self.metrics = ElectricalMetrics::default();

        match state {
            TrackerState::Unsupported => None,
            TrackerState::Idle => {
                tracing::warn!("battery status source unavailable; estimation disabled");
                None
            }
            TrackerState::Charging { mut session, .. } => {
                let end_level = self.last_level.unwrap_or(session.start_level);
                session.close(now, end_level);
                tracing::warn!(
                    end_level,
                    "battery status source unavailable; open session closed"
                );
                self.history.push_front(session.clone());
                Some(session)
            }
        }
    }

    /// Replace the completed-session list wholesale.
    pub fn restore_history(&mut self, sessions: Vec<Session>) {
        self.history.replace(sessions);
    }

    fn record_sample(
        &mut self,
        session: &mut Session,
        prev: LevelPoint,
        curr: LevelPoint,
    ) -> Option<TelemetrySample> {
        let watts = estimate_wattage(
            prev.level,
            prev.time,
            curr.level,
            curr.time,
            self.settings.capacity_wh,
        )?;
        let metrics = estimate_electrical_properties(watts, self.jitter.as_mut());
        session.fold_sample(&metrics, elapsed_hours(prev.time, curr.time));
        self.metrics = metrics;

        let sample = TelemetrySample::new(curr.time, curr.level, metrics, ChargeStatus::Charging);
        self.telemetry.push(sample.clone());
        tracing::debug!(
            watts = metrics.watts,
            volts = metrics.volts,
            amps = metrics.amps,
            level = curr.level,
            "telemetry sample recorded"
        );
        Some(sample)
    }

    pub fn metrics(&self) -> ElectricalMetrics {
        self.metrics
    }

    pub fn telemetry(&self) -> Vec<TelemetrySample> {
        self.telemetry.to_vec()
    }

    /// The open session, or the most recently closed one.
    pub fn current_session(&self) -> Option<&Session> {
        match &self.state {
            TrackerState::Charging { session, .. } => Some(session),
            _ => self.history.latest(),
        }
    }

    pub fn session_history(&self) -> &[Session] {
        self.history.as_slice()
    }

    pub fn is_charging(&self) -> bool {
        matches!(self.state, TrackerState::Charging { .. })
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self.state, TrackerState::Unsupported)
    }

    pub fn last_level(&self) -> Option<f64> {
        self.last_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::estimator::{FixedJitter, RandomJitter};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 2, 22, 0, 0).unwrap()
    }

    fn tracker() -> SessionTracker {
        SessionTracker::new(TrackerSettings::default(), Box::new(FixedJitter(0.0)))
    }

    fn event(charging: bool, level: f64) -> BatteryEvent {
        BatteryEvent { charging, level }
    }

    #[test]
    fn test_end_to_end_session() {
        let mut tracker = tracker();
        let opened = tracker.apply_battery_event(event(true, 0.40), t0()).unwrap();
        assert!(opened.session_opened);
        assert!(tracker.is_charging());

        let first = tracker
            .apply_battery_event(event(true, 0.41), t0() + Duration::minutes(2))
            .unwrap();
        assert!(first.new_sample.is_none());

        let second = tracker
            .apply_battery_event(event(true, 0.42), t0() + Duration::minutes(5))
            .unwrap();
        assert!(second.new_sample.is_some());
        assert!(second.metrics.watts > 0.0);

        let closed = tracker
            .apply_battery_event(event(false, 0.42), t0() + Duration::minutes(6))
            .unwrap();
        let session = closed.session_closed.unwrap();
        assert_eq!(session.start_level, 0.40);
        assert_eq!(session.end_level, Some(0.42));
        assert_eq!(session.end_time, Some(t0() + Duration::minutes(6)));
        assert!(session.max_wattage > 0.0);
        assert_eq!(tracker.session_history()[0], session);
        assert_eq!(closed.metrics, ElectricalMetrics::default());
        assert!(!tracker.is_charging());
    }

    #[test]
    fn test_duplicate_level_is_noop() {
        let mut tracker = tracker();
        tracker.apply_battery_event(event(true, 0.50), t0()).unwrap();
        tracker
            .apply_battery_event(event(true, 0.51), t0() + Duration::minutes(1))
            .unwrap();
        tracker
            .apply_battery_event(event(true, 0.52), t0() + Duration::minutes(2))
            .unwrap();
        let before = tracker.current_session().cloned().unwrap();

        let dup = tracker
            .apply_battery_event(event(true, 0.52), t0() + Duration::minutes(3))
            .unwrap();
        assert!(dup.new_sample.is_none());
        assert_eq!(tracker.telemetry().len(), 1);
        assert_eq!(tracker.current_session().unwrap(), &before);
    }

    #[test]
    fn test_average_recurrence_through_tracker() {
        let mut tracker = tracker();
        tracker.apply_battery_event(event(true, 0.50), t0()).unwrap();
        tracker
            .apply_battery_event(event(true, 0.51), t0() + Duration::minutes(1))
            .unwrap();
        let w1 = tracker
            .apply_battery_event(event(true, 0.52), t0() + Duration::minutes(2))
            .unwrap()
            .metrics
            .watts;
        assert_eq!(tracker.current_session().unwrap().avg_wattage, w1);

        let w2 = tracker
            .apply_battery_event(event(true, 0.53), t0() + Duration::minutes(4))
            .unwrap()
            .metrics
            .watts;
        assert_eq!(tracker.current_session().unwrap().avg_wattage, (w1 + w2) / 2.0);
    }

    #[test]
    fn test_telemetry_capped_at_fifty() {
        let mut tracker = SessionTracker::new(
            TrackerSettings::default(),
            Box::new(RandomJitter::seeded(3)),
        );
        tracker.apply_battery_event(event(true, 0.0), t0()).unwrap();
        // one baseline point, then 60 accepted samples
        for i in 1..=61 {
            tracker
                .apply_battery_event(event(true, i as f64 / 100.0), t0() + Duration::minutes(i))
                .unwrap();
        }

        let telemetry = tracker.telemetry();
        assert_eq!(telemetry.len(), 50);
        assert_eq!(telemetry.last().unwrap().timestamp, t0() + Duration::minutes(61));
        assert_eq!(telemetry.first().unwrap().timestamp, t0() + Duration::minutes(12));
        assert!(telemetry.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn test_session_history_capped_at_five() {
        let mut tracker = tracker();
        for i in 0..7 {
            let start = t0() + Duration::hours(i);
            tracker.apply_battery_event(event(true, 0.1), start).unwrap();
            tracker
                .apply_battery_event(event(false, 0.2), start + Duration::minutes(30))
                .unwrap();
        }

        let history = tracker.session_history();
        assert_eq!(history.len(), 5);
        assert_eq!(history[0].start_time, t0() + Duration::hours(6));
        assert_eq!(history[4].start_time, t0() + Duration::hours(2));
    }

    #[test]
    fn test_at_most_one_open_session() {
        let mut tracker = tracker();
        let sequence = [
            (true, 0.1),
            (true, 0.1),
            (true, 0.2),
            (false, 0.2),
            (false, 0.3),
            (true, 0.3),
            (false, 0.3),
        ];
        let mut opened = 0;
        let mut closed = 0;
        for (i, (charging, level)) in sequence.into_iter().enumerate() {
            let update = tracker
                .apply_battery_event(event(charging, level), t0() + Duration::minutes(i as i64))
                .unwrap();
            opened += update.session_opened as usize;
            closed += update.session_closed.is_some() as usize;
            assert!(opened - closed <= 1);
        }
        assert_eq!(opened, 2);
        assert_eq!(closed, 2);
    }

    #[test]
    fn test_same_timestamp_skips_sample_but_moves_baseline() {
        let mut tracker = tracker();
        tracker.apply_battery_event(event(true, 0.5), t0()).unwrap();
        tracker
            .apply_battery_event(event(true, 0.51), t0() + Duration::minutes(1))
            .unwrap();
        let update = tracker
            .apply_battery_event(event(true, 0.52), t0() + Duration::minutes(1))
            .unwrap();
        assert!(update.new_sample.is_none());
        assert_eq!(tracker.current_session().unwrap().max_wattage, 0.0);
    }

    #[test]
    fn test_invalid_level_rejected() {
        let mut tracker = tracker();
        assert_eq!(
            tracker.apply_battery_event(event(true, 1.5), t0()),
            Err(TrackerError::InvalidLevel(1.5))
        );
        assert!(tracker.apply_battery_event(event(true, f64::NAN), t0()).is_err());
        assert!(!tracker.is_charging());
        assert_eq!(tracker.last_level(), None);
    }

    #[test]
    fn test_unsupported_is_terminal() {
        let mut tracker = tracker();
        assert!(tracker.mark_unsupported(t0()).is_none());
        assert!(!tracker.is_supported());
        assert_eq!(
            tracker.apply_battery_event(event(true, 0.5), t0()),
            Err(TrackerError::Unsupported)
        );
        assert!(tracker.current_session().is_none());
    }

    #[test]
    fn test_unsupported_closes_open_session() {
        let mut tracker = tracker();
        tracker.apply_battery_event(event(true, 0.40), t0()).unwrap();
        tracker
            .apply_battery_event(event(true, 0.41), t0() + Duration::minutes(1))
            .unwrap();
        tracker
            .apply_battery_event(event(true, 0.42), t0() + Duration::minutes(2))
            .unwrap();

        let closed = tracker
            .mark_unsupported(t0() + Duration::minutes(3))
            .unwrap();
        assert_eq!(closed.end_time, Some(t0() + Duration::minutes(3)));
        assert_eq!(closed.end_level, Some(0.42));
        assert!(closed.max_wattage > 0.0);

        assert!(!tracker.is_charging());
        assert_eq!(tracker.session_history(), &[closed.clone()]);
        assert_eq!(tracker.current_session(), Some(&closed));
        assert_eq!(tracker.metrics(), ElectricalMetrics::default());
        assert!(tracker.mark_unsupported(t0() + Duration::minutes(4)).is_none());
        assert_eq!(tracker.session_history().len(), 1);
    }

    #[test]
    fn test_charging_without_known_level_is_rejected() {
        let mut tracker = tracker();
        assert_eq!(
            tracker.apply_charging_changed(true, t0()),
            Err(TrackerError::LevelUnknown)
        );
        assert!(!tracker.is_charging());
        assert!(tracker.current_session().is_none());

        tracker.apply_level_changed(0.8, t0()).unwrap();
        let opened = tracker.apply_charging_changed(true, t0()).unwrap();
        assert!(opened.session_opened);
        assert_eq!(tracker.current_session().unwrap().start_level, 0.8);
    }

    #[test]
    fn test_partial_signals_merge_with_last_known() {
        let mut tracker = tracker();
        tracker.apply_level_changed(0.3, t0()).unwrap();
        let opened = tracker.apply_charging_changed(true, t0()).unwrap();
        assert!(opened.session_opened);
        assert_eq!(tracker.current_session().unwrap().start_level, 0.3);

        tracker
            .apply_level_changed(0.31, t0() + Duration::minutes(1))
            .unwrap();
        let update = tracker
            .apply_level_changed(0.32, t0() + Duration::minutes(2))
            .unwrap();
        assert!(update.new_sample.is_some());

        let closed = tracker
            .apply_charging_changed(false, t0() + Duration::minutes(3))
            .unwrap();
        assert_eq!(closed.session_closed.unwrap().end_level, Some(0.32));
    }

    #[test]
    fn test_restore_history_sets_current_session() {
        let mut tracker = tracker();
        let mut session = Session::open(t0(), 0.2);
        session.close(t0() + Duration::hours(1), 0.8);
        tracker.restore_history(vec![session.clone()]);

        assert_eq!(tracker.current_session(), Some(&session));
        assert_eq!(tracker.session_history().len(), 1);
    }
}
