// Charging session domain model
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::telemetry::ElectricalMetrics;

pub const DEFAULT_SESSION_CAPACITY: usize = 5;

/// One contiguous interval during which the charger stays connected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    pub start_level: f64,
    #[serde(default)]
    pub end_level: Option<f64>,
    #[serde(default)]
    pub avg_wattage: f64,
    #[serde(default)]
    pub max_wattage: f64,
    #[serde(default)]
    pub avg_voltage: f64,
    #[serde(default)]
    pub max_amperage: f64,
    #[serde(default)]
    pub total_energy_wh: f64,
}

impl Session {
    pub fn open(start_time: DateTime<Utc>, start_level: f64) -> Self {
        Self {
            start_time,
            end_time: None,
            start_level,
            end_level: None,
            avg_wattage: 0.0,
            max_wattage: 0.0,
            avg_voltage: 0.0,
            max_amperage: 0.0,
            total_energy_wh: 0.0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Fold one accepted sample into the running aggregates.
    ///
    /// The averages are a two-term rolling mean, `(avg + sample) / 2`, seeded by
    /// the first sample. This weights the latest sample at one half and is not
    /// an arithmetic mean over the session; stored histories depend on it.
    pub fn fold_sample(&mut self, metrics: &ElectricalMetrics, elapsed_hours: f64) {
        self.max_wattage = self.max_wattage.max(metrics.watts);
        self.max_amperage = self.max_amperage.max(metrics.amps);

        self.avg_wattage = if self.avg_wattage == 0.0 {
            metrics.watts
        } else {
            (self.avg_wattage + metrics.watts) / 2.0
        };
        self.avg_voltage = if self.avg_voltage == 0.0 {
            metrics.volts
        } else {
            (self.avg_voltage + metrics.volts) / 2.0
        };

        if elapsed_hours > 0.0 {
            self.total_energy_wh += metrics.watts * elapsed_hours;
        }
    }

    /// Stamp the end of the session. A closed session is never reopened.
    pub fn close(&mut self, end_time: DateTime<Utc>, end_level: f64) {
        if self.is_open() {
            self.end_time = Some(end_time);
            self.end_level = Some(end_level);
        }
    }

    pub fn duration(&self, now: DateTime<Utc>) -> Duration {
        self.end_time.unwrap_or(now) - self.start_time
    }
}

/// Completed sessions, most recent first, bounded.
#[derive(Debug, Clone)]
pub struct SessionHistory {
    sessions: Vec<Session>,
    capacity: usize,
}

impl SessionHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            sessions: Vec::with_capacity(capacity.max(1) + 1),
            capacity: capacity.max(1),
        }
    }

    pub fn push_front(&mut self, session: Session) {
        self.sessions.insert(0, session);
        self.sessions.truncate(self.capacity);
    }

    /// Replace the whole list, e.g. with a reloaded copy. Open sessions are dropped.
    pub fn replace(&mut self, sessions: Vec<Session>) {
        self.sessions = sessions.into_iter().filter(|s| !s.is_open()).collect();
        self.sessions.truncate(self.capacity);
    }

    pub fn as_slice(&self) -> &[Session] {
        &self.sessions
    }

    pub fn latest(&self) -> Option<&Session> {
        self.sessions.first()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionHistory {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_CAPACITY)
    }
}
