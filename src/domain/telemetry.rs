// Telemetry sample domain models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const DEFAULT_TELEMETRY_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargeStatus {
    Charging,
    Discharging,
}

/// Derived electrical reading. The default value is the idle reading (all zeros).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ElectricalMetrics {
    pub watts: f64,
    pub volts: f64,
    pub amps: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySample {
    pub timestamp: DateTime<Utc>,
    pub level_percent: f64,
    pub wattage: f64,
    pub voltage: f64,
    pub amperage: f64,
    pub status: ChargeStatus,
}

impl TelemetrySample {
    pub fn new(
        timestamp: DateTime<Utc>,
        level: f64,
        metrics: ElectricalMetrics,
        status: ChargeStatus,
    ) -> Self {
        Self {
            timestamp,
            level_percent: level * 100.0,
            wattage: metrics.watts,
            voltage: metrics.volts,
            amperage: metrics.amps,
            status,
        }
    }
}

/// Rolling telemetry history: fixed capacity, oldest sample evicted first.
#[derive(Debug, Clone)]
pub struct TelemetryHistory {
    samples: VecDeque<TelemetrySample>,
    capacity: usize,
}

impl TelemetryHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: TelemetrySample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<&TelemetrySample> {
        self.samples.back()
    }

    /// All retained samples, oldest first
    pub fn to_vec(&self) -> Vec<TelemetrySample> {
        self.samples.iter().cloned().collect()
    }

    /// The `count` newest samples, oldest first
    pub fn recent(&self, count: usize) -> Vec<TelemetrySample> {
        let skip = self.samples.len().saturating_sub(count);
        self.samples.iter().skip(skip).cloned().collect()
    }
}

impl Default for TelemetryHistory {
    fn default() -> Self {
        Self::new(DEFAULT_TELEMETRY_CAPACITY)
    }
}
