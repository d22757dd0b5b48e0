// Charging rate estimator
//
// Battery level arrives in coarse steps (typically 1%) at irregular intervals,
// so power is inferred from the level delta over wall-clock time. Voltage and
// amperage are NOT measured: they come from a heuristic lookup of common USB
// power-delivery voltage tiers, with a little jitter so a voltage trace does
// not render as a staircase.
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::telemetry::ElectricalMetrics;

/// Upper bound for a consumer fast charger
pub const MAX_WATTAGE: f64 = 120.0;

/// Half-width of the uniform voltage jitter
pub const JITTER_VOLTS: f64 = 0.05;

const USB_DEFAULT_VOLTS: f64 = 5.0;
const PD_MID_VOLTS: f64 = 9.0;
const PD_HIGH_VOLTS: f64 = 12.0;
const USB_DEFAULT_MAX_WATTS: f64 = 12.0;
const PD_MID_MAX_WATTS: f64 = 25.0;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Source of the voltage offset applied to non-idle estimates.
pub trait VoltageJitter: Send + Sync {
    /// Offset in volts, within `[-JITTER_VOLTS, JITTER_VOLTS]`
    fn offset(&mut self) -> f64;
}

pub struct RandomJitter {
    rng: StdRng,
}

impl RandomJitter {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomJitter {
    fn default() -> Self {
        Self::new()
    }
}

impl VoltageJitter for RandomJitter {
    fn offset(&mut self) -> f64 {
        self.rng.random_range(-JITTER_VOLTS..=JITTER_VOLTS)
    }
}

/// Constant offset, clamped to the jitter band
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedJitter(pub f64);

impl VoltageJitter for FixedJitter {
    fn offset(&mut self) -> f64 {
        self.0.clamp(-JITTER_VOLTS, JITTER_VOLTS)
    }
}

/// Hours elapsed between two instants; negative when `to` precedes `from`.
pub fn elapsed_hours(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / MILLIS_PER_HOUR
}

/// Estimate charging power in watts from two level samples (levels in `[0, 1]`).
///
/// Returns `None` when the samples are not strictly ordered in time. The
/// result is clamped to `[0, MAX_WATTAGE]`: a dropping level reads as 0 W and
/// spikes from tiny time deltas are capped.
pub fn estimate_wattage(
    prev_level: f64,
    prev_time: DateTime<Utc>,
    curr_level: f64,
    curr_time: DateTime<Utc>,
    capacity_wh: f64,
) -> Option<f64> {
    let hours = elapsed_hours(prev_time, curr_time);
    if hours <= 0.0 {
        return None;
    }

    let raw_watts = (curr_level - prev_level) * capacity_wh / hours;
    Some(raw_watts.clamp(0.0, MAX_WATTAGE))
}

/// Nominal voltage tier for a wattage. Idle reads as 5 V.
pub fn voltage_tier(watts: f64) -> f64 {
    if watts <= USB_DEFAULT_MAX_WATTS {
        USB_DEFAULT_VOLTS
    } else if watts <= PD_MID_MAX_WATTS {
        PD_MID_VOLTS
    } else {
        PD_HIGH_VOLTS
    }
}

/// Split a wattage into plausible voltage and amperage.
pub fn estimate_electrical_properties(
    watts: f64,
    jitter: &mut dyn VoltageJitter,
) -> ElectricalMetrics {
    if watts <= 0.0 {
        return ElectricalMetrics {
            watts: 0.0,
            volts: USB_DEFAULT_VOLTS,
            amps: 0.0,
        };
    }

    let volts = voltage_tier(watts) + jitter.offset().clamp(-JITTER_VOLTS, JITTER_VOLTS);
    ElectricalMetrics {
        watts,
        volts,
        amps: watts / volts,
    }
}
