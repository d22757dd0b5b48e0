// Charging telemetry: estimates charger power from coarse battery-level
// samples and groups it into charging sessions.
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
