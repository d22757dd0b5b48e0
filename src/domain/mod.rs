// Domain layer - Charging data models and rate estimation
pub mod estimator;
pub mod session;
pub mod telemetry;
