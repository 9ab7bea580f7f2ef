pub mod observer;
pub mod telemetry;
