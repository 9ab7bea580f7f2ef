pub mod constants;
pub mod control;
pub mod errors;
pub mod simulation;
pub mod telemetry_system;
pub mod trajectory_system;
pub mod utils;

pub use constants::*;
pub use control::configuration::{
    AutopilotMode, Configuration, DynamicsKind, FlightSettings, SettingsFile, StageSpec,
};
pub use control::guidance::GuidanceSystem;
pub use control::launch_stages::{Stage, StageStack};
pub use control::rocket::{Rocket, RocketState, TickOutcome};
pub use errors::{ObserverError, SimulationError};

pub use simulation::engine::RocketSimulator;

// Re-export commonly used items from trajectory_system
pub use trajectory_system::dynamics::{FlightDynamics, OptimizedDynamics, ReferenceDynamics};
pub use trajectory_system::kinematics::Kinematics;
pub use trajectory_system::paths::FlightPaths;
pub use trajectory_system::prediction::{predict_ballistic, PredictedPath, PredictionLimits};

// Re-export commonly used items from telemetry_system
pub use telemetry_system::observer::{ObserverId, RocketObserver, RunOutcome, TickSnapshot};
pub use telemetry_system::telemetry::Telemetry;

// Re-export commonly used utilities
pub use utils::vector2d::Vector2D;
