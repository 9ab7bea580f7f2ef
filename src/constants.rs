// Physical Constants
pub const EARTH_RADIUS: f64 = 6_371_000.0; // meters
pub const EARTH_MASS: f64 = 5.972e24; // kg
pub const GRAVITATIONAL_CONSTANT: f64 = 6.67430e-11; // N⋅m²/kg²
pub const EARTH_MU: f64 = GRAVITATIONAL_CONSTANT * EARTH_MASS; // m³/s²

// Autopilot
pub const MAX_ANGLE_CHANGE_RATE: f64 = 10.0; // degrees per second
pub const MAX_DISTANCE_ANGLE: f64 = 45.0; // degrees from local vertical
pub const GRAVITY_TURN_START_ALTITUDE: f64 = 0.0; // m
pub const GRAVITY_TURN_INITIAL_ANGLE: f64 = 0.0; // degrees
pub const GRAVITY_TURN_FINAL_ANGLE: f64 = 90.0; // degrees
pub const ORBIT_VELOCITY_TOLERANCE: f64 = 1.01; // upper bound of the engine cutoff band

// Staging
pub const FUEL_EPSILON: f64 = 1e-9; // kg, remainder treated as an empty tank

// Default flight settings
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 100;
pub const DEFAULT_FUEL_BURN_RATE: f64 = 0.01; // kg per tick
pub const DEFAULT_TARGET_ORBIT_ALTITUDE: f64 = 200_000.0; // m

// Trajectory prediction
pub const PREDICTION_HORIZON: f64 = 10_000.0; // s of simulated time
pub const PREDICTION_MAX_STEPS: usize = 100_000;
pub const FORECAST_WORKERS: usize = 2;
pub const FORECAST_QUEUE_PER_WORKER: usize = 2;
