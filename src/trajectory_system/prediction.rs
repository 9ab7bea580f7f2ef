//! Ballistic trajectory forecasts.
//!
//! The simulation loop hands a copy of the rocket state to a small pool of
//! worker threads. Each worker integrates a thrust-free path and publishes it
//! to a shared [`PredictedPath`], which only accepts results newer than the
//! one it holds.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};

use flume::{Receiver, Sender, TrySendError};
use log::{debug, error};

use crate::constants::{EARTH_RADIUS, PREDICTION_HORIZON, PREDICTION_MAX_STEPS};
use crate::control::configuration::DynamicsKind;
use crate::errors::SimulationError;
use crate::utils::vector2d::Vector2D;

use super::dynamics::{dynamics_for, FlightDynamics, MotionInput};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionLimits {
    pub horizon: f64, // s of simulated time
    pub max_steps: usize,
}

impl Default for PredictionLimits {
    fn default() -> Self {
        PredictionLimits {
            horizon: PREDICTION_HORIZON,
            max_steps: PREDICTION_MAX_STEPS,
        }
    }
}

/// Integrates a thrust-free path from `position`/`velocity` with step
/// `delta_time`. Stops at the limits or before the first point that would
/// lie inside the planet. The starting point itself is not included.
pub fn predict_ballistic(
    dynamics: &dyn FlightDynamics,
    position: Vector2D,
    velocity: Vector2D,
    delta_time: f64,
    limits: PredictionLimits,
) -> Result<Vec<Vector2D>, SimulationError> {
    if !delta_time.is_finite() || delta_time <= 0.0 {
        return Err(SimulationError::Forecast(format!(
            "timestep must be positive, got {delta_time}"
        )));
    }
    if !position.is_finite() || !velocity.is_finite() {
        return Err(SimulationError::Forecast(
            "state contains non-finite values".to_string(),
        ));
    }
    if position.magnitude() == 0.0 {
        return Err(SimulationError::Forecast(
            "position at the planet center".to_string(),
        ));
    }

    let mut points = Vec::new();
    let mut input = MotionInput {
        position,
        velocity,
        mass: 1.0,
        thrust: 0.0,
        angle: 0.0,
        delta_time,
    };

    let mut steps = 0;
    while steps < limits.max_steps && (steps as f64) * delta_time < limits.horizon {
        let output = dynamics.advance(&input);
        if output.position.magnitude() <= EARTH_RADIUS {
            break;
        }
        points.push(output.position);
        input.position = output.position;
        input.velocity = output.velocity;
        steps += 1;
    }

    Ok(points)
}

#[derive(Debug, Default)]
struct VersionedPath {
    version: u64,
    points: Vec<Vector2D>,
}

/// The latest forecast. Written by forecast workers, read by anyone.
#[derive(Debug, Default)]
pub struct PredictedPath {
    current: RwLock<VersionedPath>,
    next_version: AtomicU64,
}

impl PredictedPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves a version number. Later calls always get larger numbers.
    pub fn next_version(&self) -> u64 {
        self.next_version.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Replaces the stored path if `version` is newer than the stored one.
    /// Returns whether the path was replaced.
    pub fn publish(&self, version: u64, points: Vec<Vector2D>) -> bool {
        let Ok(mut current) = self.current.write() else {
            return false;
        };
        if version <= current.version {
            return false;
        }
        current.version = version;
        current.points = points;
        true
    }

    /// Empties the path and invalidates every forecast still in flight.
    pub fn clear(&self) {
        let version = self.next_version();
        self.publish(version, Vec::new());
    }

    pub fn points(&self) -> Vec<Vector2D> {
        self.current
            .read()
            .map(|current| current.points.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy)]
struct ForecastJob {
    version: u64,
    position: Vector2D,
    velocity: Vector2D,
    delta_time: f64,
    dynamics: DynamicsKind,
}

/// Fixed pool of forecast workers fed through a bounded queue.
#[derive(Debug)]
pub struct Forecaster {
    tx_jobs: Option<Sender<ForecastJob>>,
    workers: Vec<JoinHandle<()>>,
    path: Arc<PredictedPath>,
}

impl Forecaster {
    pub fn new(
        path: Arc<PredictedPath>,
        limits: PredictionLimits,
        num_workers: usize,
        queue_capacity: usize,
    ) -> Result<Self, SimulationError> {
        let (tx_jobs, rx_jobs) = flume::bounded(queue_capacity.max(1));
        let mut workers = Vec::with_capacity(num_workers);

        for index in 0..num_workers.max(1) {
            let name = format!("forecast-{index}");
            let rx_jobs = rx_jobs.clone();
            let path = path.clone();
            let worker = thread::Builder::new()
                .name(name.clone())
                .spawn(move || forecast_worker(rx_jobs, path, limits))
                .map_err(|source| SimulationError::WorkerSpawn { name, source })?;
            workers.push(worker);
        }

        Ok(Forecaster {
            tx_jobs: Some(tx_jobs),
            workers,
            path,
        })
    }

    /// Queues a forecast. Never blocks: when every worker is busy and the
    /// queue is full the request is dropped and `false` is returned.
    pub fn submit(
        &self,
        position: Vector2D,
        velocity: Vector2D,
        delta_time: f64,
        dynamics: DynamicsKind,
    ) -> bool {
        let Some(tx_jobs) = &self.tx_jobs else {
            return false;
        };

        let job = ForecastJob {
            version: self.path.next_version(),
            position,
            velocity,
            delta_time,
            dynamics,
        };

        match tx_jobs.try_send(job) {
            Ok(()) => true,
            Err(TrySendError::Full(job)) => {
                debug!("Forecast queue full, skipping forecast {}", job.version);
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                error!("Forecast workers are gone, forecast dropped");
                false
            }
        }
    }
}

impl Drop for Forecaster {
    fn drop(&mut self) {
        // Workers drain the queue and exit once the sender is gone.
        self.tx_jobs.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!("Forecast worker terminated abnormally");
            }
        }
    }
}

fn forecast_worker(
    rx_jobs: Receiver<ForecastJob>,
    path: Arc<PredictedPath>,
    limits: PredictionLimits,
) {
    while let Ok(job) = rx_jobs.recv() {
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let dynamics = dynamics_for(job.dynamics);
            predict_ballistic(
                dynamics.as_ref(),
                job.position,
                job.velocity,
                job.delta_time,
                limits,
            )
        }));

        match result {
            Ok(Ok(points)) => {
                if !path.publish(job.version, points) {
                    debug!("Discarding stale forecast {}", job.version);
                }
            }
            Ok(Err(e)) => error!("Forecast {} failed: {e}", job.version),
            Err(_) => error!("Forecast {} panicked", job.version),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::EARTH_MU;
    use crate::trajectory_system::dynamics::ReferenceDynamics;

    fn pad() -> Vector2D {
        Vector2D::new(0.0, EARTH_RADIUS)
    }

    #[test]
    fn test_rocket_at_rest_on_pad_has_no_forecast() {
        let points = predict_ballistic(
            &ReferenceDynamics,
            pad(),
            Vector2D::ZERO,
            0.1,
            PredictionLimits::default(),
        )
        .unwrap();
        assert!(points.is_empty());
    }

    #[test]
    fn test_vertical_shot_stops_before_reentry() {
        let points = predict_ballistic(
            &ReferenceDynamics,
            pad() + Vector2D::new(0.0, 10.0),
            Vector2D::new(0.0, 500.0),
            0.1,
            PredictionLimits::default(),
        )
        .unwrap();

        // Roughly 2 * 500 / 9.8 seconds of flight.
        assert!(points.len() > 1000 && points.len() < 1040, "{}", points.len());
        assert!(points.iter().all(|point| point.magnitude() > EARTH_RADIUS));
    }

    #[test]
    fn test_orbit_runs_to_the_limit() {
        let r = EARTH_RADIUS + 300_000.0;
        let limits = PredictionLimits {
            horizon: 100.0,
            max_steps: 100_000,
        };
        let points = predict_ballistic(
            &ReferenceDynamics,
            Vector2D::new(0.0, r),
            Vector2D::new(-(EARTH_MU / r).sqrt(), 0.0),
            0.1,
            limits,
        )
        .unwrap();
        assert!((999..=1001).contains(&points.len()), "{}", points.len());

        let capped = predict_ballistic(
            &ReferenceDynamics,
            Vector2D::new(0.0, r),
            Vector2D::new(-(EARTH_MU / r).sqrt(), 0.0),
            0.1,
            PredictionLimits {
                horizon: 100.0,
                max_steps: 25,
            },
        )
        .unwrap();
        assert_eq!(capped.len(), 25);
    }

    #[test]
    fn test_invalid_forecast_input() {
        assert!(matches!(
            predict_ballistic(
                &ReferenceDynamics,
                pad(),
                Vector2D::ZERO,
                0.0,
                PredictionLimits::default()
            ),
            Err(SimulationError::Forecast(_))
        ));
        assert!(matches!(
            predict_ballistic(
                &ReferenceDynamics,
                Vector2D::new(f64::NAN, 0.0),
                Vector2D::ZERO,
                0.1,
                PredictionLimits::default()
            ),
            Err(SimulationError::Forecast(_))
        ));
    }

    #[test]
    fn test_stale_results_are_discarded() {
        let path = PredictedPath::new();
        let older = path.next_version();
        let newer = path.next_version();

        assert!(path.publish(newer, vec![Vector2D::new(1.0, 2.0)]));
        assert!(!path.publish(older, vec![Vector2D::new(3.0, 4.0)]));
        assert_eq!(path.points(), vec![Vector2D::new(1.0, 2.0)]);
        assert!(!path.publish(newer, vec![Vector2D::new(3.0, 4.0)]));
        assert_eq!(path.points(), vec![Vector2D::new(1.0, 2.0)]);

        path.clear();
        assert!(path.points().is_empty());
        assert!(!path.publish(newer, vec![Vector2D::new(5.0, 6.0)]));
    }

    #[test]
    fn test_forecaster_publishes_result() {
        let path = Arc::new(PredictedPath::new());
        let forecaster = Forecaster::new(path.clone(), PredictionLimits::default(), 1, 4).unwrap();

        assert!(forecaster.submit(
            pad() + Vector2D::new(0.0, 10.0),
            Vector2D::new(0.0, 100.0),
            0.1,
            DynamicsKind::Optimized,
        ));
        drop(forecaster);

        let points = path.points();
        assert!(!points.is_empty());
        assert!(points[0].y > EARTH_RADIUS + 10.0);
    }

    #[test]
    fn test_failed_forecast_keeps_previous_path() {
        let path = Arc::new(PredictedPath::new());
        let version = path.next_version();
        path.publish(version, vec![Vector2D::new(0.0, EARTH_RADIUS + 1.0)]);

        let forecaster = Forecaster::new(path.clone(), PredictionLimits::default(), 1, 4).unwrap();
        forecaster.submit(pad(), Vector2D::ZERO, f64::NAN, DynamicsKind::Reference);
        drop(forecaster);

        assert_eq!(path.points(), vec![Vector2D::new(0.0, EARTH_RADIUS + 1.0)]);
    }
}
