//! Fan-out of flight events to registered observers.
//!
//! The simulation loop never calls observers directly. It pushes events into
//! an unbounded channel drained by a dispatcher thread, so a slow observer
//! delays other observers but never the loop.

use std::fmt::Debug;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use flume::{Receiver, Sender};
use log::{error, warn};

use crate::constants::EARTH_RADIUS;
use crate::control::rocket::RocketState;
use crate::errors::{ObserverError, SimulationError};
use crate::utils::vector2d::Vector2D;

/// State of the rocket at the end of one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickSnapshot {
    pub tick: u64,
    pub elapsed_time: f64, // s of simulated time
    pub mass: f64,
    pub speed: f64,
    pub position: Vector2D,
    pub velocity: Vector2D,
    pub angle: f64,
    pub remaining_stages: usize,
    pub fuel: Vec<f64>,
    pub initial_fuel: Vec<f64>,
    pub engine_on: bool,
}

impl TickSnapshot {
    pub fn from_state(state: &RocketState) -> Self {
        TickSnapshot {
            tick: state.tick,
            elapsed_time: state.elapsed_time,
            mass: state.mass,
            speed: state.kinematics.speed,
            position: state.kinematics.position,
            velocity: state.kinematics.velocity,
            angle: state.angle,
            remaining_stages: state.remaining_stages(),
            fuel: state.stages.fuel_levels(),
            initial_fuel: state.stages.initial_fuel_levels(),
            engine_on: state.engine_on,
        }
    }

    pub fn altitude(&self) -> f64 {
        self.position.magnitude() - EARTH_RADIUS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    GroundImpact,
    Stopped,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlightEvent {
    Tick(TickSnapshot),
    StageSeparation(usize),
    RunFinished(RunOutcome),
}

/// Receives flight events on the dispatcher thread, in the order the
/// simulation produced them.
pub trait RocketObserver: Send + Sync {
    fn on_tick(&self, snapshot: &TickSnapshot) -> Result<(), ObserverError>;

    fn on_stage_separation(&self, _stage_index: usize) -> Result<(), ObserverError> {
        Ok(())
    }

    fn on_run_finished(&self, _outcome: RunOutcome) -> Result<(), ObserverError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

#[derive(Default)]
pub struct ObserverRegistry {
    observers: Mutex<Vec<(ObserverId, Arc<dyn RocketObserver>)>>,
    next_id: AtomicU64,
}

impl Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("observers", &self.len())
            .finish()
    }
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Arc<dyn RocketObserver>) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut observers) = self.observers.lock() {
            observers.push((id, observer));
        }
        id
    }

    /// Returns whether `id` was registered.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let Ok(mut observers) = self.observers.lock() else {
            return false;
        };
        let before = observers.len();
        observers.retain(|(observer_id, _)| *observer_id != id);
        observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.observers.lock().map(|observers| observers.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delivers `event` to every observer registered right now. A failing or
    /// panicking observer is logged and skipped.
    pub fn broadcast(&self, event: &FlightEvent) {
        let observers: Vec<_> = match self.observers.lock() {
            Ok(observers) => observers.iter().map(|(id, obs)| (*id, obs.clone())).collect(),
            Err(_) => return,
        };

        for (id, observer) in observers {
            let result = panic::catch_unwind(AssertUnwindSafe(|| match event {
                FlightEvent::Tick(snapshot) => observer.on_tick(snapshot),
                FlightEvent::StageSeparation(stage) => observer.on_stage_separation(*stage),
                FlightEvent::RunFinished(outcome) => observer.on_run_finished(*outcome),
            }));

            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Observer {id:?}: {e}"),
                Err(_) => warn!("Observer {id:?} panicked while handling {event:?}"),
            }
        }
    }
}

/// Thread that drains the event channel into the registry.
#[derive(Debug)]
pub struct EventDispatcher {
    tx_events: Sender<FlightEvent>,
    handle: JoinHandle<()>,
}

impl EventDispatcher {
    pub fn spawn(registry: Arc<ObserverRegistry>) -> Result<Self, SimulationError> {
        let (tx_events, rx_events) = flume::unbounded();
        let name = "flight-events".to_string();

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || dispatch(rx_events, registry))
            .map_err(|source| SimulationError::WorkerSpawn { name, source })?;

        Ok(EventDispatcher { tx_events, handle })
    }

    pub fn sender(&self) -> Sender<FlightEvent> {
        self.tx_events.clone()
    }

    /// Delivers everything still queued, then stops the thread. Any other
    /// sender handed out by [`EventDispatcher::sender`] must be dropped first.
    pub fn finish(self) {
        drop(self.tx_events);
        if self.handle.join().is_err() {
            error!("Event dispatcher terminated abnormally");
        }
    }
}

fn dispatch(rx_events: Receiver<FlightEvent>, registry: Arc<ObserverRegistry>) {
    while let Ok(event) = rx_events.recv() {
        registry.broadcast(&event);
    }
}
