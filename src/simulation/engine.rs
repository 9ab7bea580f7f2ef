use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use flume::Sender;
use log::{error, info};

use crate::constants::{FORECAST_QUEUE_PER_WORKER, FORECAST_WORKERS};
use crate::control::configuration::{
    check_non_negative, validate_target_orbit_altitude, validate_tick_interval, AutopilotMode,
    Configuration, DynamicsKind, FlightSettings, SettingsFile,
};
use crate::control::guidance::normalize_angle;
use crate::control::rocket::Rocket;
use crate::errors::SimulationError;
use crate::telemetry_system::observer::{
    EventDispatcher, ObserverId, ObserverRegistry, RocketObserver, RunOutcome, TickSnapshot,
};
use crate::trajectory_system::paths::FlightPaths;
use crate::trajectory_system::prediction::{Forecaster, PredictionLimits};

use super::run_loop::{self, RunContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EngineCommand {
    Set(bool),
    Toggle,
}

impl EngineCommand {
    fn then_toggle(command: Option<EngineCommand>) -> Option<EngineCommand> {
        match command {
            None => Some(EngineCommand::Toggle),
            Some(EngineCommand::Toggle) => None,
            Some(EngineCommand::Set(engine_on)) => Some(EngineCommand::Set(!engine_on)),
        }
    }
}

/// Everything the API writes and the flight loop reads once per tick.
#[derive(Debug)]
pub(crate) struct Controls {
    pub settings: FlightSettings,
    /// Last known pitch angle; seeds the next run.
    pub angle: f64,
    pub pending_angle: Option<f64>,
    pub pending_engine: Option<EngineCommand>,
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
struct ActiveRun {
    tx_stop: Sender<()>,
    handle: JoinHandle<RunOutcome>,
    dispatcher: EventDispatcher,
}

/// Public face of the simulation: holds the rocket definition and flight
/// settings, runs one flight at a time on a dedicated thread and fans its
/// events out to subscribed observers.
#[derive(Debug)]
pub struct RocketSimulator {
    configuration: Option<Arc<Configuration>>,
    controls: Arc<Mutex<Controls>>,
    registry: Arc<ObserverRegistry>,
    paths: Arc<FlightPaths>,
    latest_snapshot: Arc<Mutex<Option<TickSnapshot>>>,
    running: Arc<AtomicBool>,
    prediction_limits: PredictionLimits,
    active_run: Option<ActiveRun>,
}

impl Default for RocketSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl RocketSimulator {
    pub fn new() -> Self {
        let settings = FlightSettings::default();
        RocketSimulator {
            configuration: None,
            controls: Arc::new(Mutex::new(Controls {
                angle: normalize_angle(settings.initial_angle),
                settings,
                pending_angle: None,
                pending_engine: None,
            })),
            registry: Arc::new(ObserverRegistry::new()),
            paths: Arc::new(FlightPaths::new()),
            latest_snapshot: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            prediction_limits: PredictionLimits::default(),
            active_run: None,
        }
    }

    pub fn with_settings(settings: FlightSettings) -> Result<Self, SimulationError> {
        settings.validate()?;
        let simulator = Self::new();
        {
            let mut controls = lock(&simulator.controls);
            controls.angle = normalize_angle(settings.initial_angle);
            controls.settings = settings;
        }
        Ok(simulator)
    }

    /// Simulator configured from a parsed settings file.
    pub fn from_settings_file(file: SettingsFile) -> Result<Self, SimulationError> {
        let mut simulator = Self::with_settings(file.flight)?;
        simulator.set_configuration(file.rocket)?;
        Ok(simulator)
    }

    pub fn configure(
        &mut self,
        payload_mass: f64,
        stage_masses: &[f64],
        fuel_masses: &[f64],
        thrust_per_fuel_unit: f64,
    ) -> Result<(), SimulationError> {
        let configuration =
            Configuration::new(payload_mass, stage_masses, fuel_masses, thrust_per_fuel_unit)?;
        self.set_configuration(configuration)
    }

    /// Replaces the rocket definition. Takes effect at the next `start`.
    pub fn set_configuration(
        &mut self,
        configuration: Configuration,
    ) -> Result<(), SimulationError> {
        configuration.validate()?;
        self.configuration = Some(Arc::new(configuration));

        let mut controls = lock(&self.controls);
        controls.angle = normalize_angle(controls.settings.initial_angle);
        Ok(())
    }

    pub fn set_tick_interval(&self, tick_interval_ms: u64) -> Result<(), SimulationError> {
        validate_tick_interval(tick_interval_ms)?;
        lock(&self.controls).settings.tick_interval_ms = tick_interval_ms;
        Ok(())
    }

    pub fn set_fuel_burn_rate(&self, fuel_per_tick: f64) -> Result<(), SimulationError> {
        check_non_negative("fuel burn rate", fuel_per_tick)?;
        lock(&self.controls).settings.fuel_burn_rate = fuel_per_tick;
        Ok(())
    }

    pub fn set_target_orbit_altitude(&self, altitude: f64) -> Result<(), SimulationError> {
        validate_target_orbit_altitude(altitude)?;
        lock(&self.controls).settings.target_orbit_altitude = altitude;
        Ok(())
    }

    pub fn set_autopilot_mode(&self, mode: AutopilotMode) {
        lock(&self.controls).settings.autopilot = mode;
    }

    /// Takes effect at the next `start`.
    pub fn set_dynamics(&self, dynamics: DynamicsKind) {
        lock(&self.controls).settings.dynamics = dynamics;
    }

    pub fn set_prediction_limits(&mut self, limits: PredictionLimits) {
        self.prediction_limits = limits;
    }

    /// Steering input in degrees from local vertical. Ignored outside
    /// manual mode.
    pub fn set_manual_angle(&self, degrees: f64) -> Result<(), SimulationError> {
        if !degrees.is_finite() {
            return Err(SimulationError::InvalidConfiguration(format!(
                "angle must be finite, got {degrees}"
            )));
        }

        let mut controls = lock(&self.controls);
        if controls.settings.autopilot == AutopilotMode::Manual {
            controls.angle = normalize_angle(degrees);
            controls.pending_angle = Some(degrees);
        }
        Ok(())
    }

    /// Applied at the top of the next tick of a running flight. A new
    /// flight always starts with the engine on.
    pub fn set_engine_on(&self, engine_on: bool) {
        lock(&self.controls).pending_engine = Some(EngineCommand::Set(engine_on));
    }

    pub fn toggle_engine(&self) {
        let mut controls = lock(&self.controls);
        controls.pending_engine = EngineCommand::then_toggle(controls.pending_engine);
    }

    pub fn subscribe(&self, observer: Arc<dyn RocketObserver>) -> ObserverId {
        self.registry.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.registry.unsubscribe(id)
    }

    pub fn angle(&self) -> f64 {
        lock(&self.controls).angle
    }

    pub fn autopilot_mode(&self) -> AutopilotMode {
        lock(&self.controls).settings.autopilot
    }

    pub fn delta_time(&self) -> f64 {
        lock(&self.controls).settings.delta_time()
    }

    pub fn settings(&self) -> FlightSettings {
        lock(&self.controls).settings.clone()
    }

    pub fn configuration(&self) -> Option<&Configuration> {
        self.configuration.as_deref()
    }

    pub fn latest_snapshot(&self) -> Option<TickSnapshot> {
        lock(&self.latest_snapshot).clone()
    }

    pub fn paths(&self) -> Arc<FlightPaths> {
        self.paths.clone()
    }

    pub fn is_configured(&self) -> bool {
        self.configuration.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Resets the rocket to the launch condition and starts a flight. Does
    /// nothing if a flight is already running.
    pub fn start(&mut self) -> Result<(), SimulationError> {
        if self.is_running() {
            return Ok(());
        }
        self.finish_run();

        let configuration = self.configuration.clone().ok_or_else(|| {
            SimulationError::InvalidState("start requested before configuration".to_string())
        })?;

        let settings = {
            let mut controls = lock(&self.controls);
            controls.pending_angle = None;
            controls.pending_engine = None;
            let mut settings = controls.settings.clone();
            settings.initial_angle = controls.angle;
            settings
        };

        self.paths.reset();
        *lock(&self.latest_snapshot) = None;

        let forecaster = Forecaster::new(
            self.paths.predicted_path().clone(),
            self.prediction_limits,
            FORECAST_WORKERS,
            FORECAST_WORKERS * FORECAST_QUEUE_PER_WORKER,
        )?;
        let dispatcher = EventDispatcher::spawn(self.registry.clone())?;
        let (tx_stop, rx_stop) = flume::bounded(1);

        let context = RunContext {
            rocket: Rocket::new(configuration, &settings),
            controls: self.controls.clone(),
            paths: self.paths.clone(),
            forecaster,
            latest_snapshot: self.latest_snapshot.clone(),
            running: self.running.clone(),
            tx_events: dispatcher.sender(),
            rx_stop,
        };

        self.running.store(true, Ordering::SeqCst);
        let name = "flight-loop".to_string();
        let handle = match thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_loop::run(context))
        {
            Ok(handle) => handle,
            Err(source) => {
                self.running.store(false, Ordering::SeqCst);
                dispatcher.finish();
                return Err(SimulationError::WorkerSpawn { name, source });
            }
        };

        info!(
            "Simulation started: {:?} autopilot, {} ms ticks, {:?} dynamics",
            settings.autopilot, settings.tick_interval_ms, settings.dynamics
        );

        self.active_run = Some(ActiveRun {
            tx_stop,
            handle,
            dispatcher,
        });
        Ok(())
    }

    /// Stops the flight and waits until every observer has seen its last
    /// event. Safe to call at any time.
    pub fn stop(&mut self) {
        if self.active_run.is_some() {
            self.finish_run();
            info!("Simulation stopped");
        }
    }

    fn finish_run(&mut self) {
        let Some(run) = self.active_run.take() else {
            return;
        };

        let _ = run.tx_stop.try_send(());
        drop(run.tx_stop);
        if run.handle.join().is_err() {
            error!("Flight loop terminated abnormally");
        }
        run.dispatcher.finish();
    }
}

impl Drop for RocketSimulator {
    fn drop(&mut self) {
        self.finish_run();
    }
}
