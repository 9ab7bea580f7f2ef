//! The flight loop thread. Owns the [`Rocket`] for the whole run; every
//! other thread only sees snapshots.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use flume::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use log::{debug, info};

use crate::control::configuration::FlightSettings;
use crate::control::rocket::{Rocket, TickOutcome};
use crate::telemetry_system::observer::{FlightEvent, RunOutcome, TickSnapshot};
use crate::trajectory_system::paths::FlightPaths;
use crate::trajectory_system::prediction::Forecaster;

use super::engine::{lock, Controls, EngineCommand};

pub(crate) struct RunContext {
    pub rocket: Rocket,
    pub controls: Arc<Mutex<Controls>>,
    pub paths: Arc<FlightPaths>,
    pub forecaster: Forecaster,
    pub latest_snapshot: Arc<Mutex<Option<TickSnapshot>>>,
    pub running: Arc<AtomicBool>,
    pub tx_events: Sender<FlightEvent>,
    pub rx_stop: Receiver<()>,
}

/// Clears the running flag when the loop exits, however it exits.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub(crate) fn run(context: RunContext) -> RunOutcome {
    let RunContext {
        mut rocket,
        controls,
        paths,
        forecaster,
        latest_snapshot,
        running,
        tx_events,
        rx_stop,
    } = context;
    let _running = RunningGuard(running);

    info!(
        "Flight started: {} stage(s), launch mass {:.2} kg",
        rocket.configuration().stage_count(),
        rocket.state.mass
    );

    let mut next_tick_time = Instant::now();
    let outcome = loop {
        match rx_stop.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => break RunOutcome::Stopped,
            Err(TryRecvError::Empty) => {}
        }

        let settings = apply_commands(&controls, &mut rocket);
        let tick_outcome = rocket.update(&settings);

        if let TickOutcome::StageSeparated(stage) = tick_outcome {
            emit(&tx_events, FlightEvent::StageSeparation(stage));
        }

        let snapshot = TickSnapshot::from_state(&rocket.state);
        paths.record(snapshot.position);
        record_angle(&controls, snapshot.angle);
        *lock(&latest_snapshot) = Some(snapshot.clone());

        let (position, velocity) = (snapshot.position, snapshot.velocity);
        emit(&tx_events, FlightEvent::Tick(snapshot));

        if tick_outcome == TickOutcome::GroundImpact {
            info!(
                "Ground impact at tick {} after {:.1} s",
                rocket.state.tick, rocket.state.elapsed_time
            );
            break RunOutcome::GroundImpact;
        }

        forecaster.submit(position, velocity, settings.delta_time(), settings.dynamics);

        let tick_interval = settings.tick_interval();
        next_tick_time += tick_interval;
        let now = Instant::now();
        if now > next_tick_time + tick_interval * 2 {
            debug!("Flight loop is behind schedule, resetting tick clock");
            next_tick_time = now;
        }

        match rx_stop.recv_deadline(next_tick_time) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break RunOutcome::Stopped,
            Err(RecvTimeoutError::Timeout) => {}
        }
    };

    if outcome == RunOutcome::Stopped {
        info!("Flight stopped at tick {}", rocket.state.tick);
    }
    emit(&tx_events, FlightEvent::RunFinished(outcome));
    outcome
}

/// Applies steering and engine commands queued since the last tick and
/// returns the settings in force for this one.
fn apply_commands(controls: &Mutex<Controls>, rocket: &mut Rocket) -> FlightSettings {
    let mut controls = lock(controls);

    if let Some(angle) = controls.pending_angle.take() {
        rocket.set_manual_angle(angle, controls.settings.autopilot);
    }

    match controls.pending_engine.take() {
        Some(EngineCommand::Set(engine_on)) => rocket.set_engine_on(engine_on),
        Some(EngineCommand::Toggle) => rocket.set_engine_on(!rocket.state.engine_on),
        None => {}
    }

    controls.settings.clone()
}

/// Publishes the angle flown this tick, unless a manual command arrived
/// after the tick picked up its inputs.
fn record_angle(controls: &Mutex<Controls>, angle: f64) {
    let mut controls = lock(controls);
    if controls.pending_angle.is_none() {
        controls.angle = angle;
    }
}

/// Hands an event to the dispatcher thread. Returns false if the
/// dispatcher is gone and the event was dropped.
fn emit(tx_events: &Sender<FlightEvent>, event: FlightEvent) -> bool {
    match tx_events.send(event) {
        Ok(()) => true,
        Err(err) => {
            debug!("Event dispatcher has stopped, dropping {:?}", err.into_inner());
            false
        }
    }
}
