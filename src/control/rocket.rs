use std::sync::Arc;

use log::debug;

use crate::trajectory_system::dynamics::{dynamics_for, FlightDynamics};
use crate::trajectory_system::kinematics::{Kinematics, StepOutcome};

use super::configuration::{AutopilotMode, Configuration, FlightSettings};
use super::guidance::{normalize_angle, GuidanceSystem};
use super::launch_stages::{BurnOutcome, StageStack};

#[derive(Debug, Clone, PartialEq)]
pub struct RocketState {
    pub kinematics: Kinematics,
    pub mass: f64,
    pub stages: StageStack,
    pub angle: f64, // degrees from local vertical, (-180, 180]
    pub engine_on: bool,
    pub landed: bool,
    pub tick: u64,
    pub elapsed_time: f64,
}

impl RocketState {
    /// Launch condition: on the pad, at rest, every tank full.
    pub fn at_launch(configuration: &Configuration, initial_angle: f64) -> Self {
        let stages = StageStack::new(&configuration.stages);
        RocketState {
            kinematics: Kinematics::at_launch_site(),
            mass: stages.total_mass(configuration.payload_mass),
            stages,
            angle: normalize_angle(initial_angle),
            engine_on: true,
            landed: false,
            tick: 0,
            elapsed_time: 0.0,
        }
    }

    pub fn remaining_stages(&self) -> usize {
        self.stages.remaining_stages()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Flying,
    /// The active stage ran dry. The rocket did not move this tick.
    StageSeparated(usize),
    /// The rocket reached the surface this tick.
    GroundImpact,
    /// The rocket had already landed; nothing changed.
    Landed,
}

/// A single flight: the rocket definition, its evolving state, and the
/// dynamics implementation chosen for the run.
#[derive(Debug)]
pub struct Rocket {
    configuration: Arc<Configuration>,
    dynamics: Box<dyn FlightDynamics>,
    pub state: RocketState,
}

impl Rocket {
    pub fn new(configuration: Arc<Configuration>, settings: &FlightSettings) -> Self {
        let state = RocketState::at_launch(&configuration, settings.initial_angle);
        Rocket {
            configuration,
            dynamics: dynamics_for(settings.dynamics),
            state,
        }
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// Steering input. Ignored unless the autopilot is in manual mode.
    pub fn set_manual_angle(&mut self, angle: f64, mode: AutopilotMode) {
        if mode == AutopilotMode::Manual {
            self.state.angle = normalize_angle(angle);
        }
    }

    pub fn set_engine_on(&mut self, engine_on: bool) {
        self.state.engine_on = engine_on;
    }

    /// Runs one tick: autopilot, then staging, then integration.
    pub fn update(&mut self, settings: &FlightSettings) -> TickOutcome {
        if self.state.landed {
            return TickOutcome::Landed;
        }

        let delta_time = settings.delta_time();
        self.state.tick += 1;
        self.state.elapsed_time += delta_time;

        let guidance = GuidanceSystem::new(settings.autopilot, settings.target_orbit_altitude);
        let command = guidance.update(
            self.state.angle,
            &self.state.kinematics,
            self.dynamics.as_ref(),
            delta_time,
        );
        self.state.angle = command.angle;
        if let Some(engine_on) = command.engine_on {
            self.state.engine_on = engine_on;
        }

        let thrust_magnitude = self.calculate_thrust(settings.fuel_burn_rate, delta_time);
        self.state.mass = self
            .state
            .stages
            .total_mass(self.configuration.payload_mass);

        let thrust_magnitude = match thrust_magnitude {
            Some(thrust) => thrust,
            None => {
                let stage = self.state.remaining_stages();
                debug!("Stage {stage} separated at tick {}", self.state.tick);
                return TickOutcome::StageSeparated(stage);
            }
        };

        let outcome = self.state.kinematics.update(
            self.dynamics.as_ref(),
            self.state.mass,
            thrust_magnitude,
            self.state.angle,
            delta_time,
        );

        match outcome {
            StepOutcome::Airborne => TickOutcome::Flying,
            StepOutcome::GroundImpact => {
                self.state.landed = true;
                TickOutcome::GroundImpact
            }
        }
    }

    /// Thrust for this tick, or `None` when the active stage separated.
    fn calculate_thrust(&mut self, burn_rate: f64, delta_time: f64) -> Option<f64> {
        if self.state.stages.remaining_stages() == 0 {
            self.state.engine_on = false;
        }
        if !self.state.engine_on {
            return Some(0.0);
        }

        match self.state.stages.burn(
            burn_rate,
            delta_time,
            self.configuration.thrust_per_fuel_unit,
        ) {
            BurnOutcome::Thrust(thrust) => Some(thrust),
            BurnOutcome::Separated { .. } => None,
            BurnOutcome::NoStages => Some(0.0),
        }
    }
}
