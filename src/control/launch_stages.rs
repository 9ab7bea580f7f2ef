use crate::constants::FUEL_EPSILON;

use super::configuration::StageSpec;

#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub dry_mass: f64,
    pub initial_fuel: f64,
    pub fuel_mass: f64,
}

impl Stage {
    pub fn new(spec: &StageSpec) -> Self {
        Stage {
            dry_mass: spec.mass,
            initial_fuel: spec.fuel,
            fuel_mass: spec.fuel,
        }
    }

    /// Burns up to `amount` kg and returns what was actually burned. Never
    /// drives the tank below zero.
    pub fn consume_fuel(&mut self, amount: f64) -> f64 {
        let consumed = amount.min(self.fuel_mass).max(0.0);
        self.fuel_mass -= consumed;
        if self.is_depleted() {
            self.fuel_mass = 0.0;
        }
        consumed
    }

    pub fn is_depleted(&self) -> bool {
        self.fuel_mass <= FUEL_EPSILON
    }

    pub fn get_total_mass(&self) -> f64 {
        self.dry_mass + self.fuel_mass
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BurnOutcome {
    /// The active stage burned fuel and produced this thrust (N).
    Thrust(f64),
    /// The active stage ran dry this tick and was jettisoned.
    Separated { stage: usize },
    /// Nothing left to burn.
    NoStages,
}

/// All stages of the rocket, burned from the highest index down.
#[derive(Debug, Clone, PartialEq)]
pub struct StageStack {
    stages: Vec<Stage>,
    remaining: usize,
}

impl StageStack {
    pub fn new(specs: &[StageSpec]) -> Self {
        StageStack {
            stages: specs.iter().map(Stage::new).collect(),
            remaining: specs.len(),
        }
    }

    pub fn remaining_stages(&self) -> usize {
        self.remaining
    }

    /// Fuel left per stage, jettisoned stages included.
    pub fn fuel_levels(&self) -> Vec<f64> {
        self.stages.iter().map(|stage| stage.fuel_mass).collect()
    }

    pub fn initial_fuel_levels(&self) -> Vec<f64> {
        self.stages.iter().map(|stage| stage.initial_fuel).collect()
    }

    /// Payload plus every attached stage, summed from stage 0 upward.
    pub fn total_mass(&self, payload_mass: f64) -> f64 {
        self.stages[..self.remaining]
            .iter()
            .fold(payload_mass, |mass, stage| mass + stage.get_total_mass())
    }

    /// Burns one tick worth of fuel from the active stage. Thrust follows the
    /// mass flow: `consumed / delta_time * thrust_per_fuel_unit`.
    pub fn burn(
        &mut self,
        burn_rate: f64,
        delta_time: f64,
        thrust_per_fuel_unit: f64,
    ) -> BurnOutcome {
        let Some(active) = self.remaining.checked_sub(1) else {
            return BurnOutcome::NoStages;
        };

        let stage = &mut self.stages[active];
        let consumed = stage.consume_fuel(burn_rate);

        if stage.is_depleted() {
            self.remaining -= 1;
            return BurnOutcome::Separated { stage: active };
        }

        BurnOutcome::Thrust(consumed / delta_time * thrust_per_fuel_unit)
    }
}
