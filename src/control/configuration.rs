use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_FUEL_BURN_RATE, DEFAULT_TARGET_ORBIT_ALTITUDE, DEFAULT_TICK_INTERVAL_MS,
    GRAVITY_TURN_START_ALTITUDE,
};
use crate::errors::SimulationError;

/// Angle-control policy run by the autopilot every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutopilotMode {
    #[default]
    Manual,
    MaxDistance,
    StableOrbit,
}

/// Which implementation of the flight dynamics math a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DynamicsKind {
    #[default]
    Reference,
    Optimized,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageSpec {
    pub mass: f64, // kg, structure only
    pub fuel: f64, // kg, initial fuel load
}

/// The rocket definition. Stages burn from the last entry to the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub payload_mass: f64,
    pub stages: Vec<StageSpec>,
    pub thrust_per_fuel_unit: f64,
}

impl Configuration {
    pub fn new(
        payload_mass: f64,
        stage_masses: &[f64],
        fuel_masses: &[f64],
        thrust_per_fuel_unit: f64,
    ) -> Result<Self, SimulationError> {
        if stage_masses.len() != fuel_masses.len() {
            return Err(SimulationError::InvalidConfiguration(format!(
                "{} stage masses but {} fuel masses",
                stage_masses.len(),
                fuel_masses.len()
            )));
        }

        let stages = stage_masses
            .iter()
            .zip(fuel_masses)
            .map(|(&mass, &fuel)| StageSpec { mass, fuel })
            .collect();

        let configuration = Configuration {
            payload_mass,
            stages,
            thrust_per_fuel_unit,
        };
        configuration.validate()?;
        Ok(configuration)
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        // The payload is all that is left once every stage is gone.
        if !self.payload_mass.is_finite() || self.payload_mass <= 0.0 {
            return Err(SimulationError::InvalidConfiguration(format!(
                "payload mass must be positive, got {}",
                self.payload_mass
            )));
        }
        check_non_negative("thrust per fuel unit", self.thrust_per_fuel_unit)?;
        for (index, stage) in self.stages.iter().enumerate() {
            check_non_negative(&format!("stage {index} mass"), stage.mass)?;
            check_non_negative(&format!("stage {index} fuel"), stage.fuel)?;
        }
        Ok(())
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn initial_fuel(&self) -> Vec<f64> {
        self.stages.iter().map(|stage| stage.fuel).collect()
    }
}

/// Settings that may change between runs or while a run is in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightSettings {
    pub tick_interval_ms: u64,
    pub fuel_burn_rate: f64, // kg per tick
    pub target_orbit_altitude: f64,
    pub autopilot: AutopilotMode,
    pub dynamics: DynamicsKind,
    pub initial_angle: f64, // degrees from local vertical
}

impl Default for FlightSettings {
    fn default() -> Self {
        FlightSettings {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            fuel_burn_rate: DEFAULT_FUEL_BURN_RATE,
            target_orbit_altitude: DEFAULT_TARGET_ORBIT_ALTITUDE,
            autopilot: AutopilotMode::Manual,
            dynamics: DynamicsKind::Reference,
            initial_angle: 0.0,
        }
    }
}

impl FlightSettings {
    /// Physics timestep in seconds. Equal to the wall-clock tick interval.
    pub fn delta_time(&self) -> f64 {
        self.tick_interval_ms as f64 / 1000.0
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        validate_tick_interval(self.tick_interval_ms)?;
        check_non_negative("fuel burn rate", self.fuel_burn_rate)?;
        validate_target_orbit_altitude(self.target_orbit_altitude)?;
        if !self.initial_angle.is_finite() {
            return Err(SimulationError::InvalidConfiguration(
                "initial angle must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn validate_tick_interval(tick_interval_ms: u64) -> Result<(), SimulationError> {
    if tick_interval_ms == 0 {
        return Err(SimulationError::InvalidConfiguration(
            "tick interval must be at least 1 ms".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_target_orbit_altitude(altitude: f64) -> Result<(), SimulationError> {
    if !altitude.is_finite() || altitude <= GRAVITY_TURN_START_ALTITUDE {
        return Err(SimulationError::InvalidConfiguration(format!(
            "target orbit altitude must be above {GRAVITY_TURN_START_ALTITUDE} m, got {altitude}"
        )));
    }
    Ok(())
}

pub fn check_non_negative(name: &str, value: f64) -> Result<(), SimulationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(SimulationError::InvalidConfiguration(format!(
            "{name} must be a finite non-negative number, got {value}"
        )));
    }
    Ok(())
}

/// Contents of a TOML settings file: a `[rocket]` table and an optional
/// `[flight]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsFile {
    pub rocket: Configuration,
    #[serde(default)]
    pub flight: FlightSettings,
}

impl SettingsFile {
    pub fn from_toml_str(toml_str: &str) -> Result<Self, SimulationError> {
        let settings: SettingsFile = toml::from_str(toml_str)?;
        settings.rocket.validate()?;
        settings.flight.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self, SimulationError> {
        let contents = fs::read_to_string(path).map_err(|source| SimulationError::ConfigFile {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_configuration_new() {
        let config = Configuration::new(10.0, &[5.0, 2.0], &[3.0, 1.0], 3500.0).unwrap();
        assert_eq!(config.stage_count(), 2);
        assert_eq!(config.initial_fuel(), vec![3.0, 1.0]);
        assert_relative_eq!(config.payload_mass, 10.0);
    }

    #[test]
    fn test_configuration_rejects_mismatched_lengths() {
        let result = Configuration::new(10.0, &[5.0, 2.0], &[3.0], 3500.0);
        assert!(matches!(
            result,
            Err(SimulationError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_configuration_rejects_negative_and_nan() {
        assert!(Configuration::new(-1.0, &[5.0], &[3.0], 3500.0).is_err());
        assert!(Configuration::new(10.0, &[5.0], &[f64::NAN], 3500.0).is_err());
        assert!(Configuration::new(0.0, &[], &[], 3500.0).is_err());
    }

    #[test]
    fn test_flight_settings_defaults() {
        let settings = FlightSettings::default();
        assert_eq!(settings.tick_interval_ms, 100);
        assert_relative_eq!(settings.delta_time(), 0.1);
        assert_eq!(settings.autopilot, AutopilotMode::Manual);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_target_altitude_must_be_above_turn_start() {
        assert!(validate_target_orbit_altitude(0.0).is_err());
        assert!(validate_target_orbit_altitude(f64::INFINITY).is_err());
        assert!(validate_target_orbit_altitude(150_000.0).is_ok());
    }

    #[test]
    fn test_settings_file_from_toml() {
        let toml_str = r#"
            [rocket]
            payload_mass = 10.0
            thrust_per_fuel_unit = 3500.0

            [[rocket.stages]]
            mass = 5.0
            fuel = 3.0

            [flight]
            tick_interval_ms = 50
            autopilot = "stable_orbit"
            dynamics = "optimized"
        "#;

        let settings = SettingsFile::from_toml_str(toml_str).unwrap();
        assert_eq!(settings.rocket.stages, vec![StageSpec { mass: 5.0, fuel: 3.0 }]);
        assert_eq!(settings.flight.tick_interval_ms, 50);
        assert_eq!(settings.flight.autopilot, AutopilotMode::StableOrbit);
        assert_eq!(settings.flight.dynamics, DynamicsKind::Optimized);
        assert_relative_eq!(settings.flight.fuel_burn_rate, DEFAULT_FUEL_BURN_RATE);
    }

    #[test]
    fn test_settings_file_rejects_bad_values() {
        let toml_str = r#"
            [rocket]
            payload_mass = 10.0
            thrust_per_fuel_unit = 3500.0
            stages = []

            [flight]
            tick_interval_ms = 0
        "#;
        assert!(matches!(
            SettingsFile::from_toml_str(toml_str),
            Err(SimulationError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            SettingsFile::from_toml_str("rocket = 3"),
            Err(SimulationError::ConfigParse(_))
        ));
    }
}
