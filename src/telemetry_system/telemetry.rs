use std::fmt::Write;
use std::sync::Mutex;

use crate::errors::ObserverError;

use super::observer::{RocketObserver, RunOutcome, TickSnapshot};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryData {
    pub ticks: u64,
    pub max_speed: f64,
    pub max_altitude: f64,
    pub separations: Vec<(usize, f64)>, // (stage index, elapsed time)
    pub last_snapshot: Option<TickSnapshot>,
    pub outcome: Option<RunOutcome>,
}

/// Observer that keeps the flight's key figures for an end-of-run summary.
#[derive(Debug, Default)]
pub struct Telemetry {
    data: Mutex<TelemetryData>,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(&self) -> TelemetryData {
        self.data.lock().map(|data| data.clone()).unwrap_or_default()
    }

    fn format_time(elapsed_time: f64) -> String {
        if elapsed_time >= 3600.0 {
            let hours = (elapsed_time / 3600.0).floor();
            let minutes = ((elapsed_time % 3600.0) / 60.0).floor();
            let seconds = elapsed_time % 60.0;
            format!("{:.0}h {:.0}m {:.2}s", hours, minutes, seconds)
        } else if elapsed_time >= 60.0 {
            let minutes = (elapsed_time / 60.0).floor();
            let seconds = elapsed_time % 60.0;
            format!("{:.0}m {:.2}s", minutes, seconds)
        } else {
            format!("{:.2}s", elapsed_time)
        }
    }

    fn format_altitude(altitude: f64) -> String {
        if altitude >= 1000.0 {
            format!("{:.2} km", altitude / 1000.0)
        } else {
            format!("{:.2} m", altitude)
        }
    }

    pub fn summary(&self) -> String {
        let data = self.data();
        let mut out = String::new();

        let _ = writeln!(out, "--- Flight Summary ---");
        let _ = writeln!(out, "Ticks: {}", data.ticks);
        let _ = writeln!(out, "Max Speed: {:.2} m/s", data.max_speed);
        let _ = writeln!(out, "Max Altitude: {}", Self::format_altitude(data.max_altitude));

        for (stage, time) in &data.separations {
            let _ = writeln!(out, "Stage {stage} separated at: {}", Self::format_time(*time));
        }

        if let Some(last) = &data.last_snapshot {
            let _ = writeln!(
                out,
                "Final state at {}: altitude {}, speed {:.2} m/s, mass {:.2} kg, {} stage(s) left",
                Self::format_time(last.elapsed_time),
                Self::format_altitude(last.altitude()),
                last.speed,
                last.mass,
                last.remaining_stages
            );
        }

        match data.outcome {
            Some(RunOutcome::GroundImpact) => {
                let _ = writeln!(out, "Outcome: ground impact");
            }
            Some(RunOutcome::Stopped) => {
                let _ = writeln!(out, "Outcome: stopped");
            }
            None => {
                let _ = writeln!(out, "Outcome: still flying");
            }
        }

        out
    }

    fn with_data(&self, update: impl FnOnce(&mut TelemetryData)) -> Result<(), ObserverError> {
        let mut data = self
            .data
            .lock()
            .map_err(|_| ObserverError("telemetry lock poisoned".to_string()))?;
        update(&mut data);
        Ok(())
    }
}

impl RocketObserver for Telemetry {
    fn on_tick(&self, snapshot: &TickSnapshot) -> Result<(), ObserverError> {
        self.with_data(|data| {
            data.ticks += 1;
            data.max_speed = data.max_speed.max(snapshot.speed);
            data.max_altitude = data.max_altitude.max(snapshot.altitude());
            data.last_snapshot = Some(snapshot.clone());
        })
    }

    fn on_stage_separation(&self, stage_index: usize) -> Result<(), ObserverError> {
        self.with_data(|data| {
            let time = data
                .last_snapshot
                .as_ref()
                .map_or(0.0, |snapshot| snapshot.elapsed_time);
            data.separations.push((stage_index, time));
        })
    }

    fn on_run_finished(&self, outcome: RunOutcome) -> Result<(), ObserverError> {
        self.with_data(|data| data.outcome = Some(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::EARTH_RADIUS;
    use crate::utils::vector2d::Vector2D;
    use approx::assert_relative_eq;

    fn snapshot(tick: u64, altitude: f64, speed: f64) -> TickSnapshot {
        TickSnapshot {
            tick,
            elapsed_time: tick as f64 * 0.1,
            mass: 18.0,
            speed,
            position: Vector2D::new(0.0, EARTH_RADIUS + altitude),
            velocity: Vector2D::new(0.0, speed),
            angle: 0.0,
            remaining_stages: 1,
            fuel: vec![3.0],
            initial_fuel: vec![3.0],
            engine_on: true,
        }
    }

    #[test]
    fn test_tracks_maxima() {
        let telemetry = Telemetry::new();
        telemetry.on_tick(&snapshot(1, 100.0, 20.0)).unwrap();
        telemetry.on_tick(&snapshot(2, 1500.0, 15.0)).unwrap();
        telemetry.on_tick(&snapshot(3, 900.0, 5.0)).unwrap();

        let data = telemetry.data();
        assert_eq!(data.ticks, 3);
        assert_relative_eq!(data.max_speed, 20.0);
        assert_relative_eq!(data.max_altitude, 1500.0);
        assert_eq!(data.last_snapshot.map(|s| s.tick), Some(3));
    }

    #[test]
    fn test_records_separation_time_and_outcome() {
        let telemetry = Telemetry::new();
        telemetry.on_tick(&snapshot(299, 100.0, 20.0)).unwrap();
        telemetry.on_stage_separation(0).unwrap();
        telemetry.on_run_finished(RunOutcome::GroundImpact).unwrap();

        let data = telemetry.data();
        assert_eq!(data.separations.len(), 1);
        assert_eq!(data.separations[0].0, 0);
        assert_relative_eq!(data.separations[0].1, 29.9, epsilon = 1e-9);
        assert_eq!(data.outcome, Some(RunOutcome::GroundImpact));
    }

    #[test]
    fn test_summary() {
        let telemetry = Telemetry::new();
        telemetry.on_tick(&snapshot(1, 2500.0, 120.0)).unwrap();
        telemetry.on_run_finished(RunOutcome::Stopped).unwrap();

        let summary = telemetry.summary();
        assert!(summary.contains("Max Altitude: 2.50 km"));
        assert!(summary.contains("Max Speed: 120.00 m/s"));
        assert!(summary.contains("Outcome: stopped"));
    }

    #[test]
    fn test_format_time() {
        assert_eq!(Telemetry::format_time(12.5), "12.50s");
        assert_eq!(Telemetry::format_time(75.0), "1m 15.00s");
        assert_eq!(Telemetry::format_time(3725.0), "1h 2m 5.00s");
    }
}
