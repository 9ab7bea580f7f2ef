use crate::constants::{MAX_ANGLE_CHANGE_RATE, MAX_DISTANCE_ANGLE};
use crate::trajectory_system::dynamics::FlightDynamics;
use crate::trajectory_system::kinematics::Kinematics;

use super::configuration::AutopilotMode;

/// What the autopilot wants for the coming tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuidanceCommand {
    pub angle: f64,
    /// `None` leaves the engine state untouched.
    pub engine_on: Option<bool>,
}

/// Pitch autopilot. Stateless between ticks: every decision is taken from
/// the current kinematics and the settings in force.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuidanceSystem {
    pub mode: AutopilotMode,
    pub target_orbit_altitude: f64,
    pub max_angle_change_rate: f64, // degrees per second
}

impl GuidanceSystem {
    pub fn new(mode: AutopilotMode, target_orbit_altitude: f64) -> Self {
        GuidanceSystem {
            mode,
            target_orbit_altitude,
            max_angle_change_rate: MAX_ANGLE_CHANGE_RATE,
        }
    }

    pub fn update(
        &self,
        current_angle: f64,
        kinematics: &Kinematics,
        dynamics: &dyn FlightDynamics,
        delta_time: f64,
    ) -> GuidanceCommand {
        match self.mode {
            AutopilotMode::Manual => GuidanceCommand {
                angle: current_angle,
                engine_on: None,
            },
            AutopilotMode::MaxDistance => GuidanceCommand {
                angle: self.approach_target_angle(current_angle, MAX_DISTANCE_ANGLE, delta_time),
                engine_on: None,
            },
            AutopilotMode::StableOrbit => {
                let guidance = dynamics.orbit_guidance(
                    kinematics.position,
                    kinematics.velocity,
                    self.target_orbit_altitude,
                );
                GuidanceCommand {
                    angle: self.approach_target_angle(
                        current_angle,
                        guidance.target_angle,
                        delta_time,
                    ),
                    engine_on: guidance.engine_on,
                }
            }
        }
    }

    /// Moves `current` toward `target` by at most `max_angle_change_rate *
    /// delta_time` degrees, snapping onto the target once it is within reach.
    pub fn approach_target_angle(&self, current: f64, target: f64, delta_time: f64) -> f64 {
        let difference = normalize_angle(target - current);
        let max_change = self.max_angle_change_rate * delta_time;

        let next = if difference.abs() > max_change {
            current + difference.signum() * max_change
        } else {
            target
        };
        normalize_angle(next)
    }
}

/// Wraps an angle in degrees into (-180, 180].
pub fn normalize_angle(angle: f64) -> f64 {
    let angle = angle % 360.0;
    if angle <= -180.0 {
        angle + 360.0
    } else if angle > 180.0 {
        angle - 360.0
    } else {
        angle
    }
}

/// Smallest absolute difference between two angles in degrees.
pub fn angle_between(a: f64, b: f64) -> f64 {
    normalize_angle(a - b).abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{EARTH_MU, EARTH_RADIUS};
    use crate::trajectory_system::dynamics::ReferenceDynamics;
    use crate::utils::vector2d::Vector2D;
    use approx::assert_relative_eq;

    fn climbing(altitude: f64, vertical_speed: f64) -> Kinematics {
        Kinematics {
            position: Vector2D::new(0.0, EARTH_RADIUS + altitude),
            velocity: Vector2D::new(0.0, vertical_speed),
            speed: vertical_speed.abs(),
        }
    }

    #[test]
    fn test_normalize_angle() {
        assert_eq!(normalize_angle(0.0), 0.0);
        assert_eq!(normalize_angle(180.0), 180.0);
        assert_eq!(normalize_angle(-180.0), 180.0);
        assert_eq!(normalize_angle(190.0), -170.0);
        assert_eq!(normalize_angle(-190.0), 170.0);
        assert_eq!(normalize_angle(720.0 + 45.0), 45.0);
    }

    #[test]
    fn test_approach_is_rate_limited() {
        let guidance = GuidanceSystem::new(AutopilotMode::MaxDistance, 200_000.0);

        assert_relative_eq!(guidance.approach_target_angle(0.0, 45.0, 0.1), 1.0);
        assert_relative_eq!(guidance.approach_target_angle(0.0, -45.0, 0.1), -1.0);
        assert_eq!(guidance.approach_target_angle(44.5, 45.0, 0.1), 45.0);
    }

    #[test]
    fn test_approach_takes_short_way_round() {
        let guidance = GuidanceSystem::new(AutopilotMode::MaxDistance, 200_000.0);

        assert_relative_eq!(guidance.approach_target_angle(175.0, -175.0, 0.1), 176.0);
        assert_relative_eq!(guidance.approach_target_angle(179.5, -179.5, 0.1), -179.5);
    }

    #[test]
    fn test_manual_mode_keeps_angle() {
        let guidance = GuidanceSystem::new(AutopilotMode::Manual, 200_000.0);
        let command = guidance.update(33.0, &climbing(1000.0, 50.0), &ReferenceDynamics, 0.1);

        assert_eq!(
            command,
            GuidanceCommand {
                angle: 33.0,
                engine_on: None
            }
        );
    }

    #[test]
    fn test_max_distance_converges_on_45_degrees() {
        let guidance = GuidanceSystem::new(AutopilotMode::MaxDistance, 200_000.0);
        let kinematics = climbing(1000.0, 50.0);
        let mut angle = 0.0;

        for _ in 0..44 {
            let next = guidance.update(angle, &kinematics, &ReferenceDynamics, 0.1).angle;
            assert!(angle_between(next, angle) <= 1.0 + 1e-12);
            angle = next;
        }
        assert!(angle < 45.0);

        for _ in 0..2 {
            angle = guidance.update(angle, &kinematics, &ReferenceDynamics, 0.1).angle;
        }
        assert_eq!(angle, 45.0);
    }

    #[test]
    fn test_stable_orbit_turns_with_altitude() {
        let guidance = GuidanceSystem::new(AutopilotMode::StableOrbit, 200_000.0);

        let low = guidance.update(0.0, &climbing(1_000.0, 100.0), &ReferenceDynamics, 1.0);
        assert_relative_eq!(low.angle, 0.45, epsilon = 1e-9);
        assert_eq!(low.engine_on, None);

        let high = guidance.update(0.0, &climbing(100_000.0, 100.0), &ReferenceDynamics, 1.0);
        assert_relative_eq!(high.angle, 10.0);
    }

    #[test]
    fn test_stable_orbit_cuts_engine_at_orbital_speed() {
        let guidance = GuidanceSystem::new(AutopilotMode::StableOrbit, 200_000.0);
        let r = EARTH_RADIUS + 250_000.0;
        let orbital = (EARTH_MU / r).sqrt();
        let kinematics = Kinematics {
            position: Vector2D::new(0.0, r),
            velocity: Vector2D::new(-orbital * 1.002, 0.0),
            speed: orbital * 1.002,
        };

        let command = guidance.update(90.0, &kinematics, &ReferenceDynamics, 0.1);
        assert_eq!(command.engine_on, Some(false));
        assert!(angle_between(command.angle, 90.0) <= 1.0 + 1e-12);
    }
}
