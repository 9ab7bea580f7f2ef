//! Flight dynamics math: one integration step and the gravity-turn
//! guidance law.
//!
//! Two interchangeable implementations exist. [`ReferenceDynamics`] follows
//! the formulas term by term on [`Vector2D`] values. [`OptimizedDynamics`]
//! works on bare scalars, shares trigonometric terms and skips work for
//! branches that do not need it. Both perform the same IEEE operations in
//! the same order, so their results are identical bit for bit.

use std::fmt::Debug;

use crate::constants::{
    EARTH_MU, EARTH_RADIUS, GRAVITY_TURN_FINAL_ANGLE, GRAVITY_TURN_INITIAL_ANGLE,
    GRAVITY_TURN_START_ALTITUDE, ORBIT_VELOCITY_TOLERANCE,
};
use crate::control::configuration::DynamicsKind;
use crate::utils::vector2d::Vector2D;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionInput {
    pub position: Vector2D,
    pub velocity: Vector2D,
    pub mass: f64,
    pub thrust: f64, // N
    pub angle: f64,  // degrees from local vertical
    pub delta_time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionOutput {
    pub position: Vector2D,
    pub velocity: Vector2D,
    pub speed: f64,
}

/// Result of the gravity-turn law for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitGuidance {
    /// Desired pitch in degrees, already offset by the Earth-angle bearing.
    pub target_angle: f64,
    /// Engine command. `None` leaves the engine as it is.
    pub engine_on: Option<bool>,
}

pub trait FlightDynamics: Debug + Send + Sync {
    /// One semi-implicit Euler step under thrust and inverse-square gravity.
    fn advance(&self, input: &MotionInput) -> MotionOutput;

    fn orbit_guidance(
        &self,
        position: Vector2D,
        velocity: Vector2D,
        target_orbit_altitude: f64,
    ) -> OrbitGuidance;
}

pub fn dynamics_for(kind: DynamicsKind) -> Box<dyn FlightDynamics> {
    match kind {
        DynamicsKind::Reference => Box::new(ReferenceDynamics),
        DynamicsKind::Optimized => Box::new(OptimizedDynamics),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceDynamics;

impl FlightDynamics for ReferenceDynamics {
    fn advance(&self, input: &MotionInput) -> MotionOutput {
        let r = input.position.magnitude();
        let radial = input.position.normalize();
        let prograde = radial.perpendicular();

        let angle = input.angle.to_radians();
        let thrust_direction = radial * angle.cos() + prograde * angle.sin();
        let thrust_vector = thrust_direction * input.thrust;

        let gravity_magnitude = EARTH_MU / (r * r);
        let gravity = radial * -gravity_magnitude;

        let acceleration = thrust_vector / input.mass + gravity;
        let velocity = input.velocity + acceleration * input.delta_time;
        let position = input.position + velocity * input.delta_time;

        MotionOutput {
            position,
            velocity,
            speed: velocity.magnitude(),
        }
    }

    fn orbit_guidance(
        &self,
        position: Vector2D,
        velocity: Vector2D,
        target_orbit_altitude: f64,
    ) -> OrbitGuidance {
        let r = position.magnitude();
        let current_altitude = r - EARTH_RADIUS;
        let gravity = EARTH_MU / (r * r);
        let speed = velocity.magnitude();

        let earth_angle = position.bearing();
        let speed_angle = velocity.bearing();
        let earth_angle_degrees = earth_angle.to_degrees();
        let offset_sin = (speed_angle - earth_angle).sin();

        let apogee = speed * speed * offset_sin * offset_sin / (2.0 * gravity) + current_altitude;

        let turn_span = target_orbit_altitude - GRAVITY_TURN_START_ALTITUDE;

        if apogee < GRAVITY_TURN_START_ALTITUDE {
            OrbitGuidance {
                target_angle: GRAVITY_TURN_INITIAL_ANGLE + earth_angle_degrees,
                engine_on: None,
            }
        } else if apogee < target_orbit_altitude {
            let ratio = (apogee - GRAVITY_TURN_START_ALTITUDE) / turn_span;
            OrbitGuidance {
                target_angle: GRAVITY_TURN_INITIAL_ANGLE
                    + (GRAVITY_TURN_FINAL_ANGLE - GRAVITY_TURN_INITIAL_ANGLE) * ratio
                    + earth_angle_degrees,
                engine_on: None,
            }
        } else {
            let required_velocity = (EARTH_MU / r).sqrt();
            let tangential_velocity = speed * offset_sin;
            let ratio =
                (apogee - target_orbit_altitude - GRAVITY_TURN_START_ALTITUDE) / turn_span;
            let in_band = tangential_velocity >= required_velocity
                && tangential_velocity <= required_velocity * ORBIT_VELOCITY_TOLERANCE;

            OrbitGuidance {
                target_angle: GRAVITY_TURN_FINAL_ANGLE * ratio
                    + GRAVITY_TURN_FINAL_ANGLE
                    + earth_angle_degrees,
                engine_on: Some(!in_band),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OptimizedDynamics;

impl FlightDynamics for OptimizedDynamics {
    fn advance(&self, input: &MotionInput) -> MotionOutput {
        let MotionInput {
            position: Vector2D { x, y },
            velocity: Vector2D { x: vx, y: vy },
            mass,
            thrust,
            angle,
            delta_time: dt,
        } = *input;

        let r = (x * x + y * y).sqrt();
        let nx = x / r;
        let ny = y / r;
        let (sin, cos) = angle.to_radians().sin_cos();
        let gravity = EARTH_MU / (r * r);

        // Prograde is (-ny, nx).
        let ax = (nx * cos - ny * sin) * thrust / mass - gravity * nx;
        let ay = (ny * cos + nx * sin) * thrust / mass - gravity * ny;

        let vx = vx + ax * dt;
        let vy = vy + ay * dt;

        MotionOutput {
            position: Vector2D::new(x + vx * dt, y + vy * dt),
            velocity: Vector2D::new(vx, vy),
            speed: (vx * vx + vy * vy).sqrt(),
        }
    }

    fn orbit_guidance(
        &self,
        position: Vector2D,
        velocity: Vector2D,
        target_orbit_altitude: f64,
    ) -> OrbitGuidance {
        let r = (position.x * position.x + position.y * position.y).sqrt();
        let speed = (velocity.x * velocity.x + velocity.y * velocity.y).sqrt();
        let earth_angle = -position.x.atan2(position.y);
        let offset_sin = (-velocity.x.atan2(velocity.y) - earth_angle).sin();

        let apogee = speed * speed * offset_sin * offset_sin / (2.0 * (EARTH_MU / (r * r)))
            + (r - EARTH_RADIUS);
        let earth_angle_degrees = earth_angle.to_degrees();
        let turn_span = target_orbit_altitude - GRAVITY_TURN_START_ALTITUDE;

        if apogee < GRAVITY_TURN_START_ALTITUDE {
            return OrbitGuidance {
                target_angle: GRAVITY_TURN_INITIAL_ANGLE + earth_angle_degrees,
                engine_on: None,
            };
        }

        if apogee < target_orbit_altitude {
            let ratio = (apogee - GRAVITY_TURN_START_ALTITUDE) / turn_span;
            return OrbitGuidance {
                target_angle: GRAVITY_TURN_INITIAL_ANGLE
                    + (GRAVITY_TURN_FINAL_ANGLE - GRAVITY_TURN_INITIAL_ANGLE) * ratio
                    + earth_angle_degrees,
                engine_on: None,
            };
        }

        let required_velocity = (EARTH_MU / r).sqrt();
        let tangential_velocity = speed * offset_sin;
        let ratio = (apogee - target_orbit_altitude - GRAVITY_TURN_START_ALTITUDE) / turn_span;

        OrbitGuidance {
            target_angle: GRAVITY_TURN_FINAL_ANGLE * ratio
                + GRAVITY_TURN_FINAL_ANGLE
                + earth_angle_degrees,
            engine_on: Some(
                !(tangential_velocity >= required_velocity
                    && tangential_velocity <= required_velocity * ORBIT_VELOCITY_TOLERANCE),
            ),
        }
    }
}
