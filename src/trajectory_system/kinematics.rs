use crate::constants::EARTH_RADIUS;
use crate::utils::vector2d::Vector2D;

use super::dynamics::{FlightDynamics, MotionInput};

/// Position, velocity and derived speed of the rocket in the
/// planet-centered frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kinematics {
    pub position: Vector2D,
    pub velocity: Vector2D,
    pub speed: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Airborne,
    GroundImpact,
}

impl Kinematics {
    pub fn at_launch_site() -> Self {
        Kinematics {
            position: Vector2D::new(0.0, EARTH_RADIUS),
            velocity: Vector2D::ZERO,
            speed: 0.0,
        }
    }

    pub fn get_altitude(&self) -> f64 {
        self.position.magnitude() - EARTH_RADIUS
    }

    /// Advances one fixed step. A step that ends at or below the surface
    /// lands the rocket: it is clamped onto the surface along its radial
    /// direction with zero velocity.
    pub fn update(
        &mut self,
        dynamics: &dyn FlightDynamics,
        total_mass: f64,
        thrust_magnitude: f64,
        angle: f64,
        delta_time: f64,
    ) -> StepOutcome {
        let output = dynamics.advance(&MotionInput {
            position: self.position,
            velocity: self.velocity,
            mass: total_mass,
            thrust: thrust_magnitude,
            angle,
            delta_time,
        });

        self.position = output.position;
        self.velocity = output.velocity;
        self.speed = output.speed;

        if self.position.magnitude() <= EARTH_RADIUS {
            self.land();
            StepOutcome::GroundImpact
        } else {
            StepOutcome::Airborne
        }
    }

    fn land(&mut self) {
        self.position = surface_point(self.position);
        self.velocity = Vector2D::ZERO;
        self.speed = 0.0;
    }
}

/// Doublings of the minor-component nudge before the search gives up.
const SNAP_ROUNDS: u32 = 24;
/// Ulps tried on either side of the re-solved major component.
const SNAP_MAJOR_SPAN: i64 = 2;

/// Projects `position` radially onto the planet surface. The result has a
/// magnitude of exactly `EARTH_RADIUS`.
pub fn surface_point(position: Vector2D) -> Vector2D {
    let distance = position.magnitude();
    if distance == 0.0 || !distance.is_finite() {
        return Vector2D::new(0.0, EARTH_RADIUS);
    }

    let surface = position / distance * EARTH_RADIUS;
    if surface.magnitude() == EARTH_RADIUS {
        return surface;
    }
    snap_to_surface(surface).unwrap_or(surface)
}

/// Searches the floating-point neighbourhood of `surface` for a point whose
/// magnitude rounds to exactly `EARTH_RADIUS`. The minor component is nudged
/// by growing strides and the major one is re-solved from it, then tried a
/// few ulps either way. The largest nudge is about a centimetre.
fn snap_to_surface(surface: Vector2D) -> Option<Vector2D> {
    let x_major = surface.x.abs() >= surface.y.abs();
    let (major, minor) = if x_major {
        (surface.x, surface.y)
    } else {
        (surface.y, surface.x)
    };
    let compose = |major_abs: f64, minor_abs: f64| {
        let (major, minor) = (major_abs.copysign(major), minor_abs.copysign(minor));
        if x_major {
            Vector2D::new(major, minor)
        } else {
            Vector2D::new(minor, major)
        }
    };

    let stride = EARTH_RADIUS * f64::EPSILON;
    let nudges = std::iter::once(0.0).chain((0..SNAP_ROUNDS).flat_map(|round| {
        let nudge = stride * f64::from(1u32 << round);
        [nudge, -nudge]
    }));

    for nudge in nudges {
        let minor_abs = (minor.abs() + nudge).max(0.0);
        let major_abs = (EARTH_RADIUS * EARTH_RADIUS - minor_abs * minor_abs).sqrt();
        for steps in -SNAP_MAJOR_SPAN..=SNAP_MAJOR_SPAN {
            let candidate = compose(offset_ulps(major_abs, steps), minor_abs);
            if candidate.magnitude() == EARTH_RADIUS {
                return Some(candidate);
            }
        }
    }
    None
}

/// Moves a non-negative finite `value` by `steps` units in the last place.
fn offset_ulps(value: f64, steps: i64) -> f64 {
    let bits = (value.to_bits() as i64).saturating_add(steps).max(0);
    f64::from_bits(bits as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory_system::dynamics::ReferenceDynamics;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f64::consts::PI;

    #[test]
    fn test_launch_site() {
        let kinematics = Kinematics::at_launch_site();
        assert_eq!(kinematics.get_altitude(), 0.0);
        assert_eq!(kinematics.position.normalize(), Vector2D::new(0.0, 1.0));
    }

    #[test]
    fn test_free_fall_from_pad_lands_immediately() {
        let mut kinematics = Kinematics::at_launch_site();
        let outcome = kinematics.update(&ReferenceDynamics, 10.0, 0.0, 0.0, 0.1);

        assert_eq!(outcome, StepOutcome::GroundImpact);
        assert_eq!(kinematics.position.magnitude(), EARTH_RADIUS);
        assert_eq!(kinematics.position, Vector2D::new(0.0, EARTH_RADIUS));
        assert_eq!(kinematics.velocity, Vector2D::ZERO);
        assert_eq!(kinematics.speed, 0.0);
    }

    #[test]
    fn test_climb_stays_airborne() {
        let mut kinematics = Kinematics::at_launch_site();
        let outcome = kinematics.update(&ReferenceDynamics, 18.0, 350.0, 0.0, 0.1);

        assert_eq!(outcome, StepOutcome::Airborne);
        assert!(kinematics.get_altitude() > 0.0);
        assert_relative_eq!(kinematics.speed, kinematics.velocity.magnitude());
    }

    #[test]
    fn test_surface_point_keeps_direction() {
        let inside = Vector2D::new(-3_000_000.0, 5_000_000.0);
        let surface = surface_point(inside);

        assert_eq!(surface.magnitude(), EARTH_RADIUS);
        assert_relative_eq!(surface.bearing(), inside.bearing(), epsilon = 1e-9);
    }

    #[test]
    fn test_surface_point_is_exact_in_every_direction() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut bearings: Vec<f64> = [20.0_f64, 30.0, 45.0, 60.0, 75.0, -33.0, 135.0, -170.0]
            .iter()
            .map(|degrees| degrees.to_radians())
            .collect();
        bearings.extend((0..2000).map(|_| rng.gen_range(-PI..PI)));

        for bearing in bearings {
            let depth = rng.gen_range(0.0..50.0);
            let inside = Vector2D::new(-bearing.sin(), bearing.cos()) * (EARTH_RADIUS - depth);
            let surface = surface_point(inside);

            assert_eq!(surface.magnitude(), EARTH_RADIUS, "bearing {bearing}");
            assert_relative_eq!(surface.bearing(), inside.bearing(), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_surface_point_near_the_axes() {
        for inside in [
            Vector2D::new(1.0, EARTH_RADIUS - 3.0),
            Vector2D::new(-0.25, EARTH_RADIUS - 0.5),
            Vector2D::new(EARTH_RADIUS - 2.0, 1000.0),
            Vector2D::new(0.0, -EARTH_RADIUS + 1.0),
        ] {
            let surface = surface_point(inside);
            assert_eq!(surface.magnitude(), EARTH_RADIUS, "{inside:?}");
            assert_relative_eq!(surface.bearing(), inside.bearing(), epsilon = 1e-9);
        }
    }
}
