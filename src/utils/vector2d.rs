use std::ops::{Add, Div, Mul};

/// Position or velocity in the planet-centered frame. The planet center is
/// the origin and the launch site sits on the +y axis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector2D {
    pub x: f64,
    pub y: f64,
}

impl Vector2D {
    pub const ZERO: Vector2D = Vector2D { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Vector2D { x, y }
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Unit vector along `self`. The zero vector has no direction and is
    /// returned unchanged.
    pub fn normalize(&self) -> Self {
        let mag = self.magnitude();
        if mag == 0.0 {
            *self
        } else {
            Vector2D::new(self.x / mag, self.y / mag)
        }
    }

    /// Rotates by +90°: `(x, y) -> (-y, x)`. Applied to the local vertical
    /// it yields the prograde direction.
    pub fn perpendicular(&self) -> Self {
        Vector2D::new(-self.y, self.x)
    }

    /// Bearing measured from the +y axis, counter-clockwise positive, in
    /// radians. Zero at the launch site.
    pub fn bearing(&self) -> f64 {
        -self.x.atan2(self.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vector2D {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Vector2D::new(self.x + other.x, self.y + other.y)
    }
}

impl Mul<f64> for Vector2D {
    type Output = Self;

    fn mul(self, scalar: f64) -> Self {
        Vector2D::new(self.x * scalar, self.y * scalar)
    }
}

impl Div<f64> for Vector2D {
    type Output = Self;

    fn div(self, scalar: f64) -> Self {
        Vector2D::new(self.x / scalar, self.y / scalar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_perpendicular_is_counter_clockwise() {
        let up = Vector2D::new(0.0, 1.0);
        assert_eq!(up.perpendicular(), Vector2D::new(-1.0, 0.0));
        assert_eq!(up.perpendicular().perpendicular(), Vector2D::new(0.0, -1.0));
    }

    #[test]
    fn test_bearing() {
        assert_eq!(Vector2D::new(0.0, 5.0).bearing(), 0.0);
        assert_relative_eq!(Vector2D::new(-3.0, 0.0).bearing(), FRAC_PI_2);
        assert_relative_eq!(Vector2D::new(3.0, 0.0).bearing(), -FRAC_PI_2);
    }

    #[test]
    fn test_normalize_zero_vector() {
        assert_eq!(Vector2D::ZERO.normalize(), Vector2D::ZERO);
        assert_relative_eq!(Vector2D::new(3.0, 4.0).normalize().magnitude(), 1.0);
    }
}
