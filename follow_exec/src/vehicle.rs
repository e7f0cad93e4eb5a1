//! # Vehicle model
//!
//! The fixed kinematic parameters of the vehicle being controlled. The
//! controller only reads these, it never modifies them.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use util::maths::clamp_abs;

use crate::pose::{Gear, Pose2D};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters describing the vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleModel {

    // ---- GEOMETRY ----

    /// Distance between the front and rear axles. The vehicle reference
    /// point lies midway between them.
    ///
    /// Units: meters
    pub wheelbase_m: f64,

    // ---- CAPABILITIES ----

    /// Maximum absolute front wheel steering angle
    ///
    /// Units: radians
    pub max_steer_angle_rad: f64,

    /// Maximum speed when driving forwards
    ///
    /// Units: meters/second
    pub max_forward_speed_ms: f64,

    /// Maximum speed (magnitude) when reversing
    ///
    /// Units: meters/second
    pub max_reverse_speed_ms: f64,

    /// Maximum acceleration
    ///
    /// Units: meters/second^2
    pub max_accel_ms2: f64,

    /// Maximum deceleration (magnitude)
    ///
    /// Units: meters/second^2
    pub max_decel_ms2: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl VehicleModel {
    /// Position of the front axle centre.
    pub fn front_axle(&self, pose: &Pose2D) -> Vector2<f64> {
        pose.project(0.5 * self.wheelbase_m)
    }

    /// Position of the rear axle centre.
    pub fn rear_axle(&self, pose: &Pose2D) -> Vector2<f64> {
        pose.project(-0.5 * self.wheelbase_m)
    }

    /// The fake front axle used while reversing.
    ///
    /// When backing up the rear axle leads, so the front axle is reflected
    /// through the vehicle centre onto it. The same lateral control law can
    /// then be applied in both gears.
    pub fn fake_front_axle(&self, pose: &Pose2D) -> Vector2<f64> {
        2.0 * pose.position() - self.front_axle(pose)
    }

    /// The point lateral control is computed for in the given gear.
    pub fn reference_axle(&self, pose: &Pose2D, gear: Gear) -> Vector2<f64> {
        match gear {
            Gear::Forward => self.front_axle(pose),
            Gear::Reverse => self.fake_front_axle(pose),
        }
    }

    /// Maximum speed magnitude in the given gear.
    pub fn max_speed(&self, gear: Gear) -> f64 {
        match gear {
            Gear::Forward => self.max_forward_speed_ms,
            Gear::Reverse => self.max_reverse_speed_ms,
        }
    }

    /// Limit a steering angle to the vehicle's capability.
    pub fn clamp_steer(&self, wheel_angle_rad: f64) -> f64 {
        clamp_abs(wheel_angle_rad, self.max_steer_angle_rad)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_fixtures::vehicle;
    use std::f64::consts::PI;

    #[test]
    fn test_axles() {
        let v = vehicle();
        let pose = Pose2D::new(1.0, 2.0, PI / 2.0);

        assert!((v.front_axle(&pose) - Vector2::new(1.0, 3.0)).norm() < 1e-12);
        assert!((v.rear_axle(&pose) - Vector2::new(1.0, 1.0)).norm() < 1e-12);
        assert!((v.fake_front_axle(&pose) - v.rear_axle(&pose)).norm() < 1e-12);
        assert!((v.reference_axle(&pose, Gear::Forward) - v.front_axle(&pose)).norm() < 1e-12);
    }

    #[test]
    fn test_fake_axle_is_reflected_front_axle() {
        let v = vehicle();

        for &(x, y, h) in &[(0.0, 0.0, 0.0), (3.5, -1.0, 2.1), (-4.0, 7.0, -2.9)] {
            let pose = Pose2D::new(x, y, h);
            let front = v.reference_axle(&pose, Gear::Forward);
            let fake = v.reference_axle(&pose.rotated_pi(), Gear::Reverse);
            assert!((front - fake).norm() < 1e-9);
        }
    }

    #[test]
    fn test_limits() {
        let v = vehicle();
        assert_eq!(v.clamp_steer(1.0), 0.6);
        assert_eq!(v.clamp_steer(-1.0), -0.6);
        assert_eq!(v.clamp_steer(0.1), 0.1);
        assert_eq!(v.max_speed(Gear::Reverse), 1.5);
    }
}
