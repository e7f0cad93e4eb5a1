//! # Trajectory controllers module
//!
//! This module provides the control laws used by TrajCtrl:
//!
//! - The Stanley steering law, which combines the heading error and the
//!   cross-track error at the reference axle into a wheel angle demand.
//! - The stop profile, which caps the speed when approaching a stopping
//!   point so that the vehicle comes to rest on it with bounded deceleration.
//! - Fixed period PD controllers for the wheel angle damping term and the
//!   acceleration demand.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
use crate::{pose::Gear, vehicle::VehicleModel};
use util::maths::clamp;

use super::{ClosestPoint, Params};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A PD controller run at a fixed period.
#[derive(Debug, Serialize, Clone)]
pub struct PdController {
    /// Proportional gain
    k_p: f64,

    /// Dervative gain
    k_d: f64,

    /// Previous error, `None` after a reset
    prev_error: Option<f64>,
}

/// The trajectory controllers
#[derive(Debug, Serialize, Clone)]
pub struct TrajControllers {
    /// Damping on the wheel angle error
    steer_ctrl: PdController,

    /// Acceleration demand from the speed error
    speed_ctrl: PdController,
}

/// Output of the steering law for one tick.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SteerDemand {
    /// Undamped Stanley wheel angle, after saturation
    pub stanley_rad: f64,

    /// Final wheel angle demand
    pub wheel_angle_rad: f64,

    /// True if the demand was saturated by the vehicle's steering limit
    pub saturated: bool,
}

/// Speed shaping profile used near stopping points.
///
/// Within the look-back window of a stop the speed is capped at
/// `sqrt(2 * decel * r)` where `r` is the remaining distance, floored at the
/// creep speed until the stop tolerance is reached, at which point the cap
/// drops to zero.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StopProfile {
    /// Deceleration the profile is built for
    ///
    /// Units: meters/second^2
    pub decel_ms2: f64,

    /// Cruise speed in each gear
    pub forward_speed_ms: f64,
    pub reverse_speed_ms: f64,

    pub creep_speed_ms: f64,
    pub stop_tolerance_m: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PdController {

    /// Create a new controller with the given gains.
    pub fn new(k_p: f64, k_d: f64) -> Self {
        Self {
            k_p,
            k_d,
            prev_error: None,
        }
    }

    /// Get the value of the controller for the given error.
    ///
    /// If there is no previous error (first call after a reset) or the period
    /// is not positive the derivative is taken as zero, avoiding a spike when
    /// the reference jumps. Non-finite errors are not kept in the history.
    pub fn get(&mut self, error: f64, dt_s: f64) -> f64 {
        let deriv = match self.prev_error {
            Some(e) if dt_s > 0.0 => (error - e) / dt_s,
            _ => 0.0,
        };

        self.prev_error = if error.is_finite() { Some(error) } else { None };

        self.k_p * error + self.k_d * deriv
    }

    /// Forget the error history.
    pub fn reset(&mut self) {
        self.prev_error = None;
    }

    pub fn prev_error(&self) -> Option<f64> {
        self.prev_error
    }
}

impl TrajControllers {

    /// Create a new instance of the controllers from the parameters
    pub fn new(params: &Params) -> Self {
        Self {
            steer_ctrl: PdController::new(0.0, params.steer_damping_gain),
            speed_ctrl: PdController::new(params.speed_k_p, params.speed_k_d),
        }
    }

    /// Reset the error history of both controllers, done on every mode
    /// transition.
    pub fn reset(&mut self) {
        self.steer_ctrl.reset();
        self.speed_ctrl.reset();
    }

    /// Previous wheel angle error, if any.
    pub fn prev_wheel_angle_error(&self) -> Option<f64> {
        self.steer_ctrl.prev_error()
    }

    /// Previous speed error, if any.
    pub fn prev_speed_error(&self) -> Option<f64> {
        self.speed_ctrl.prev_error()
    }

    /// Get the wheel angle demand for the current errors.
    ///
    /// `wheel_angle_rad` is the measured wheel angle and `speed_ms` the
    /// measured (signed) speed of the vehicle.
    pub fn get_steer_demand(
        &mut self,
        errors: &ClosestPoint,
        gear: Gear,
        wheel_angle_rad: f64,
        speed_ms: f64,
        params: &Params,
        vehicle: &VehicleModel,
    ) -> SteerDemand {
        // The law is written for a vehicle travelling along its heading. When
        // reversing the fake front axle leads and the yaw response to the
        // wheels is inverted, hence the gear sign.
        let stanley = gear.sign()
            * stanley_angle(
                errors.heading_error_rad,
                errors.cross_track_error_m,
                speed_ms.abs(),
                params.stanley_gain,
                params.softening_ms,
            );
        let stanley_rad = vehicle.clamp_steer(stanley);

        let wheel_angle_err = stanley_rad - wheel_angle_rad;
        let damping = self.steer_ctrl.get(wheel_angle_err, params.dt_s);

        let raw = stanley_rad + damping;
        let wheel_angle_rad = vehicle.clamp_steer(raw);

        SteerDemand {
            stanley_rad,
            wheel_angle_rad,
            saturated: stanley != stanley_rad || raw != wheel_angle_rad,
        }
    }

    /// Get the acceleration demand to reach the target speed magnitude.
    pub fn get_accel_demand(
        &mut self,
        target_speed_ms: f64,
        speed_ms: f64,
        params: &Params,
        vehicle: &VehicleModel,
    ) -> f64 {
        let speed_err = target_speed_ms.abs() - speed_ms.abs();
        let accel = self.speed_ctrl.get(speed_err, params.dt_s);

        clamp(&accel, &-vehicle.max_decel_ms2, &vehicle.max_accel_ms2)
    }
}

impl StopProfile {
    /// Build the profile from the controller and vehicle parameters.
    pub fn new(params: &Params, vehicle: &VehicleModel) -> Self {
        let margin = params.braking_margin.max(1.0);

        Self {
            decel_ms2: (vehicle.max_decel_ms2 / margin).max(std::f64::EPSILON),
            forward_speed_ms: params.nominal_speed_ms.min(vehicle.max_speed(Gear::Forward)).max(0.0),
            reverse_speed_ms: params.nominal_speed_ms.min(vehicle.max_speed(Gear::Reverse)).max(0.0),
            creep_speed_ms: params.creep_speed_ms.max(0.0),
            stop_tolerance_m: params.stop_tolerance_m.max(0.0),
        }
    }

    /// Cruise speed magnitude for the gear.
    pub fn cruise_speed(&self, gear: Gear) -> f64 {
        match gear {
            Gear::Forward => self.forward_speed_ms,
            Gear::Reverse => self.reverse_speed_ms,
        }
    }

    /// Distance before a stopping point over which the profile applies, i.e.
    /// the distance needed to stop from cruise speed.
    pub fn lookback_m(&self, gear: Gear) -> f64 {
        self.cruise_speed(gear).powi(2) / (2.0 * self.decel_ms2)
    }

    /// Speed cap at the given remaining distance to the stopping point.
    pub fn speed_cap(&self, remaining_m: f64) -> f64 {
        if remaining_m <= self.stop_tolerance_m {
            return 0.0;
        }

        (2.0 * self.decel_ms2 * remaining_m)
            .sqrt()
            .max(self.creep_speed_ms)
    }
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// The Stanley steering law.
///
/// Heading error is positive when the path points anticlockwise of the
/// direction of travel, cross-track error is positive when the reference
/// point lies to the right of the path. A positive output turns the vehicle
/// anticlockwise.
pub fn stanley_angle(
    heading_error_rad: f64,
    cross_track_error_m: f64,
    speed_ms: f64,
    gain: f64,
    softening_ms: f64,
) -> f64 {
    let denom = speed_ms.abs() + softening_ms.max(0.0);

    // Both zero gives atan2(0, 0) = 0, but keep a tiny floor so a non-zero
    // error at rest still steers towards the path.
    heading_error_rad + (gain * cross_track_error_m).atan2(denom.max(1e-6))
}
