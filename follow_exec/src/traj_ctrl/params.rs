//! Trajectory control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for trajectory control
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Params {

    // ---- LATERAL CONTROL ----

    /// Stanley cross-track gain, the `k` in `heading_err + atan(k * e / v)`.
    pub stanley_gain: f64,

    /// Speed added to the denominator of the cross-track term so that the
    /// steering demand stays bounded at low speed.
    ///
    /// Units: meters/second
    pub softening_ms: f64,

    /// Derivative gain applied to the wheel angle error.
    pub steer_damping_gain: f64,

    // ---- LONGITUDINAL CONTROL ----

    /// Proportional gain of the acceleration demand on the speed error.
    pub speed_k_p: f64,

    /// Derivative gain of the acceleration demand on the speed error.
    pub speed_k_d: f64,

    /// Cruising speed, further limited by the vehicle's gear dependant
    /// maximum.
    ///
    /// Units: meters/second
    pub nominal_speed_ms: f64,

    /// Speed floor used while creeping up to a stopping point.
    ///
    /// Units: meters/second
    pub creep_speed_ms: f64,

    /// Factor (>= 1) by which the braking distance to a stop is stretched.
    /// The stop profile decelerates at `max_decel / braking_margin`.
    pub braking_margin: f64,

    /// Remaining distance to a stopping point under which it is considered
    /// reached.
    ///
    /// Units: meters
    pub stop_tolerance_m: f64,

    /// Measured speed under which the vehicle is considered at rest.
    ///
    /// Units: meters/second
    pub stopped_speed_threshold_ms: f64,

    // ---- TIMING ----

    /// The control period.
    ///
    /// Units: seconds
    pub dt_s: f64,

    /// Total number of commands returned by `get_command_list`, including the
    /// live one.
    pub lookahead_steps: usize,

    /// Maximum number of ticks run by a path following simulation.
    pub max_sim_steps: usize,

    // ---- MONITORING ----

    /// The limit on lateral error. Above this limit the vehicle is considered
    /// lost and the path no longer valid.
    ///
    /// Units: meters
    pub lat_error_limit_m: f64,

    /// The limit on heading error. Above this limit the vehicle is considered
    /// lost and the path no longer valid.
    ///
    /// Units: radians
    pub head_error_limit_rad: f64
}

#[cfg(test)]
mod test {
    use crate::test_fixtures::shipped;

    #[test]
    fn test_shipped_params_parse() {
        let (p, v) = shipped();

        assert!(p.braking_margin >= 1.0);
        assert!(p.dt_s > 0.0);
        assert!(p.lookahead_steps >= 1);
        assert!(v.wheelbase_m > 0.0);
        assert!(v.max_steer_angle_rad > 0.0);
    }
}
