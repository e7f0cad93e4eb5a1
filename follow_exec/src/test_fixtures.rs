//! Shared fixtures for the unit tests.

use crate::{traj_ctrl::Params, vehicle::VehicleModel};

/// A small car with a 2 m wheelbase.
pub(crate) fn vehicle() -> VehicleModel {
    VehicleModel {
        wheelbase_m: 2.0,
        max_steer_angle_rad: 0.6,
        max_forward_speed_ms: 3.0,
        max_reverse_speed_ms: 1.5,
        max_accel_ms2: 1.0,
        max_decel_ms2: 2.0,
    }
}

/// Controller parameters with the steering damping disabled.
pub(crate) fn params() -> Params {
    Params {
        stanley_gain: 1.0,
        softening_ms: 1.0,
        steer_damping_gain: 0.0,
        speed_k_p: 1.0,
        speed_k_d: 0.0,
        nominal_speed_ms: 2.0,
        creep_speed_ms: 0.2,
        braking_margin: 1.5,
        stop_tolerance_m: 0.05,
        stopped_speed_threshold_ms: 0.01,
        dt_s: 0.1,
        lookahead_steps: 5,
        max_sim_steps: 2000,
        lat_error_limit_m: 2.0,
        head_error_limit_rad: 1.0,
    }
}

/// The parameters shipped in the params directory.
pub(crate) fn shipped() -> (Params, VehicleModel) {
    let p: Params = util::params::from_str(include_str!("../../params/traj_ctrl.toml")).unwrap();
    let v: VehicleModel = util::params::from_str(include_str!("../../params/vehicle.toml")).unwrap();

    (p, v)
}

/// Every parameter set the end-to-end scenarios are run with.
pub(crate) fn all() -> Vec<(Params, VehicleModel)> {
    vec![(params(), vehicle()), shipped()]
}
