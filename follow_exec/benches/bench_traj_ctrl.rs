//! # Trajectory Control Benchmark

use criterion::{criterion_group, criterion_main, Criterion};

use follow_lib::{
    path::Path,
    pose::{Gear, Pose2D},
    traj_ctrl::{ConsolidatedPath, Params, StopProfile, TrajCtrl},
    vehicle::VehicleModel,
};
use nalgebra::Vector2;

fn traj_ctrl_benchmark(c: &mut Criterion) {
    // ---- Build the controller ----

    let params = Params {
        stanley_gain: 1.5,
        softening_ms: 0.5,
        steer_damping_gain: 0.02,
        speed_k_p: 1.0,
        speed_k_d: 0.05,
        nominal_speed_ms: 2.0,
        creep_speed_ms: 0.2,
        braking_margin: 1.5,
        stop_tolerance_m: 0.05,
        stopped_speed_threshold_ms: 0.01,
        dt_s: 0.1,
        lookahead_steps: 5,
        max_sim_steps: 100_000,
        lat_error_limit_m: 1.5,
        head_error_limit_rad: 1.0,
    };
    let vehicle = VehicleModel {
        wheelbase_m: 2.7,
        max_steer_angle_rad: 0.55,
        max_forward_speed_ms: 3.0,
        max_reverse_speed_ms: 1.0,
        max_accel_ms2: 1.0,
        max_decel_ms2: 2.0,
    };

    // ---- Build a long path ----

    // Shuttle along the x axis, 20 m forwards then 10 m back, ten times
    let mut path = Path::direct(
        Pose2D::new(0.0, 0.0, 0.0),
        Vector2::new(20.0, 0.0),
        0.25,
        Gear::Forward,
    )
    .unwrap();
    for i in 1..10 {
        let x = i as f64 * 10.0;
        path.extend_direct(Vector2::new(x, 0.0), 0.25, Gear::Reverse)
            .unwrap();
        path.extend_direct(Vector2::new(x + 20.0, 0.0), 0.25, Gear::Forward)
            .unwrap();
    }
    let raw = path.states;

    let profile = StopProfile::new(&params, &vehicle);
    c.bench_function("ConsolidatedPath::new", |b| {
        b.iter(|| ConsolidatedPath::new(&raw, &profile).unwrap())
    });

    let ctrl = TrajCtrl::new(params, vehicle);
    c.bench_function("TrajCtrl::follow_path_simulation", |b| {
        b.iter(|| ctrl.follow_path_simulation(&raw).unwrap())
    });
}

criterion_group!(benches, traj_ctrl_benchmark);
criterion_main!(benches);
