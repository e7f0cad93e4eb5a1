//! # Path following simulation
//!
//! Replays a path through the controller against a kinematic bicycle model
//! of the vehicle, with no live pose feedback. Used for offline verification
//! of paths and to predict command lists.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, warn};
use nalgebra::Vector2;
use serde::Serialize;

// Internal
use super::{Command, ControllerState, StatusReport, TrajCtrl};
use crate::{
    pose::{Pose2D, State2D},
    vehicle::VehicleModel,
};
use util::maths::clamp_abs;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A single simulated tick.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SimStep {
    /// Vehicle state at the start of the tick
    pub car: State2D,

    /// Command issued for the tick
    pub command: Command,

    pub report: StatusReport,
}

/// The result of a simulated run.
#[derive(Debug, Clone, Serialize)]
pub struct Simulation {
    pub steps: Vec<SimStep>,

    /// Raw indices of the cusps in the simulated path
    pub cusps: Vec<usize>,

    /// Vehicle state after the final command
    pub final_car: State2D,

    /// Controller state when the simulation ended
    pub final_state: ControllerState,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Simulation {
    /// The commands issued during the simulation, in order.
    pub fn commands(&self) -> Vec<Command> {
        self.steps.iter().map(|s| s.command).collect()
    }

    /// True if the path was driven to completion.
    pub fn completed(&self) -> bool {
        self.final_state == ControllerState::Complete
    }

    /// Simulated duration.
    ///
    /// Units: seconds
    pub fn duration_s(&self) -> f64 {
        self.final_car.time_s - self.steps.first().map(|s| s.car.time_s).unwrap_or(0.0)
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Tick the controller against the kinematic model from `start` until it
/// stops issuing commands or `max_steps` ticks have been run.
pub fn run(ctrl: &mut TrajCtrl, start: State2D, max_steps: usize) -> Simulation {
    let dt_s = ctrl.params().dt_s;
    let vehicle = ctrl.vehicle().clone();

    let mut car = start;
    let mut steps = Vec::new();

    while steps.len() < max_steps {
        let (cmd, report) = ctrl.follow_path(&car);

        let command = match cmd {
            Some(c) => c,
            None => break,
        };

        steps.push(SimStep {
            car,
            command,
            report,
        });

        car = step(&car, &command, &vehicle, dt_s);
    }

    let sim = Simulation {
        steps,
        cusps: ctrl
            .consolidated()
            .map(|p| p.cusps.clone())
            .unwrap_or_default(),
        final_car: car,
        final_state: ctrl.state(),
    };

    if sim.completed() {
        info!(
            "Simulated path complete in {} steps ({:.1} s)",
            sim.steps.len(),
            sim.duration_s()
        );
    } else {
        warn!(
            "Simulation stopped after {} steps in {:?}",
            sim.steps.len(),
            sim.final_state
        );
    }

    sim
}

/// Advance the vehicle state by one period under the given command.
///
/// The speed tracks the commanded speed subject to the vehicle's
/// acceleration and deceleration limits. The pose follows a kinematic
/// bicycle model about the rear axle with the wheels set to the commanded
/// angle.
pub fn step(car: &State2D, cmd: &Command, vehicle: &VehicleModel, dt_s: f64) -> State2D {
    let target_ms = cmd
        .speed_ms
        .max(-vehicle.max_reverse_speed_ms)
        .min(vehicle.max_forward_speed_ms);

    let speeding_up = target_ms.abs() > car.speed_ms.abs() && target_ms * car.speed_ms >= 0.0;
    let limit_ms2 = if speeding_up {
        vehicle.max_accel_ms2
    } else {
        vehicle.max_decel_ms2
    };
    let speed_ms = car.speed_ms + clamp_abs(target_ms - car.speed_ms, limit_ms2 * dt_s);

    let wheel_angle_rad = vehicle.clamp_steer(cmd.wheel_angle_rad);

    let heading_rad = car.heading();
    let new_heading_rad =
        heading_rad + speed_ms / vehicle.wheelbase_m * wheel_angle_rad.tan() * dt_s;

    let rear_m = vehicle.rear_axle(&car.pose)
        + speed_ms * dt_s * Vector2::new(heading_rad.cos(), heading_rad.sin());
    let centre_m = rear_m
        + 0.5 * vehicle.wheelbase_m * Vector2::new(new_heading_rad.cos(), new_heading_rad.sin());

    State2D {
        pose: Pose2D::from_position(centre_m, new_heading_rad),
        gear: cmd.gear,
        speed_ms,
        wheel_angle_rad,
        target_speed_ms: car.target_speed_ms,
        time_s: car.time_s + dt_s,
    }
}
