//! # Path following simulation
//!
//! Runs a planned path through the trajectory controller against the
//! kinematic vehicle model, without requiring the physical vehicle. Each
//! simulated tick is archived to `sim/steps.csv` in the session's archive
//! directory.
//!
//! The path file is a JSON array of states, for example:
//!
//! ```json
//! [
//!     {"x_m": 0.0, "y_m": 0.0, "heading_rad": 0.0, "gear": "Forward"},
//!     {"x_m": 1.0, "y_m": 0.0, "heading_rad": 0.0, "gear": "Forward"}
//! ]
//! ```

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{fs::read_to_string, path::PathBuf};

use color_eyre::{
    eyre::{eyre, WrapErr},
    Result,
};
use log::info;
use serde::Serialize;
use structopt::StructOpt;

use follow_lib::{
    pose::State2D,
    traj_ctrl::{ControllerState, Params, SimStep, TrajCtrl},
    vehicle::VehicleModel,
};
use util::{
    archive::Archiver,
    logger::{logger_init, LevelFilter},
    params,
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

#[derive(Debug, StructOpt)]
#[structopt(
    name = "follow_sim",
    about = "Simulate following a path with the trajectory controller"
)]
struct Opt {
    /// JSON file containing the path to follow
    #[structopt(parse(from_os_str))]
    path_file: PathBuf,

    /// Controller parameter file, defaults to `traj_ctrl.toml` in the params directory
    #[structopt(long, parse(from_os_str))]
    params: Option<PathBuf>,

    /// Vehicle parameter file, defaults to `vehicle.toml` in the params directory
    #[structopt(long, parse(from_os_str))]
    vehicle: Option<PathBuf>,

    /// Minimum log level, at least `info`
    #[structopt(long, default_value = "info")]
    log_level: LevelFilter,
}

/// A flattened simulation step, one row of the archive.
#[derive(Serialize)]
struct StepRecord {
    time_s: f64,
    x_m: f64,
    y_m: f64,
    heading_rad: f64,
    speed_ms: f64,
    wheel_angle_rad: f64,

    state: ControllerState,
    reverse_mode: bool,
    prev_waypoint: Option<usize>,
    next_waypoint: Option<usize>,
    cross_track_error_m: f64,
    heading_error_rad: f64,
    remaining_m: f64,
    speed_cap_ms: Option<f64>,

    cmd_wheel_angle_rad: f64,
    cmd_speed_ms: f64,
    cmd_accel_ms2: f64,
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("follow_sim", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(opt.log_level, &session).wrap_err("Failed to initialise logging")?;

    info!("Path Following Simulation\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let traj_params: Params = match opt.params {
        Some(ref p) => params::load_from_path(p),
        None => params::load("traj_ctrl.toml"),
    }
    .wrap_err("Could not load trajectory control params")?;

    let vehicle: VehicleModel = match opt.vehicle {
        Some(ref p) => params::load_from_path(p),
        None => params::load("vehicle.toml"),
    }
    .wrap_err("Could not load vehicle params")?;

    info!("Parameters loaded");

    // ---- LOAD PATH ----

    let path_str = read_to_string(&opt.path_file)
        .wrap_err_with(|| format!("Could not read the path file {:?}", opt.path_file))?;
    let raw: Vec<State2D> =
        serde_json::from_str(&path_str).wrap_err("Could not parse the path file")?;

    info!("Loaded path of {} states from {:?}", raw.len(), opt.path_file);

    // ---- SIMULATE ----

    let ctrl = TrajCtrl::new(traj_params, vehicle);
    let sim = ctrl
        .follow_path_simulation(&raw)
        .wrap_err("Could not simulate the path")?;

    let mut archiver =
        Archiver::from_path(&session, "sim/steps.csv").wrap_err("Could not create the archive")?;
    for step in &sim.steps {
        archiver
            .serialise(StepRecord::from(step))
            .wrap_err("Could not archive simulation step")?;
    }
    archiver.flush().wrap_err("Could not write the archive")?;

    // ---- SUMMARY ----

    let max_cte_m = sim
        .steps
        .iter()
        .map(|s| s.report.cross_track_error_m.abs())
        .fold(0.0, f64::max);

    info!("Simulation summary:");
    info!("    Steps: {}", sim.steps.len());
    info!("    Duration: {:.2} s", sim.duration_s());
    info!("    Final state: {:?}", sim.final_state);
    info!("    Final pose: {:?}", sim.final_car.pose);
    info!("    Max cross-track error: {:.3} m", max_cte_m);
    info!("    Cusps: {:?}", sim.cusps);

    if !sim.completed() {
        return Err(eyre!(
            "Path not completed after {} steps, ended in {:?}",
            sim.steps.len(),
            sim.final_state
        ));
    }

    Ok(())
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl From<&SimStep> for StepRecord {
    fn from(step: &SimStep) -> Self {
        Self {
            time_s: step.car.time_s,
            x_m: step.car.pose.x(),
            y_m: step.car.pose.y(),
            heading_rad: step.car.heading(),
            speed_ms: step.car.speed_ms,
            wheel_angle_rad: step.car.wheel_angle_rad,
            state: step.report.state,
            reverse_mode: step.report.reverse_mode,
            prev_waypoint: step.report.prev_waypoint,
            next_waypoint: step.report.next_waypoint,
            cross_track_error_m: step.report.cross_track_error_m,
            heading_error_rad: step.report.heading_error_rad,
            remaining_m: step.report.remaining_m,
            speed_cap_ms: step.report.speed_cap_ms,
            cmd_wheel_angle_rad: step.command.wheel_angle_rad,
            cmd_speed_ms: step.command.speed_ms,
            cmd_accel_ms2: step.command.accel_ms2,
        }
    }
}
