//! Trajectory control module state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use serde::Serialize;

// Internal
use super::*;
use crate::{
    pose::{Gear, Pose2D, State2D},
    vehicle::VehicleModel,
};
use util::{module::State, params};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The trajectory controller.
///
/// A single instance owns the consolidated path, the drive mode and the
/// error history, and must be ticked sequentially by one caller.
#[derive(Debug, Clone)]
pub struct TrajCtrl {
    params: Params,
    vehicle: VehicleModel,

    /// Speed profile near stopping points, derived from the parameters
    profile: StopProfile,

    /// Executing mode
    mode: TrajCtrlMode,

    /// The path being followed, rebuilt on every new raw path
    path: Option<ConsolidatedPath>,

    /// Controller objects used to calculate the commands
    controllers: TrajControllers,

    /// Raw index of the last cusp the vehicle stopped on
    last_cusp: Option<usize>,

    /// Last valid command issued
    last_cmd: Option<Command>,

    report: StatusReport,
}

/// Drive mode data, the run being followed and the localization window into
/// its sub-path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Drive {
    pub run: usize,
    pub window: Window,
}

/// Stopped mode data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Stopped {
    /// Gear of the run that has just been completed
    pub gear: Gear,

    /// The run to start once at rest, `None` if the path is finished
    pub next_run: Option<usize>,
}

/// A command for the vehicle's actuation layer.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Command {
    /// Front wheel steering angle, anticlockwise positive
    ///
    /// Units: radians
    pub wheel_angle_rad: f64,

    /// Signed speed demand, negative when reversing
    ///
    /// Units: meters/second
    pub speed_ms: f64,

    /// Longitudinal acceleration demand
    ///
    /// Units: meters/second^2
    pub accel_ms2: f64,

    pub gear: Gear,
}

/// The status report containing various error flags and monitoring quantities.
#[derive(Debug, Default, Copy, Clone, Serialize)]
pub struct StatusReport {
    /// State at the end of the tick
    pub state: ControllerState,

    pub reverse_mode: bool,

    /// The run being driven
    pub run: Option<usize>,

    /// Raw path indices of the localization window
    pub prev_waypoint: Option<usize>,
    pub next_waypoint: Option<usize>,

    /// Units: meters
    pub cross_track_error_m: f64,

    /// Units: radians
    pub heading_error_rad: f64,

    /// Arc length to the next stopping point
    ///
    /// Units: meters
    pub remaining_m: f64,

    /// Speed limit applied by the stop profile, if any
    ///
    /// Units: meters/second
    pub speed_cap_ms: Option<f64>,

    /// The closest point on the path to the reference axle
    pub closest_point: Option<Pose2D>,

    /// If true the controller had no path to follow this tick
    pub no_active_path: bool,

    /// If true the steering demand was limited by the vehicle
    pub steer_saturated: bool,

    /// If true the last command was held as the new one was not finite
    pub cmd_held: bool,

    /// If true the limit on the lateral error has been exceeded
    pub lat_error_limit_exceeded: bool,

    /// If true the limit on the heading error has been exceeded
    pub head_error_limit_exceeded: bool,
}

/// Geometry of the vehicle relative to the active run for one tick.
#[derive(Debug, Clone, Copy)]
struct Tracking {
    gear: Gear,
    window: Window,
    closest: ClosestPoint,
    remaining_m: f64,
    arrived: bool,
    in_low_speed: bool,
    waypoint_speed_ms: Option<f64>,
    raw_prev: usize,
    raw_next: usize,
    num_runs: usize,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The possible modes of execution of TrajCtrl, carrying the data relevant
/// to each. Each mode is handled by a `mode_xyz` function.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum TrajCtrlMode {
    /// No path loaded
    Standby,

    ForwardDrive(Drive),
    ReverseDrive(Drive),

    /// Bringing the vehicle to rest on a stopping point
    Stopped(Stopped),

    /// The whole path has been driven
    Complete,
}

/// The externally visible state of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ControllerState {
    Standby,
    Stopped,
    ForwardDrive,
    ReverseDrive,
    Complete,
}

/// Potential errors that can occur in TrajCtrl.
#[derive(Debug, thiserror::Error)]
pub enum TrajCtrlError {
    #[error("Failed to load the trajectory control parameters: {0}")]
    ParamLoadError(params::LoadError),

    #[error("Failed to load the vehicle model: {0}")]
    VehicleLoadError(params::LoadError),

    #[error("A path must contain at least 2 states, got {num_states}")]
    InvalidPath { num_states: usize },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for TrajCtrl {
    type InitData = (&'static str, &'static str);
    type InitError = TrajCtrlError;

    type InputData = State2D;
    type OutputData = Option<Command>;
    type StatusReport = StatusReport;
    type ProcError = TrajCtrlError;

    /// Initialise the TrajCtrl module.
    ///
    /// Expected init data is the paths to the controller parameter file and
    /// the vehicle parameter file, relative to the params directory.
    fn init(init_data: Self::InitData) -> Result<Self, Self::InitError> {
        let params: Params =
            params::load(init_data.0).map_err(TrajCtrlError::ParamLoadError)?;
        let vehicle: VehicleModel =
            params::load(init_data.1).map_err(TrajCtrlError::VehicleLoadError)?;

        Ok(Self::new(params, vehicle))
    }

    /// Process trajectory control, one tick for the given vehicle state.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        Ok(self.follow_path(input_data))
    }
}

impl TrajCtrl {
    /// Create a new controller in standby.
    pub fn new(params: Params, vehicle: VehicleModel) -> Self {
        let profile = StopProfile::new(&params, &vehicle);
        let controllers = TrajControllers::new(&params);

        Self {
            params,
            vehicle,
            profile,
            mode: TrajCtrlMode::Standby,
            path: None,
            controllers,
            last_cusp: None,
            last_cmd: None,
            report: StatusReport::default(),
        }
    }

    // ---- PATH MANAGEMENT ----

    /// Consolidate a new raw path and start following it.
    ///
    /// Returns the full command list predicted for the path, simulated from
    /// its first state on an independent copy of the controller. If the
    /// path is invalid the controller is left unchanged.
    pub fn build_and_follow_path(
        &mut self,
        raw: &[State2D],
    ) -> Result<Vec<Command>, TrajCtrlError> {
        self.load_path(raw)?;

        let start = match raw.first() {
            Some(s) => State2D::new(s.pose, s.gear),
            None => return Err(TrajCtrlError::InvalidPath { num_states: 0 }),
        };

        let mut predictor = self.clone();
        let sim = sim::run(&mut predictor, start, self.params.max_sim_steps);

        Ok(sim.commands())
    }

    /// Consolidate a new raw path and get the command list from the current
    /// vehicle state.
    pub fn rebuild_command_list(
        &mut self,
        car: &State2D,
        raw: &[State2D],
    ) -> Result<Vec<Command>, TrajCtrlError> {
        self.load_path(raw)?;

        Ok(self.get_command_list(car))
    }

    /// Drop the current path and return to standby.
    pub fn abort(&mut self) {
        if self.path.is_some() {
            info!("Path aborted");
        }

        self.path = None;
        self.last_cusp = None;
        self.last_cmd = None;
        self.set_mode(TrajCtrlMode::Standby);
    }

    fn load_path(&mut self, raw: &[State2D]) -> Result<(), TrajCtrlError> {
        let path = match ConsolidatedPath::new(raw, &self.profile) {
            Ok(p) => p,
            Err(e) => {
                warn!("Rejected new path: {}", e);
                return Err(e);
            }
        };

        let drive = Drive {
            run: 0,
            window: Window::start(),
        };
        let mode = match path.first_gear() {
            Gear::Forward => TrajCtrlMode::ForwardDrive(drive),
            Gear::Reverse => TrajCtrlMode::ReverseDrive(drive),
        };

        self.path = Some(path);
        self.last_cusp = None;
        self.last_cmd = None;
        self.set_mode(mode);

        Ok(())
    }

    // ---- TICKS ----

    /// Run one control tick for the given vehicle state.
    ///
    /// Returns `None` when there is no path to follow (standby or complete),
    /// this is flagged in the report rather than raised as an error.
    pub fn follow_path(&mut self, car: &State2D) -> (Option<Command>, StatusReport) {
        self.report = StatusReport::default();

        let cmd = match self.mode {
            TrajCtrlMode::Standby | TrajCtrlMode::Complete => None,
            TrajCtrlMode::ForwardDrive(d) | TrajCtrlMode::ReverseDrive(d) => {
                self.mode_drive(car, d)
            }
            TrajCtrlMode::Stopped(s) => self.mode_stopped(car, s),
        };

        if cmd.is_none() {
            self.report.no_active_path = true;
            debug!("No active path in {:?}", self.state());
        }

        self.report.state = self.state();
        self.report.reverse_mode = self.reverse_mode();

        (cmd, self.report)
    }

    /// Get the command for this tick followed by a short prediction of the
    /// commands for the next ticks.
    ///
    /// Only the first command is the result of a live tick, the rest are
    /// predicted on a copy of the controller driving the kinematic model.
    pub fn get_command_list(&mut self, car: &State2D) -> Vec<Command> {
        let first = match self.follow_path(car).0 {
            Some(c) => c,
            None => return Vec::new(),
        };

        let mut cmds = vec![first];
        let mut predictor = self.clone();
        let mut state = sim::step(car, &first, &self.vehicle, self.params.dt_s);

        while cmds.len() < self.params.lookahead_steps {
            match predictor.follow_path(&state).0 {
                Some(c) => {
                    state = sim::step(&state, &c, &self.vehicle, self.params.dt_s);
                    cmds.push(c);
                }
                None => break,
            }
        }

        cmds
    }

    /// Run the path from its first state on an independent controller
    /// against the kinematic model.
    pub fn follow_path_simulation(&self, raw: &[State2D]) -> Result<Simulation, TrajCtrlError> {
        match raw.first() {
            Some(s) => self.follow_path_simulation_from(State2D::new(s.pose, s.gear), raw),
            None => Err(TrajCtrlError::InvalidPath { num_states: 0 }),
        }
    }

    /// Run the path from the given initial vehicle state on an independent
    /// controller against the kinematic model.
    pub fn follow_path_simulation_from(
        &self,
        start: State2D,
        raw: &[State2D],
    ) -> Result<Simulation, TrajCtrlError> {
        let mut ctrl = TrajCtrl::new(self.params.clone(), self.vehicle.clone());
        ctrl.load_path(raw)?;

        Ok(sim::run(&mut ctrl, start, self.params.max_sim_steps))
    }

    /// True if the controller is following a path and the vehicle is within
    /// the error limits of it.
    pub fn has_valid_path(&self, car: &State2D) -> bool {
        match self.mode {
            TrajCtrlMode::Standby | TrajCtrlMode::Complete => false,
            TrajCtrlMode::Stopped(_) => self.path.is_some(),
            TrajCtrlMode::ForwardDrive(d) | TrajCtrlMode::ReverseDrive(d) => {
                match self.track(car, d) {
                    Some(t) => {
                        let (lat, head) = self.limits_exceeded(&t.closest);
                        !(lat || head)
                    }
                    None => false,
                }
            }
        }
    }

    // ---- MODES ----

    /// Mode drive.
    ///
    /// Tracks the active run with the Stanley law, shaping the speed with
    /// the stop profile, until the vehicle arrives on the run's stopping
    /// point.
    fn mode_drive(&mut self, car: &State2D, drive: Drive) -> Option<Command> {
        let t = match self.track(car, drive) {
            Some(t) => t,
            None => {
                warn!("Drive mode without a valid run, returning to standby");
                self.set_mode(TrajCtrlMode::Standby);
                return None;
            }
        };

        self.report.run = Some(drive.run);
        self.report.prev_waypoint = Some(t.raw_prev);
        self.report.next_waypoint = Some(t.raw_next);
        self.report.cross_track_error_m = t.closest.cross_track_error_m;
        self.report.heading_error_rad = t.closest.heading_error_rad;
        self.report.remaining_m = t.remaining_m;
        self.report.closest_point = Some(t.closest.point);

        // ---- ARRIVAL ----

        if t.arrived {
            let next_run = if drive.run + 1 < t.num_runs {
                Some(drive.run + 1)
            } else {
                None
            };

            info!(
                "Arrived at stopping point {} ({:.3} m remaining)",
                t.raw_next, t.remaining_m
            );

            self.set_mode(TrajCtrlMode::Stopped(Stopped {
                gear: t.gear,
                next_run,
            }));

            return Some(self.stop_command(car, t.gear));
        }

        let next = Drive {
            run: drive.run,
            window: t.window,
        };
        self.mode = match t.gear {
            Gear::Forward => TrajCtrlMode::ForwardDrive(next),
            Gear::Reverse => TrajCtrlMode::ReverseDrive(next),
        };

        // ---- SPEED ----

        let mut target_speed_ms = self.profile.cruise_speed(t.gear);

        if t.in_low_speed {
            let cap = self.profile.speed_cap(t.remaining_m);
            self.report.speed_cap_ms = Some(cap);
            target_speed_ms = target_speed_ms.min(cap);
        }
        if let Some(s) = t.waypoint_speed_ms {
            target_speed_ms = target_speed_ms.min(s.abs());
        }

        // ---- STEERING ----

        let steer = self.controllers.get_steer_demand(
            &t.closest,
            t.gear,
            car.wheel_angle_rad,
            car.speed_ms,
            &self.params,
            &self.vehicle,
        );
        self.report.steer_saturated = steer.saturated;

        let accel_ms2 = self.controllers.get_accel_demand(
            target_speed_ms,
            car.speed_ms,
            &self.params,
            &self.vehicle,
        );

        // ---- ERROR LIMITS ----

        let (lat, head) = self.limits_exceeded(&t.closest);
        self.report.lat_error_limit_exceeded = lat;
        self.report.head_error_limit_exceeded = head;
        if lat || head {
            warn!(
                "Vehicle is off the path: lateral error {:.3} m, heading error {:.3} rad",
                t.closest.cross_track_error_m, t.closest.heading_error_rad
            );
        }

        let cmd = Command {
            wheel_angle_rad: steer.wheel_angle_rad,
            speed_ms: t.gear.sign() * target_speed_ms,
            accel_ms2,
            gear: t.gear,
        };

        debug!(
            "Window ({}, {}), cte {:.3} m, head {:.3} rad, {:.3} m to stop, cmd {:.3} rad {:.3} m/s",
            t.raw_prev,
            t.raw_next,
            t.closest.cross_track_error_m,
            t.closest.heading_error_rad,
            t.remaining_m,
            cmd.wheel_angle_rad,
            cmd.speed_ms
        );

        Some(self.checked(cmd, car))
    }

    /// Mode stopped.
    ///
    /// Holds a zero speed demand until the vehicle is at rest, then either
    /// starts the next run from the cusp or completes the path.
    fn mode_stopped(&mut self, car: &State2D, stopped: Stopped) -> Option<Command> {
        if car.speed_ms.abs() > self.params.stopped_speed_threshold_ms {
            return Some(self.stop_command(car, stopped.gear));
        }

        let next_run = match stopped.next_run {
            Some(r) => r,
            None => {
                info!("Path complete");
                self.set_mode(TrajCtrlMode::Complete);
                return None;
            }
        };

        let (gear, cusp) = match self.path.as_ref().and_then(|p| {
            p.run(next_run)
                .map(|r| (r.gear, r.raw_start.saturating_sub(1)))
        }) {
            Some(v) => v,
            None => {
                warn!("Stopped with no run {} to continue on, returning to standby", next_run);
                self.set_mode(TrajCtrlMode::Standby);
                return None;
            }
        };

        info!("At rest on cusp {}, continuing in {:?}", cusp, gear);
        self.last_cusp = Some(cusp);

        let drive = Drive {
            run: next_run,
            window: Window::start(),
        };
        self.set_mode(match gear {
            Gear::Forward => TrajCtrlMode::ForwardDrive(drive),
            Gear::Reverse => TrajCtrlMode::ReverseDrive(drive),
        });

        self.mode_drive(car, drive)
    }

    // ---- HELPERS ----

    /// Localize the vehicle on the run and compute its errors, without
    /// changing any state.
    fn track(&self, car: &State2D, drive: Drive) -> Option<Tracking> {
        let path = self.path.as_ref()?;
        let run = path.run(drive.run)?;
        let view = path.sub_path(drive.run);

        let axle_m = self.vehicle.reference_axle(&car.pose, view.gear);
        let window = localize(&axle_m, &view, drive.window.prev);

        let closest = closest_point(
            car,
            view.waypoint(window.prev),
            view.waypoint(window.next),
            view.gear,
            &self.vehicle,
        );

        let remaining_m = if window.is_collapsed() {
            0.0
        } else {
            (1.0 - closest.progress) * closest.segment_length_m + run.remaining_from(window.next)
        };

        let last = view.last_index();
        let arrived = window.prev == last
            || (window.next == last && remaining_m <= self.params.stop_tolerance_m);

        Some(Tracking {
            gear: view.gear,
            window,
            closest,
            remaining_m,
            arrived,
            in_low_speed: window.prev >= run.low_speed_from(),
            waypoint_speed_ms: view.waypoint(window.next).target_speed_ms,
            raw_prev: view.raw_index(window.prev),
            raw_next: view.raw_index(window.next),
            num_runs: path.num_runs(),
        })
    }

    fn limits_exceeded(&self, closest: &ClosestPoint) -> (bool, bool) {
        (
            closest.cross_track_error_m.abs() > self.params.lat_error_limit_m,
            closest.heading_error_rad.abs() > self.params.head_error_limit_rad,
        )
    }

    /// Zero speed command holding the current wheel angle.
    fn stop_command(&mut self, car: &State2D, gear: Gear) -> Command {
        let accel_ms2 =
            self.controllers
                .get_accel_demand(0.0, car.speed_ms, &self.params, &self.vehicle);

        let cmd = Command {
            wheel_angle_rad: self.vehicle.clamp_steer(car.wheel_angle_rad),
            speed_ms: 0.0,
            accel_ms2,
            gear,
        };

        self.checked(cmd, car)
    }

    /// Replace a non-finite command with the last valid one, or with a stop
    /// if there is none.
    fn checked(&mut self, cmd: Command, car: &State2D) -> Command {
        if cmd.is_finite() {
            self.last_cmd = Some(cmd);
            return cmd;
        }

        warn!("Non-finite command {:?} for state {:?}, holding last command", cmd, car);
        self.report.cmd_held = true;

        self.last_cmd.unwrap_or(Command {
            gear: cmd.gear,
            ..Command::default()
        })
    }

    /// Switch mode, resetting the controller error history.
    fn set_mode(&mut self, mode: TrajCtrlMode) {
        let from = self.state();
        self.mode = mode;
        self.controllers.reset();

        if from != self.state() {
            info!("TrajCtrl mode {:?} -> {:?}", from, self.state());
        }
    }

    // ---- ACCESSORS ----

    pub fn mode(&self) -> &TrajCtrlMode {
        &self.mode
    }

    pub fn state(&self) -> ControllerState {
        self.mode.state()
    }

    /// True while driving, or stopping from, a reverse run.
    pub fn reverse_mode(&self) -> bool {
        match self.mode {
            TrajCtrlMode::ReverseDrive(_) => true,
            TrajCtrlMode::Stopped(s) => s.gear.is_reverse(),
            _ => false,
        }
    }

    /// Raw index of the last cusp the vehicle stopped on.
    pub fn last_cusp(&self) -> Option<usize> {
        self.last_cusp
    }

    pub fn consolidated(&self) -> Option<&ConsolidatedPath> {
        self.path.as_ref()
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn vehicle(&self) -> &VehicleModel {
        &self.vehicle
    }

    /// The report from the last tick.
    pub fn report(&self) -> &StatusReport {
        &self.report
    }
}

impl TrajCtrlMode {
    pub fn state(&self) -> ControllerState {
        match self {
            TrajCtrlMode::Standby => ControllerState::Standby,
            TrajCtrlMode::ForwardDrive(_) => ControllerState::ForwardDrive,
            TrajCtrlMode::ReverseDrive(_) => ControllerState::ReverseDrive,
            TrajCtrlMode::Stopped(_) => ControllerState::Stopped,
            TrajCtrlMode::Complete => ControllerState::Complete,
        }
    }
}

impl Default for ControllerState {
    fn default() -> Self {
        ControllerState::Standby
    }
}

impl Command {
    pub fn is_finite(&self) -> bool {
        self.wheel_angle_rad.is_finite() && self.speed_ms.is_finite() && self.accel_ms2.is_finite()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        path::Path,
        test_fixtures::{params, vehicle},
    };
    use nalgebra::Vector2;

    fn straight() -> Vec<State2D> {
        Path::direct(
            Pose2D::new(0.0, 0.0, 0.0),
            Vector2::new(9.0, 0.0),
            1.0,
            Gear::Forward,
        )
        .unwrap()
        .states
    }

    #[test]
    fn test_standby() {
        let mut ctrl = TrajCtrl::new(params(), vehicle());
        let car = State2D::new(Pose2D::new(0.0, 0.0, 0.0), Gear::Forward);

        assert_eq!(ctrl.state(), ControllerState::Standby);
        assert!(!ctrl.has_valid_path(&car));

        let (cmd, report) = ctrl.follow_path(&car);
        assert!(cmd.is_none());
        assert!(report.no_active_path);
        assert!(ctrl.get_command_list(&car).is_empty());
    }

    #[test]
    fn test_invalid_path_stays_in_standby() {
        let mut ctrl = TrajCtrl::new(params(), vehicle());
        let one = vec![State2D::new(Pose2D::new(0.0, 0.0, 0.0), Gear::Forward)];

        assert!(matches!(
            ctrl.build_and_follow_path(&one),
            Err(TrajCtrlError::InvalidPath { num_states: 1 })
        ));
        assert!(matches!(
            ctrl.build_and_follow_path(&[]),
            Err(TrajCtrlError::InvalidPath { num_states: 0 })
        ));
        assert_eq!(ctrl.state(), ControllerState::Standby);
        assert!(ctrl.consolidated().is_none());
    }

    #[test]
    fn test_build_and_follow() {
        let mut ctrl = TrajCtrl::new(params(), vehicle());
        let raw = straight();

        let cmds = ctrl.build_and_follow_path(&raw).unwrap();
        assert!(!cmds.is_empty());
        assert_eq!(cmds.last().unwrap().speed_ms, 0.0);

        // The live controller is untouched by the prediction
        assert_eq!(
            ctrl.mode(),
            &TrajCtrlMode::ForwardDrive(Drive {
                run: 0,
                window: Window::start()
            })
        );

        let car = State2D::new(raw[0].pose, Gear::Forward);
        assert!(ctrl.has_valid_path(&car));

        let (cmd, report) = ctrl.follow_path(&car);
        let cmd = cmd.unwrap();
        assert_eq!(cmd.wheel_angle_rad, 0.0);
        assert!((cmd.speed_ms - 2.0).abs() < 1e-12);
        assert_eq!(report.state, ControllerState::ForwardDrive);
        assert!(!report.reverse_mode);
        assert_eq!(report.prev_waypoint, Some(0));
        assert!((report.remaining_m - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_lost_vehicle() {
        let mut ctrl = TrajCtrl::new(params(), vehicle());
        ctrl.build_and_follow_path(&straight()).unwrap();

        let car = State2D::new(Pose2D::new(2.0, 3.0, 0.0), Gear::Forward);
        assert!(!ctrl.has_valid_path(&car));

        // Lost is reported but the tick still produces a command
        let (cmd, report) = ctrl.follow_path(&car);
        assert!(cmd.is_some());
        assert!(report.lat_error_limit_exceeded);
        assert!(!report.head_error_limit_exceeded);
    }

    #[test]
    fn test_non_finite_state_holds_command() {
        let mut ctrl = TrajCtrl::new(params(), vehicle());
        ctrl.build_and_follow_path(&straight()).unwrap();

        let car = State2D::new(Pose2D::new(0.0, 0.0, 0.0), Gear::Forward);
        let good = ctrl.follow_path(&car).0.unwrap();

        let mut bad = car;
        bad.speed_ms = std::f64::NAN;
        let (cmd, report) = ctrl.follow_path(&bad);

        assert!(report.cmd_held);
        assert_eq!(cmd, Some(good));
    }

    #[test]
    fn test_stopped_waits_for_rest() {
        let mut ctrl = TrajCtrl::new(params(), vehicle());
        ctrl.build_and_follow_path(&straight()).unwrap();

        // Front axle on the final waypoint while still moving
        let moving = State2D::new(Pose2D::new(8.0, 0.0, 0.0), Gear::Forward).with_speed(0.5);
        let (cmd, report) = ctrl.follow_path(&moving);
        assert_eq!(report.state, ControllerState::Stopped);
        assert_eq!(cmd.unwrap().speed_ms, 0.0);
        assert!(cmd.unwrap().accel_ms2 < 0.0);

        let (cmd, report) = ctrl.follow_path(&moving);
        assert!(cmd.is_some());
        assert_eq!(report.state, ControllerState::Stopped);

        let at_rest = moving.with_speed(0.0);
        let (cmd, report) = ctrl.follow_path(&at_rest);
        assert!(cmd.is_none());
        assert_eq!(report.state, ControllerState::Complete);
        assert!(!ctrl.has_valid_path(&at_rest));
    }

    /// Error history is dropped on every mode change, so the first tick of a
    /// mode has no derivative kick from the previous one.
    #[test]
    fn test_mode_change_resets_history() {
        let p = Params {
            steer_damping_gain: 0.05,
            speed_k_p: 0.2,
            speed_k_d: 0.05,
            ..params()
        };
        let mut ctrl = TrajCtrl::new(p, vehicle());

        // Forward to a cusp at index 5, then reverse to x = 1
        let mut path = Path::direct(
            Pose2D::new(0.0, 0.0, 0.0),
            Vector2::new(5.0, 0.0),
            1.0,
            Gear::Forward,
        )
        .unwrap();
        path.extend_direct(Vector2::new(1.0, 0.0), 1.0, Gear::Reverse)
            .unwrap();
        ctrl.build_and_follow_path(&path.states).unwrap();

        // Front axle on the start of the path
        let start = State2D::new(Pose2D::new(-1.0, 0.0, 0.0), Gear::Forward);
        let (cmd, report) = ctrl.follow_path(&start);
        assert_eq!(report.state, ControllerState::ForwardDrive);
        assert!((cmd.unwrap().accel_ms2 - 0.4).abs() < 1e-12);
        assert_eq!(ctrl.controllers.prev_wheel_angle_error(), Some(0.0));
        assert_eq!(ctrl.controllers.prev_speed_error(), Some(2.0));

        // Front axle on the cusp, still moving
        let on_cusp = State2D::new(Pose2D::new(4.0, 0.0, 0.0), Gear::Forward).with_speed(0.5);
        let (cmd, report) = ctrl.follow_path(&on_cusp);
        assert_eq!(report.state, ControllerState::Stopped);
        assert_eq!(ctrl.controllers.prev_wheel_angle_error(), None);
        assert_eq!(ctrl.controllers.prev_speed_error(), Some(-0.5));
        // Proportional term only
        assert!((cmd.unwrap().accel_ms2 + 0.1).abs() < 1e-12);

        // At rest on the cusp with the wheels still turned
        let mut at_rest = on_cusp.with_speed(0.0);
        at_rest.wheel_angle_rad = 0.3;
        let (cmd, report) = ctrl.follow_path(&at_rest);
        let cmd = cmd.unwrap();
        assert_eq!(report.state, ControllerState::ReverseDrive);
        assert_eq!(ctrl.last_cusp(), Some(5));
        assert!((cmd.speed_ms + 1.5).abs() < 1e-12);
        assert!((cmd.accel_ms2 - 0.3).abs() < 1e-12);
        assert!(cmd.wheel_angle_rad.abs() < 1e-12);
        assert_eq!(ctrl.controllers.prev_speed_error(), Some(1.5));
        assert!((ctrl.controllers.prev_wheel_angle_error().unwrap() + 0.3).abs() < 1e-12);

        // Within a mode the history is kept and damps the wheel angle change
        at_rest.wheel_angle_rad = 0.0;
        let (cmd, report) = ctrl.follow_path(&at_rest);
        assert_eq!(report.state, ControllerState::ReverseDrive);
        assert!((cmd.unwrap().wheel_angle_rad - 0.15).abs() < 1e-9);

        ctrl.abort();
        assert_eq!(ctrl.controllers.prev_wheel_angle_error(), None);
        assert_eq!(ctrl.controllers.prev_speed_error(), None);
    }

    #[test]
    fn test_abort() {
        let mut ctrl = TrajCtrl::new(params(), vehicle());
        ctrl.build_and_follow_path(&straight()).unwrap();
        ctrl.abort();

        assert_eq!(ctrl.state(), ControllerState::Standby);
        assert!(ctrl.consolidated().is_none());
    }

    #[test]
    fn test_command_list() {
        let p = params();
        let mut ctrl = TrajCtrl::new(p.clone(), vehicle());
        let raw = straight();
        let car = State2D::new(raw[0].pose, Gear::Forward);

        let cmds = ctrl.rebuild_command_list(&car, &raw).unwrap();
        assert_eq!(cmds.len(), p.lookahead_steps);

        // Only the live tick advanced the controller
        let (_, report) = ctrl.follow_path(&car);
        assert_eq!(report.prev_waypoint, Some(0));
    }

    #[test]
    fn test_module_proc() {
        let mut ctrl = TrajCtrl::new(params(), vehicle());
        ctrl.build_and_follow_path(&straight()).unwrap();

        let car = State2D::new(Pose2D::new(0.0, 0.0, 0.0), Gear::Forward);
        let (out, report) = ctrl.proc(&car).unwrap();

        assert!(out.is_some());
        assert_eq!(report.state, ControllerState::ForwardDrive);
    }
}
