//! # Pose module
//!
//! 2D pose and vehicle state primitives shared by the planner output, the
//! trajectory controller and the command consumer.
//!
//! All positions are given in the Local Map (LM) frame in meters, headings
//! are the angle to the positive LM_X axis in radians, anticlockwise
//! positive, and are always kept in the range [-pi, pi).

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// Internal
use util::maths::wrap_pi;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A position and heading on the XY plane of the LM frame.
///
/// Poses are immutable once created, use the builder style methods to derive
/// new ones.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "PoseDef", into = "PoseDef")]
pub struct Pose2D {
    position_m: Vector2<f64>,
    heading_rad: f64,
}

/// Serialised form of a [`Pose2D`], the heading is normalised on load.
#[derive(Serialize, Deserialize)]
struct PoseDef {
    x_m: f64,
    y_m: f64,
    heading_rad: f64,
}

/// The state of the vehicle, or of a single waypoint in a planned path.
///
/// A path is an ordered sequence of states, the insertion order being the
/// order of traversal.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct State2D {
    /// Position and heading of the vehicle centre (midway between the axles)
    #[serde(flatten)]
    pub pose: Pose2D,

    /// Direction of travel
    #[serde(default)]
    pub gear: Gear,

    /// Signed longitudinal speed, negative when reversing.
    ///
    /// Units: meters/second
    #[serde(default)]
    pub speed_ms: f64,

    /// Front wheel steering angle, anticlockwise positive.
    ///
    /// Units: radians
    #[serde(default)]
    pub wheel_angle_rad: f64,

    /// Optional speed limit requested by the planner at this waypoint.
    ///
    /// Units: meters/second
    #[serde(default)]
    pub target_speed_ms: Option<f64>,

    /// Timestamp of the state.
    ///
    /// Units: seconds
    #[serde(default)]
    pub time_s: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The travel direction of the vehicle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gear {
    Forward,
    Reverse,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose2D {
    /// Create a new pose, normalising the heading into [-pi, pi).
    pub fn new(x_m: f64, y_m: f64, heading_rad: f64) -> Self {
        Self::from_position(Vector2::new(x_m, y_m), heading_rad)
    }

    /// Create a new pose from a position vector.
    pub fn from_position(position_m: Vector2<f64>, heading_rad: f64) -> Self {
        Self {
            position_m,
            heading_rad: wrap_pi(heading_rad),
        }
    }

    pub fn position(&self) -> Vector2<f64> {
        self.position_m
    }

    pub fn x(&self) -> f64 {
        self.position_m[0]
    }

    pub fn y(&self) -> f64 {
        self.position_m[1]
    }

    /// The heading in the range [-pi, pi).
    pub fn heading(&self) -> f64 {
        self.heading_rad
    }

    /// Unit vector pointing along the heading.
    pub fn forward2(&self) -> Vector2<f64> {
        Vector2::new(self.heading_rad.cos(), self.heading_rad.sin())
    }

    /// The point `dist_m` ahead of the pose along its heading (behind if
    /// negative).
    pub fn project(&self, dist_m: f64) -> Vector2<f64> {
        self.position_m + dist_m * self.forward2()
    }

    /// The same position facing the opposite direction.
    pub fn rotated_pi(&self) -> Self {
        Self::from_position(self.position_m, self.heading_rad + std::f64::consts::PI)
    }
}

impl From<PoseDef> for Pose2D {
    fn from(def: PoseDef) -> Self {
        Pose2D::new(def.x_m, def.y_m, def.heading_rad)
    }
}

impl From<Pose2D> for PoseDef {
    fn from(pose: Pose2D) -> Self {
        PoseDef {
            x_m: pose.x(),
            y_m: pose.y(),
            heading_rad: pose.heading(),
        }
    }
}

impl State2D {
    /// A stationary state at the given pose.
    pub fn new(pose: Pose2D, gear: Gear) -> Self {
        Self {
            pose,
            gear,
            speed_ms: 0.0,
            wheel_angle_rad: 0.0,
            target_speed_ms: None,
            time_s: 0.0,
        }
    }

    /// A copy of this state with the given signed speed.
    pub fn with_speed(mut self, speed_ms: f64) -> Self {
        self.speed_ms = speed_ms;
        self
    }

    pub fn position(&self) -> Vector2<f64> {
        self.pose.position()
    }

    pub fn heading(&self) -> f64 {
        self.pose.heading()
    }
}

impl Gear {
    pub fn is_reverse(self) -> bool {
        self == Gear::Reverse
    }

    /// +1 for forward, -1 for reverse.
    pub fn sign(self) -> f64 {
        match self {
            Gear::Forward => 1.0,
            Gear::Reverse => -1.0,
        }
    }

    /// Convert a vehicle heading into the heading of travel in this gear.
    pub fn travel_heading(self, heading_rad: f64) -> f64 {
        match self {
            Gear::Forward => wrap_pi(heading_rad),
            Gear::Reverse => wrap_pi(heading_rad + std::f64::consts::PI),
        }
    }
}

impl Default for Gear {
    fn default() -> Self {
        Gear::Forward
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_heading_normalised() {
        let p = Pose2D::new(1.0, 2.0, 3.0 * PI / 2.0);
        assert!((p.heading() + PI / 2.0).abs() < 1e-12);

        let r = p.rotated_pi();
        assert!((r.heading() - PI / 2.0).abs() < 1e-12);
        assert_eq!(r.position(), p.position());
    }

    #[test]
    fn test_project() {
        let p = Pose2D::new(1.0, 1.0, PI / 2.0);
        let ahead = p.project(2.0);
        assert!((ahead - Vector2::new(1.0, 3.0)).norm() < 1e-12);
        let behind = p.project(-1.0);
        assert!((behind - Vector2::new(1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_state_json() {
        let json = r#"{"x_m": 1.0, "y_m": -2.0, "heading_rad": 7.0, "gear": "Reverse"}"#;
        let s: State2D = serde_json::from_str(json).unwrap();

        assert_eq!(s.gear, Gear::Reverse);
        assert_eq!(s.speed_ms, 0.0);
        assert_eq!(s.target_speed_ms, None);
        assert!((s.heading() - (7.0 - 2.0 * PI)).abs() < 1e-12);
        assert!((s.pose.y() + 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_travel_heading() {
        assert!((Gear::Forward.travel_heading(0.5) - 0.5).abs() < 1e-12);
        assert!((Gear::Reverse.travel_heading(0.5) - (0.5 - PI)).abs() < 1e-12);
        assert_eq!(Gear::Reverse.sign(), -1.0);
    }
}
