//! # Path
//!
//! This module defines the path followed by the trajectory controller, and
//! the segment geometry used to project the vehicle onto it.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// Internal
use crate::pose::{Gear, Pose2D, State2D};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Segments shorter than this are considered to have zero length.
pub const MIN_SEGMENT_LENGTH_M: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A path defining the desired trajectory of the vehicle.
///
/// The path is an ordered sequence of states, each of which carries the gear
/// to use when driving towards it.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
#[serde(transparent)]
pub struct Path {
    pub states: Vec<State2D>,
}

/// A segment between two path points
#[derive(Debug, Clone, Copy)]
pub struct PathSegment {
    /// The target of the segment
    pub target_m: Vector2<f64>,

    /// The start point of the segment
    pub start_m: Vector2<f64>,

    /// The length of the segment
    pub length_m: f64,

    /// The heading (angle to the +ve x axis) of the segment
    pub heading_rad: f64,

    /// Unit vector pointing in the direction of the segment
    pub direction: Vector2<f64>,
}

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("Point separation must be positive, got {0}")]
    InvalidSeparation(f64),

    #[error("Attempted to extend an empty path")]
    EmptySequence,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Path {
    /// Produces a direct path from the given pose to the target position, with each point in the
    /// path having at most the given separation.
    ///
    /// The states are driven in `gear`, so when reversing the vehicle heading stored in each state
    /// points away from the target.
    pub fn direct(
        from: Pose2D,
        to: Vector2<f64>,
        point_sep_m: f64,
        gear: Gear,
    ) -> Result<Self, PathError> {
        let mut path = Path {
            states: vec![State2D::new(from, gear)],
        };
        path.extend_direct(to, point_sep_m, gear)?;

        Ok(path)
    }

    /// Extend the path in a straight line from its last point to `to`, driving in `gear`.
    ///
    /// Changing the gear relative to the last state of the path creates a cusp at that state.
    pub fn extend_direct(
        &mut self,
        to: Vector2<f64>,
        point_sep_m: f64,
        gear: Gear,
    ) -> Result<(), PathError> {
        if !(point_sep_m > 0.0) {
            return Err(PathError::InvalidSeparation(point_sep_m));
        }

        let from = match self.states.last() {
            Some(s) => s.position(),
            None => return Err(PathError::EmptySequence),
        };

        let diff_vec = to - from;
        let dist = diff_vec.norm();
        if dist < MIN_SEGMENT_LENGTH_M {
            return Ok(());
        }

        // Vehicle heading, facing away from the direction of travel in reverse
        let heading_rad = match gear {
            Gear::Forward => diff_vec[1].atan2(diff_vec[0]),
            Gear::Reverse => (-diff_vec[1]).atan2(-diff_vec[0]),
        };

        // Get the number of points needed so that no pair of points is further apart than the
        // separation, the final point always landing on the target.
        let num_points = (dist / point_sep_m).ceil() as usize;
        let delta = diff_vec / num_points as f64;

        for i in 1..=num_points {
            self.states.push(State2D::new(
                Pose2D::from_position(from + delta * i as f64, heading_rad),
                gear,
            ));
        }

        Ok(())
    }
}

impl From<Vec<State2D>> for Path {
    fn from(states: Vec<State2D>) -> Self {
        Path { states }
    }
}

impl PathSegment {
    /// Build the segment from `start` to `target`.
    ///
    /// If the two points coincide the segment is degenerate, its direction is
    /// then taken from the heading of `target`.
    pub fn between(start: &Pose2D, target: &Pose2D) -> Self {
        let start_m = start.position();
        let target_m = target.position();
        let diff = target_m - start_m;
        let length_m = diff.norm();

        let (heading_rad, direction) = if length_m < MIN_SEGMENT_LENGTH_M {
            (target.heading(), target.forward2())
        } else {
            (diff[1].atan2(diff[0]), diff / length_m)
        };

        PathSegment {
            target_m,
            start_m,
            length_m,
            heading_rad,
            direction,
        }
    }

    /// True if the segment has (numerically) zero length.
    pub fn is_degenerate(&self) -> bool {
        self.length_m < MIN_SEGMENT_LENGTH_M
    }

    /// Unclamped progress of the orthogonal projection of `point_m` onto the
    /// segment's line, 0 at the start and 1 at the target.
    ///
    /// Degenerate segments report a progress of 1, i.e. they are always
    /// considered to have been passed.
    pub fn progress(&self, point_m: &Vector2<f64>) -> f64 {
        if self.is_degenerate() {
            return 1.0;
        }

        (point_m - self.start_m).dot(&self.direction) / self.length_m
    }

    /// How far along the segment the projection of `point_m` lies, clamped to
    /// [0, 1].
    pub fn how_far_along(&self, point_m: &Vector2<f64>) -> f64 {
        self.progress(point_m).max(0.0).min(1.0)
    }

    /// Point at the given (clamped) progress along the segment.
    pub fn point_at(&self, t: f64) -> Vector2<f64> {
        self.start_m + (self.target_m - self.start_m) * t.max(0.0).min(1.0)
    }

    /// Signed perpendicular distance from `point_m` to the segment's line,
    /// positive if the point is to the right of the direction of travel.
    pub fn lateral_offset(&self, point_m: &Vector2<f64>) -> f64 {
        // 2D cross of the direction with the point->line vector. If the line
        // is on the left of the point (+ve cross) the point is on the right.
        self.direction.perp(&(self.start_m - point_m))
    }
}
