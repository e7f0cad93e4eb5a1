//! # Trajectory control module
//!
//! Trajectory control keeps the vehicle on a planned path, which may reverse
//! direction any number of times. It does this using the Stanley steering
//! law for lateral control, and a speed profile which brings the vehicle to
//! rest on every stopping point for longitudinal control.
//!
//! The path itself is made up of a number of states, each carrying the gear
//! in which the vehicle drives towards it. A path segment is defined as the
//! line connecting two neighbouring states. Before being followed the path is
//! consolidated, that is split at every cusp (a change of gear) into runs
//! driven in a single gear.
//!
//! Each tick the vehicle is localized on the active run, then the closest
//! point on the current segment to the reference axle is found. In forward
//! gear the reference axle is the front axle, in reverse it is the "fake"
//! front axle, the front axle reflected onto the rear, which leads when
//! backing up. The cross-track error is the signed distance from the
//! reference axle to the path and the heading error is the difference
//! between the vehicle's direction of travel and the segment's.
//!
//! At the end of each run the vehicle is brought to rest before the next run
//! is started, or the path is complete.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod closest;
pub mod consolidate;
pub mod controllers;
pub mod localize;
pub mod params;
pub mod sim;
pub mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use closest::*;
pub use consolidate::*;
pub use controllers::*;
pub use localize::*;
pub use params::Params;
pub use sim::{SimStep, Simulation};
pub use state::*;
