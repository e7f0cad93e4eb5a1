//! # Path following library.
//!
//! This library allows other crates in the workspace, and the `follow_sim`
//! binary, to access the path following controller.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Path - the waypoint sequences produced by the planner
pub mod path;

/// Pose - 2D pose and vehicle state primitives
pub mod pose;

/// Trajectory control module - keeps the vehicle on the given path
pub mod traj_ctrl;

/// Vehicle model - the fixed kinematic parameters of the vehicle
pub mod vehicle;

#[cfg(test)]
pub(crate) mod test_fixtures;
