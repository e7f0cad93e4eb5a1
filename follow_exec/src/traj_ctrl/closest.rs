//! # Closest point and error estimation
//!
//! Projects the vehicle's reference axle onto the segment of the active
//! localization window and computes the cross-track and heading errors the
//! steering law acts on.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::Serialize;

// Internal
use crate::{
    path::PathSegment,
    pose::{Gear, Pose2D, State2D},
    vehicle::VehicleModel,
};
use util::maths::get_ang_dist_2pi;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The closest point on the path to the reference axle, and the errors
/// relative to it.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ClosestPoint {
    /// The closest point. Its heading is the vehicle heading the path
    /// expects at that point, i.e. it faces away from the direction of
    /// travel when reversing.
    pub point: Pose2D,

    /// Fraction of the segment covered, clamped to [0, 1]
    pub progress: f64,

    /// Units: meters
    pub segment_length_m: f64,

    /// Signed lateral distance of the reference axle from the path, positive
    /// when the axle is to the right of the direction of travel.
    ///
    /// Units: meters
    pub cross_track_error_m: f64,

    /// Angle from the direction of travel of the vehicle to that of the
    /// path, anticlockwise positive, in [-pi, pi].
    ///
    /// Units: radians
    pub heading_error_rad: f64,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Compute the closest point on the segment from `prev` to `next` to the
/// reference axle of `car`.
///
/// In forward gear the reference axle is the front axle, in reverse it is
/// the fake front axle. If the two waypoints coincide the closest point is
/// the waypoint itself and the path heading is taken from it.
pub fn closest_point(
    car: &State2D,
    prev: &State2D,
    next: &State2D,
    gear: Gear,
    vehicle: &VehicleModel,
) -> ClosestPoint {
    let axle_m = vehicle.reference_axle(&car.pose, gear);
    let car_travel_rad = gear.travel_heading(car.heading());

    let segment = PathSegment::between(&prev.pose, &next.pose);

    if segment.is_degenerate() {
        let path_travel_rad = gear.travel_heading(next.heading());

        // Lateral error against a line through the waypoint along its
        // direction of travel.
        let line = PathSegment {
            direction: Vector2::new(path_travel_rad.cos(), path_travel_rad.sin()),
            ..segment
        };

        return ClosestPoint {
            point: next.pose,
            progress: 1.0,
            segment_length_m: 0.0,
            cross_track_error_m: line.lateral_offset(&axle_m),
            heading_error_rad: get_ang_dist_2pi(car_travel_rad, path_travel_rad),
        };
    }

    let progress = segment.how_far_along(&axle_m);
    let point_m = segment.point_at(progress);

    // The segment always points in the direction of travel, the vehicle
    // faces the other way when reversing.
    let point = Pose2D::from_position(point_m, segment.heading_rad);
    let point = match gear {
        Gear::Forward => point,
        Gear::Reverse => point.rotated_pi(),
    };

    ClosestPoint {
        point,
        progress,
        segment_length_m: segment.length_m,
        cross_track_error_m: segment.lateral_offset(&axle_m),
        heading_error_rad: get_ang_dist_2pi(car_travel_rad, segment.heading_rad),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_fixtures::vehicle;
    use std::f64::consts::PI;

    fn state(x: f64, y: f64, h: f64, gear: Gear) -> State2D {
        State2D::new(Pose2D::new(x, y, h), gear)
    }

    #[test]
    fn test_on_waypoint() {
        let v = vehicle();
        let prev = state(0.0, 0.0, 0.0, Gear::Forward);
        let next = state(3.0, 0.0, 0.0, Gear::Forward);

        // Centre 1 m behind the target puts the front axle on it
        let car = state(2.0, 0.0, 0.0, Gear::Forward);
        let cp = closest_point(&car, &prev, &next, Gear::Forward, &v);

        assert_eq!(cp.cross_track_error_m, 0.0);
        assert_eq!(cp.heading_error_rad, 0.0);
        assert_eq!(cp.progress, 1.0);
        assert!((cp.point.position() - next.position()).norm() < 1e-12);
    }

    #[test]
    fn test_error_signs() {
        let v = vehicle();
        let prev = state(0.0, 0.0, 0.0, Gear::Forward);
        let next = state(4.0, 0.0, 0.0, Gear::Forward);

        // Left of the path and pointing right of it
        let car = state(1.0, 0.5, 0.2, Gear::Forward);
        let cp = closest_point(&car, &prev, &next, Gear::Forward, &v);

        assert!(cp.cross_track_error_m < 0.0);
        assert!((cp.heading_error_rad + 0.2).abs() < 1e-12);
        assert!(cp.progress > 0.0 && cp.progress < 1.0);

        // Projection is clamped rather than extrapolated
        let car = state(-5.0, 0.0, 0.0, Gear::Forward);
        let cp = closest_point(&car, &prev, &next, Gear::Forward, &v);
        assert_eq!(cp.progress, 0.0);
        assert!((cp.point.position() - prev.position()).norm() < 1e-12);
    }

    #[test]
    fn test_reverse() {
        let v = vehicle();
        // Reversing along -x while facing +x
        let prev = state(4.0, 0.0, 0.0, Gear::Reverse);
        let next = state(0.0, 0.0, 0.0, Gear::Reverse);

        // Rear axle 0.3 m above the path, i.e. right of the direction of
        // travel
        let car = state(3.0, 0.3, 0.0, Gear::Reverse);
        let cp = closest_point(&car, &prev, &next, Gear::Reverse, &v);

        assert!((cp.cross_track_error_m - 0.3).abs() < 1e-12);
        assert!(cp.heading_error_rad.abs() < 1e-12);
        assert!((cp.point.x() - 2.0).abs() < 1e-12);
        assert!(cp.point.heading().abs() < 1e-12);

        // Same geometry driven forwards by the car rotated by pi gives the
        // same errors
        let fwd_prev = state(4.0, 0.0, PI, Gear::Forward);
        let fwd_next = state(0.0, 0.0, PI, Gear::Forward);
        let fwd_car = State2D::new(car.pose.rotated_pi(), Gear::Forward);
        let fwd = closest_point(&fwd_car, &fwd_prev, &fwd_next, Gear::Forward, &v);

        assert!((fwd.cross_track_error_m - cp.cross_track_error_m).abs() < 1e-9);
        assert!((fwd.heading_error_rad - cp.heading_error_rad).abs() < 1e-9);
        assert!((fwd.point.position() - cp.point.position()).norm() < 1e-9);
    }

    #[test]
    fn test_degenerate_segment() {
        let v = vehicle();
        let wp = state(1.0, 1.0, PI / 2.0, Gear::Forward);
        let car = state(1.5, 0.0, PI / 2.0 - 0.1, Gear::Forward);

        let cp = closest_point(&car, &wp, &wp, Gear::Forward, &v);

        assert_eq!(cp.point, wp.pose);
        assert_eq!(cp.segment_length_m, 0.0);
        assert!((cp.heading_error_rad - 0.1).abs() < 1e-9);
        // Right of a path heading +y
        assert!(cp.cross_track_error_m > 0.0);
    }
}
