//! # Localizer
//!
//! Tracks where along the active sub-path the vehicle currently is, as a
//! window of two waypoint indices bracketing the reference axle.
//!
//! The search only ever moves forwards from the previous window, so the cost
//! of a tick is proportional to the number of waypoints passed since the
//! last tick rather than to the length of the path.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use nalgebra::Vector2;
use serde::Serialize;

// Internal
use crate::{
    path::{Path, PathSegment},
    pose::State2D,
};

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// An ordered, indexable sequence of waypoints.
pub trait Waypoints {
    /// Number of waypoints in the sequence.
    fn num_waypoints(&self) -> usize;

    /// The waypoint at index `i`.
    ///
    /// # Panics
    /// - If `i >= self.num_waypoints()`.
    fn waypoint(&self, i: usize) -> &State2D;

    /// The segment from waypoint `i - 1` to waypoint `i`, `None` if there is
    /// no such segment.
    fn segment_to(&self, i: usize) -> Option<PathSegment> {
        if i == 0 || i >= self.num_waypoints() {
            return None;
        }

        Some(PathSegment::between(
            &self.waypoint(i - 1).pose,
            &self.waypoint(i).pose,
        ))
    }

    /// Index of the final waypoint, 0 for an empty sequence.
    fn last_index(&self) -> usize {
        self.num_waypoints().saturating_sub(1)
    }
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The pair of waypoint indices bracketing the vehicle's longitudinal
/// position.
///
/// `prev <= next` always holds. At the end of the path both are equal to the
/// final index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Window {
    pub prev: usize,
    pub next: usize,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Waypoints for [State2D] {
    fn num_waypoints(&self) -> usize {
        self.len()
    }

    fn waypoint(&self, i: usize) -> &State2D {
        &self[i]
    }
}

impl Waypoints for Path {
    fn num_waypoints(&self) -> usize {
        self.states.len()
    }

    fn waypoint(&self, i: usize) -> &State2D {
        &self.states[i]
    }
}

impl Window {
    /// The window at the start of a sub-path.
    pub fn start() -> Self {
        Self { prev: 0, next: 1 }
    }

    /// True if the window has collapsed onto a single waypoint.
    pub fn is_collapsed(&self) -> bool {
        self.prev == self.next
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Find the localization window for the reference point `reference_m`,
/// searching forwards from `hint_prev`.
///
/// The window advances past every segment whose target the reference point
/// has already passed (its projection lies beyond the segment end), and past
/// zero length segments. If the hint is at or beyond the final waypoint, or
/// the reference point has passed the end of the final segment, the window
/// collapses onto the final waypoint to signal the end of the path.
pub fn localize<W>(reference_m: &Vector2<f64>, path: &W, hint_prev: usize) -> Window
where
    W: Waypoints + ?Sized,
{
    let last = path.last_index();

    if hint_prev >= last {
        return Window {
            prev: last,
            next: last,
        };
    }

    let mut prev = hint_prev;

    while prev < last {
        let passed = match path.segment_to(prev + 1) {
            Some(seg) => seg.is_degenerate() || seg.progress(reference_m) > 1.0,
            None => true,
        };

        if !passed {
            break;
        }

        prev += 1;
    }

    let window = if prev >= last {
        Window {
            prev: last,
            next: last,
        }
    } else {
        Window {
            prev,
            next: prev + 1,
        }
    };

    if window.prev != hint_prev {
        trace!(
            "Localised from waypoint {} to window ({}, {})",
            hint_prev,
            window.prev,
            window.next
        );
    }

    window
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pose::{Gear, Pose2D};

    fn straight(n: usize) -> Path {
        Path::direct(
            Pose2D::new(0.0, 0.0, 0.0),
            Vector2::new((n - 1) as f64, 0.0),
            1.0,
            Gear::Forward,
        )
        .unwrap()
    }

    #[test]
    fn test_localize_start() {
        let path = straight(5);
        let w = localize(&Vector2::new(0.2, 0.3), &path, 0);
        assert_eq!(w, Window { prev: 0, next: 1 });

        // Behind the start stays on the first segment
        let w = localize(&Vector2::new(-3.0, 0.0), &path, 0);
        assert_eq!(w, Window::start());
    }

    #[test]
    fn test_localize_monotonic() {
        let path = straight(10);
        let mut hint = 0;
        let mut last_prev = 0;

        for i in 0..100 {
            let x = i as f64 * 0.1;
            let w = localize(&Vector2::new(x, 0.1), &path, hint);
            assert!(w.prev <= w.next);
            assert!(w.prev >= last_prev);
            last_prev = w.prev;
            hint = w.prev;
        }

        // Moving backwards never relocalises behind the hint
        let w = localize(&Vector2::new(0.0, 0.0), &path, 6);
        assert_eq!(w, Window { prev: 6, next: 7 });
    }

    #[test]
    fn test_localize_end() {
        let path = straight(4);

        // Beyond the final waypoint
        let w = localize(&Vector2::new(3.5, 0.0), &path, 1);
        assert_eq!(w, Window { prev: 3, next: 3 });
        assert!(w.is_collapsed());

        // Hint past the end
        let w = localize(&Vector2::new(0.0, 0.0), &path, 10);
        assert_eq!(w, Window { prev: 3, next: 3 });

        // Exactly on the final waypoint is still on the last segment
        let w = localize(&Vector2::new(3.0, 0.0), &path, 0);
        assert_eq!(w, Window { prev: 2, next: 3 });
    }

    #[test]
    fn test_localize_skips_degenerate() {
        let mut states = straight(4).states;
        states.insert(2, states[1]);

        let w = localize(&Vector2::new(1.0, 0.0), states.as_slice(), 1);
        assert_eq!(w, Window { prev: 2, next: 3 });

        // Single waypoint path is always at its end
        let w = localize(&Vector2::new(1.0, 0.0), &states[..1], 0);
        assert_eq!(w, Window { prev: 0, next: 0 });
    }
}
