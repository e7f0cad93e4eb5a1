//! # Path consolidation
//!
//! A raw path from the planner may reverse direction any number of times.
//! Consolidation splits it at every such reversal (a cusp) into maximal runs
//! driven in a single gear, so that the controller only ever tracks one
//! direction at a time.
//!
//! The states of every forward run are stored back to back in one buffer and
//! those of every reverse run in another, with each [`Run`] recording where
//! its states live. Runs are disjoint, so the two buffers together hold
//! exactly the raw path. Every run after the first is entered from the cusp
//! which ended the previous run, which is therefore prepended to the run's
//! [`SubPath`] view as its lead-in waypoint.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info};
use serde::Serialize;
use std::ops::RangeInclusive;

// Internal
use super::{StopProfile, TrajCtrlError, Waypoints};
use crate::pose::{Gear, State2D};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A raw path split into single gear runs.
#[derive(Debug, Clone, Serialize)]
pub struct ConsolidatedPath {
    /// The states of all forward runs, in path order.
    pub forward_path: Vec<State2D>,

    /// The states of all reverse runs, in path order.
    pub reverse_path: Vec<State2D>,

    /// Raw indices at which the gear changes. Each is the final state of one
    /// run.
    pub cusps: Vec<usize>,

    /// Raw indices at which the vehicle must come to rest: every cusp and
    /// the final state of the path.
    pub stopping: Vec<usize>,

    /// Raw index ranges approaching each stopping index in which the speed
    /// is limited.
    pub low_speed: Vec<RangeInclusive<usize>>,

    runs: Vec<Run>,
    raw_len: usize,
}

/// A maximal single gear run of the raw path.
#[derive(Debug, Clone, Serialize)]
pub struct Run {
    pub gear: Gear,

    /// Raw index of the first state in the run
    pub raw_start: usize,

    /// Offset of the run's states into the buffer for its gear
    offset: usize,

    /// Number of states in the run
    len: usize,

    /// The cusp the run starts from, `None` for the first run.
    lead: Option<State2D>,

    /// Arc length from each waypoint of the run's view to its final
    /// waypoint.
    ///
    /// Units: meters
    remaining_m: Vec<f64>,

    /// First view index from which the stop profile limits the speed.
    low_speed_from: usize,
}

/// A view of a single run as a sequence of waypoints, including the lead-in
/// cusp if there is one.
#[derive(Debug, Clone, Copy)]
pub struct SubPath<'a> {
    pub gear: Gear,
    lead: Option<&'a State2D>,
    states: &'a [State2D],
    raw_start: usize,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ConsolidatedPath {
    /// Consolidate a raw path.
    ///
    /// Fails with `InvalidPath` if the path has fewer than two states.
    pub fn new(raw: &[State2D], profile: &StopProfile) -> Result<Self, TrajCtrlError> {
        if raw.len() < 2 {
            return Err(TrajCtrlError::InvalidPath {
                num_states: raw.len(),
            });
        }

        // ---- CUSPS AND STOPPING POINTS ----

        let cusps: Vec<usize> = (0..raw.len() - 1)
            .filter(|&i| raw[i].gear != raw[i + 1].gear)
            .collect();

        let mut stopping = cusps.clone();
        stopping.push(raw.len() - 1);

        // ---- RUNS ----

        let mut forward_path = Vec::new();
        let mut reverse_path = Vec::new();
        let mut runs = Vec::with_capacity(stopping.len());

        let mut start = 0;
        for &end in &stopping {
            let gear = raw[start].gear;
            let buffer = match gear {
                Gear::Forward => &mut forward_path,
                Gear::Reverse => &mut reverse_path,
            };

            let offset = buffer.len();
            buffer.extend_from_slice(&raw[start..=end]);

            runs.push(Run {
                gear,
                raw_start: start,
                offset,
                len: end + 1 - start,
                lead: if start > 0 { Some(raw[start - 1]) } else { None },
                remaining_m: Vec::new(),
                low_speed_from: 0,
            });

            start = end + 1;
        }

        let mut path = Self {
            forward_path,
            reverse_path,
            cusps,
            stopping,
            low_speed: Vec::new(),
            runs,
            raw_len: raw.len(),
        };

        path.update_low_speed_regions(profile);

        info!(
            "Consolidated {} states into {} run(s): {} forward, {} reverse, cusps at {:?}",
            path.raw_len,
            path.runs.len(),
            path.forward_path.len(),
            path.reverse_path.len(),
            path.cusps
        );

        Ok(path)
    }

    /// Recompute the remaining distances and low speed regions of every run
    /// for the given stop profile.
    pub fn update_low_speed_regions(&mut self, profile: &StopProfile) {
        let mut low_speed = Vec::with_capacity(self.runs.len());

        for i in 0..self.runs.len() {
            let (remaining_m, low_speed_from) = {
                let view = self.sub_path(i);
                let remaining_m = remaining_distances(&view);
                let lookback_m = profile.lookback_m(view.gear);

                let mut from = view.last_index();
                while from > 0 && remaining_m[from] <= lookback_m {
                    from -= 1;
                }

                low_speed.push(view.raw_index(from)..=view.raw_index(view.last_index()));

                (remaining_m, from)
            };

            let run = &mut self.runs[i];
            debug!(
                "Run {} ({:?}) length {:.3} m, low speed from view index {}",
                i,
                run.gear,
                remaining_m.first().copied().unwrap_or(0.0),
                low_speed_from
            );
            run.remaining_m = remaining_m;
            run.low_speed_from = low_speed_from;
        }

        self.low_speed = low_speed;
    }

    /// Number of runs in the path.
    pub fn num_runs(&self) -> usize {
        self.runs.len()
    }

    /// The run with index `i`, if any.
    pub fn run(&self, i: usize) -> Option<&Run> {
        self.runs.get(i)
    }

    /// The gear of the first run.
    pub fn first_gear(&self) -> Gear {
        self.runs.first().map(|r| r.gear).unwrap_or_default()
    }

    /// The waypoint view of run `i`.
    ///
    /// # Panics
    /// - If `i >= self.num_runs()`.
    pub fn sub_path(&self, i: usize) -> SubPath<'_> {
        let run = &self.runs[i];
        let buffer = match run.gear {
            Gear::Forward => &self.forward_path,
            Gear::Reverse => &self.reverse_path,
        };

        SubPath {
            gear: run.gear,
            lead: run.lead.as_ref(),
            states: &buffer[run.offset..run.offset + run.len],
            raw_start: run.raw_start,
        }
    }
}

impl Run {
    /// Arc length from view waypoint `i` to the end of the run.
    pub fn remaining_from(&self, i: usize) -> f64 {
        self.remaining_m
            .get(i)
            .or_else(|| self.remaining_m.last())
            .copied()
            .unwrap_or(0.0)
    }

    /// First view index from which the stop profile applies.
    pub fn low_speed_from(&self) -> usize {
        self.low_speed_from
    }
}

impl<'a> SubPath<'a> {
    /// Raw path index of view waypoint `i`.
    pub fn raw_index(&self, i: usize) -> usize {
        match self.lead {
            Some(_) => self.raw_start + i - 1,
            None => self.raw_start + i,
        }
    }
}

impl<'a> Waypoints for SubPath<'a> {
    fn num_waypoints(&self) -> usize {
        self.states.len() + self.lead.is_some() as usize
    }

    fn waypoint(&self, i: usize) -> &State2D {
        match (self.lead, i) {
            (Some(lead), 0) => lead,
            (Some(_), i) => &self.states[i - 1],
            (None, i) => &self.states[i],
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Arc length from each waypoint to the final waypoint.
fn remaining_distances<W: Waypoints + ?Sized>(path: &W) -> Vec<f64> {
    let n = path.num_waypoints();
    let mut remaining = vec![0.0; n];

    for i in (0..n.saturating_sub(1)).rev() {
        let seg_len = path.segment_to(i + 1).map(|s| s.length_m).unwrap_or(0.0);
        remaining[i] = remaining[i + 1] + seg_len;
    }

    remaining
}
