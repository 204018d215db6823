//! Region timeline - sorted breakpoints over a normalized `[0, 1)` axis
//!
//! The timeline stores only breakpoints. Regions are derived on demand as
//! the half-open intervals between consecutive breakpoints, the last one
//! ending at `1.0`:
//!
//! ```text
//!   breakpoints:  0.0        0.25            0.6              (1.0)
//!                 │───────────│───────────────│────────────────│
//!   regions:      [   0      )[      1       )[       2       )
//! ```
//!
//! Breakpoints are stored verbatim and never recomputed, so slicing the
//! same position after a heal reproduces bit-identical region bounds.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by timeline mutations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimelineError {
    /// Region index past the end, or 0 for a heal
    #[error("Invalid region index {index} (timeline has {count} regions)")]
    InvalidRegionIndex { index: usize, count: usize },
}

/// Result type for timeline operations
pub type TimelineResult<T> = Result<T, TimelineError>;

/// Half-open interval `[start, end)` on the normalized timeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Inclusive start (a breakpoint)
    pub start: f64,
    /// Exclusive end (the next breakpoint, or 1.0)
    pub end: f64,
}

impl Region {
    /// Create a region from its bounds
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// The region covering the entire clip
    pub fn full() -> Self {
        Self::new(0.0, 1.0)
    }

    /// Normalized length
    pub fn len(&self) -> f64 {
        self.end - self.start
    }

    /// Check if the region has zero length
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Check if a position falls inside `[start, end)`
    pub fn contains(&self, position: f64) -> bool {
        position >= self.start && position < self.end
    }
}

/// Ordered, duplicate-free breakpoint set that always contains `0.0`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<f64>", into = "Vec<f64>")]
pub struct Timeline {
    breakpoints: Vec<f64>,
}

impl Timeline {
    /// Create a timeline with a single region covering `[0, 1)`
    pub fn new() -> Self {
        Self {
            breakpoints: vec![0.0],
        }
    }

    /// Build a timeline from arbitrary positions
    ///
    /// Non-finite and out-of-range values are dropped, duplicates removed and
    /// `0.0` added if missing.
    pub fn from_breakpoints(positions: impl IntoIterator<Item = f64>) -> Self {
        let mut breakpoints: Vec<f64> = positions
            .into_iter()
            .filter(|p| is_valid_position(*p))
            .map(|p| if p == 0.0 { 0.0 } else { p })
            .collect();
        breakpoints.push(0.0);
        breakpoints.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        breakpoints.dedup();
        Self { breakpoints }
    }

    /// Sorted breakpoints, starting with `0.0`
    pub fn breakpoints(&self) -> &[f64] {
        &self.breakpoints
    }

    /// Number of regions (always equal to the number of breakpoints)
    pub fn len(&self) -> usize {
        self.breakpoints.len()
    }

    /// Always false: a timeline has at least one region
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Insert a breakpoint, splitting the region that contains it
    ///
    /// Returns the index of the newly formed region (the one starting at
    /// `position`). Positions outside `[0, 1)`, non-finite values and
    /// positions that are already breakpoints leave the timeline unchanged
    /// and return `None`.
    pub fn slice(&mut self, position: f64) -> Option<usize> {
        if !is_valid_position(position) {
            log::debug!("slice: ignoring out-of-range position {}", position);
            return None;
        }

        match self.search(position) {
            Ok(_) => {
                log::debug!("slice: {} is already a breakpoint", position);
                None
            }
            Err(index) => {
                self.breakpoints.insert(index, position);
                Some(index)
            }
        }
    }

    /// Remove the breakpoint starting region `index`, merging it into the
    /// preceding region
    ///
    /// Returns the merged region. Region 0 has no predecessor and cannot be
    /// healed.
    pub fn heal(&mut self, index: usize) -> TimelineResult<Region> {
        let count = self.len();
        if index == 0 || index >= count {
            return Err(TimelineError::InvalidRegionIndex { index, count });
        }

        self.breakpoints.remove(index);
        Ok(self.region_at(index - 1))
    }

    /// Derive all regions in order
    pub fn regions(&self) -> Vec<Region> {
        (0..self.len()).map(|i| self.region_at(i)).collect()
    }

    /// Region by index
    pub fn region(&self, index: usize) -> Option<Region> {
        (index < self.len()).then(|| self.region_at(index))
    }

    /// Index of the region containing `position`
    ///
    /// A position equal to a breakpoint belongs to the region starting
    /// there. Positions below 0 map to the first region and positions at or
    /// past 1 map to the last.
    pub fn region_containing(&self, position: f64) -> usize {
        if position.is_nan() || position <= 0.0 {
            return 0;
        }
        // Count of breakpoints <= position; at least 1 because of 0.0
        self.breakpoints.partition_point(|b| *b <= position) - 1
    }

    /// Index of the first region starting strictly after `position`
    pub fn next_region_after(&self, position: f64) -> Option<usize> {
        if position.is_nan() {
            return None;
        }
        let index = self.breakpoints.partition_point(|b| *b <= position);
        (index < self.len()).then_some(index)
    }

    /// Reset to a single region covering `[0, 1)`
    pub fn clear(&mut self) {
        self.breakpoints.clear();
        self.breakpoints.push(0.0);
    }

    fn region_at(&self, index: usize) -> Region {
        let start = self.breakpoints[index];
        let end = self.breakpoints.get(index + 1).copied().unwrap_or(1.0);
        Region::new(start, end)
    }

    fn search(&self, position: f64) -> Result<usize, usize> {
        self.breakpoints
            .binary_search_by(|b| b.partial_cmp(&position).unwrap_or(Ordering::Less))
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vec<f64>> for Timeline {
    fn from(positions: Vec<f64>) -> Self {
        Self::from_breakpoints(positions)
    }
}

impl From<Timeline> for Vec<f64> {
    fn from(timeline: Timeline) -> Self {
        timeline.breakpoints
    }
}

fn is_valid_position(position: f64) -> bool {
    position.is_finite() && (0.0..1.0).contains(&position)
}
