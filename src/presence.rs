//! Presence-window aggregation.
//!
//! Each device entry records only its earliest and latest time-of-day
//! markers and an associated location. Location replacements are mirrored
//! into a population counter grid: the new cell is incremented and, when a
//! prior location is overwritten, its old cell is decremented in the same
//! step.

use std::io::Write;

use crate::config::RetentionPolicy;
use crate::grid::GridSpec;

/// Time markers are packed `hour * 100 + minute`; writes are masked to the
/// low 12 bits. Domain values never exceed 2359, so the mask never changes
/// a value today, but the stored encoding is pinned to 12 bits.
const MARKER_MASK: u16 = 0x0FFF;

/// Marker value 0 doubles as the "unset" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RunningWindowValue {
    pub earliest_marker: u16,
    pub latest_marker: u16,
    pub earliest_location: (f32, f32),
    pub latest_location: (f32, f32),
}

/// A single location replacement to mirror into the counter grid.
///
/// The increment and the paired decrement describe one key's transition and
/// must be applied together.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridTransition {
    /// Cell location gaining a stay.
    pub incremented: (f32, f32),
    /// Previously stored location losing its stay, unless it was the
    /// `(0, 0)` sentinel.
    pub decremented: Option<(f32, f32)>,
}

impl RunningWindowValue {
    fn is_unset(&self) -> bool {
        // A midnight marker re-enters via the sentinel rules below, but its
        // stored location still gets the paired decrement on replacement.
        *self == Self::default()
    }

    /// Fold one observation into the window.
    ///
    /// Returns the grid transition when a location slot was actually
    /// replaced; marker-only updates return `None`.
    pub fn absorb(
        &mut self,
        marker: u16,
        lat: f32,
        lon: f32,
        policy: RetentionPolicy,
    ) -> Option<GridTransition> {
        let marker = marker & MARKER_MASK;
        if self.is_unset() {
            self.earliest_marker = marker;
            self.latest_marker = marker;
            self.earliest_location = (lat, lon);
            self.latest_location = (lat, lon);
            return Some(GridTransition {
                incremented: (lat, lon),
                decremented: None,
            });
        }

        let mut replaced = None;
        if self.earliest_marker == 0 || marker < self.earliest_marker {
            self.earliest_marker = marker;
            if policy == RetentionPolicy::KeepEarliest {
                replaced = Some(self.earliest_location);
                self.earliest_location = (lat, lon);
            }
        }
        if self.latest_marker == 0 || marker > self.latest_marker {
            self.latest_marker = marker;
            if policy == RetentionPolicy::KeepLatest {
                replaced = Some(self.latest_location);
                self.latest_location = (lat, lon);
            }
        }

        let old = replaced?;
        Some(GridTransition {
            incremented: (lat, lon),
            decremented: (old != (0.0, 0.0)).then_some(old),
        })
    }
}

/// Per-cell stay counters over a bounded geographic grid.
///
/// An explicit object owned by the batch; constructed once per run and
/// serialized explicitly at the end.
pub struct PresenceGridAccumulator {
    spec: GridSpec,
    cells: Vec<i64>,
}

impl PresenceGridAccumulator {
    pub fn new(spec: GridSpec) -> Self {
        let cells = vec![0; spec.rows * spec.cols];
        Self { spec, cells }
    }

    /// Apply one location transition: increment the new cell, decrement the
    /// old one if present. Out-of-range locations are dropped silently.
    pub fn apply(&mut self, transition: &GridTransition) {
        let (lat, lon) = transition.incremented;
        self.bump(f64::from(lat), f64::from(lon), 1);
        if let Some((lat, lon)) = transition.decremented {
            self.bump(f64::from(lat), f64::from(lon), -1);
        }
    }

    fn bump(&mut self, lat: f64, lon: f64, delta: i64) {
        if let Some((row, col)) = self.spec.cell(lat, lon) {
            self.cells[row * self.spec.cols + col] += delta;
        }
    }

    /// Counter at `(row, col)`; `None` outside the grid.
    pub fn count(&self, row: usize, col: usize) -> Option<i64> {
        if row >= self.spec.rows || col >= self.spec.cols {
            return None;
        }
        Some(self.cells[row * self.spec.cols + col])
    }

    /// Sum of all counters.
    pub fn total(&self) -> i64 {
        self.cells.iter().sum()
    }

    /// Write the grid as whitespace-separated integers, one row per line.
    pub fn write_to<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        for row in 0..self.spec.rows {
            for col in 0..self.spec.cols {
                write!(out, "{} ", self.cells[row * self.spec.cols + col])?;
            }
            writeln!(out)?;
        }
        Ok(())
    }
}
