//! Geographic grid cell mapping.
//!
//! Maps WGS84 coordinates onto a fixed row/column counter grid. The presence
//! pipeline uses a bounded grid; trajectory sharding uses its own unbounded
//! variant (see `shard`).

use serde::{Deserialize, Serialize};

/// A fixed geographic grid anchored at a south-west origin.
///
/// Cells are `cell_size` degrees on a side. Row 0 starts at `lat_min`,
/// column 0 at `lon_min`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    /// Southern latitude bound (degrees).
    pub lat_min: f64,
    /// Western longitude bound (degrees).
    pub lon_min: f64,
    /// Cell edge length in degrees.
    pub cell_size: f64,
    /// Number of rows (latitude direction).
    pub rows: usize,
    /// Number of columns (longitude direction).
    pub cols: usize,
}

impl Default for GridSpec {
    fn default() -> Self {
        // LA-area study box: 0.02 degree cells over 33.4..34.3 x -118.6..-117.6.
        Self {
            lat_min: 33.4,
            lon_min: -118.6,
            cell_size: 0.02,
            rows: 45,
            cols: 50,
        }
    }
}

impl GridSpec {
    /// Northern latitude bound.
    pub fn lat_max(&self) -> f64 {
        self.lat_min + self.cell_size * self.rows as f64
    }

    /// Eastern longitude bound.
    pub fn lon_max(&self) -> f64 {
        self.lon_min + self.cell_size * self.cols as f64
    }

    /// Whether a point falls inside the grid's bounding box (bounds inclusive).
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.lat_min && lat <= self.lat_max() && lon >= self.lon_min && lon <= self.lon_max()
    }

    /// Map a point to its `(row, col)` cell, or `None` if it lands outside
    /// `[0, rows) x [0, cols)`.
    pub fn cell(&self, lat: f64, lon: f64) -> Option<(usize, usize)> {
        let row = ((lat - self.lat_min) / self.cell_size).floor();
        let col = ((lon - self.lon_min) / self.cell_size).floor();
        if row < 0.0 || col < 0.0 {
            return None;
        }
        let (row, col) = (row as usize, col as usize);
        if row >= self.rows || col >= self.cols {
            return None;
        }
        Some((row, col))
    }
}
