//! Pipeline configuration.
//!
//! Every threshold the pipelines depend on lives here rather than in code:
//! grid geometry, time-gap and speed cutoffs, store sizing, CSV column
//! positions, and the presence location retention policy.

use serde::{Deserialize, Serialize};

use crate::grid::GridSpec;

/// Which location slot of a presence entry tracks fresh coordinates.
///
/// The time markers always update; only the retained location differs.
/// Fixed per run, never per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetentionPolicy {
    /// Keep the location seen at the earliest time-of-day marker.
    KeepEarliest,
    /// Keep the location seen at the latest time-of-day marker.
    KeepLatest,
}

/// Positional CSV columns for the raw ping format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvColumns {
    /// Device/advertiser identifier column.
    pub key: usize,
    /// Timestamp column (`YYYY-MM-DD HH:MM:SS`).
    pub timestamp: usize,
    /// Latitude column.
    pub latitude: usize,
    /// Longitude column.
    pub longitude: usize,
    /// Speed column (m/s).
    pub speed: usize,
}

impl Default for CsvColumns {
    fn default() -> Self {
        Self {
            key: 0,
            timestamp: 3,
            latitude: 4,
            longitude: 5,
            speed: 10,
        }
    }
}

/// Configuration for the trajectory pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrajectoryConfig {
    /// Maximum gap between consecutive points of one trajectory, in seconds.
    /// Default: 14400 (4 hours).
    pub max_time_diff: i64,

    /// Pings at or above this speed (m/s) are discarded on ingest.
    /// Default: 7.0 (25 km/h).
    pub max_speed: f64,

    /// Shard grid cell edge length in degrees.
    /// Default: 0.01 (roughly 1 km).
    pub shard_cell_size: f64,

    /// Shard grid origin (latitude, longitude).
    pub shard_origin: (f64, f64),

    /// Initial bucket count hint for the per-batch store.
    /// Default: 1000.
    pub initial_capacity: usize,
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        Self {
            max_time_diff: 14_400,
            max_speed: 7.0,
            shard_cell_size: 0.01,
            shard_origin: (0.0, 0.0),
            initial_capacity: 1000,
        }
    }
}

/// Configuration for the presence (mobile-filter) pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Counter grid geometry.
    pub grid: GridSpec,

    /// Start of the overnight "stay" window, inclusive local hour.
    /// Default: 20.
    pub window_start_hour: u8,

    /// End of the overnight "stay" window, exclusive local hour.
    /// Default: 4.
    pub window_end_hour: u8,

    /// Pings with `|speed|` at or above this bound (m/s) are not stays.
    /// Default: 3.0.
    pub stationary_speed: f64,

    /// Which location slot tracks fresh coordinates.
    /// Default: `KeepEarliest`.
    pub retention: RetentionPolicy,

    /// Initial bucket count hint for the per-batch store.
    /// Default: 2_000_003.
    pub initial_capacity: usize,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            grid: GridSpec::default(),
            window_start_hour: 20,
            window_end_hour: 4,
            stationary_speed: 3.0,
            retention: RetentionPolicy::KeepEarliest,
            initial_capacity: 2_000_003,
        }
    }
}

impl PresenceConfig {
    /// Whether a local hour falls inside the overnight window.
    ///
    /// The window may wrap midnight (20..04) or not (01..05).
    pub fn in_window(&self, hour: u8) -> bool {
        if self.window_start_hour <= self.window_end_hour {
            hour >= self.window_start_hour && hour < self.window_end_hour
        } else {
            hour >= self.window_start_hour || hour < self.window_end_hour
        }
    }
}
