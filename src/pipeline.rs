//! Batch pipelines.
//!
//! One batch covers one logical slice of input (a day). Batches only ever
//! move forward: a trajectory batch ingests, then `drain` consumes it; a
//! presence batch ingests, then `into_grid` consumes it. There is no way
//! back to ingestion once draining starts.

use serde::Serialize;

use crate::config::{PresenceConfig, TrajectoryConfig};
use crate::error::Result;
use crate::ingest::RawRecord;
use crate::presence::{PresenceGridAccumulator, RunningWindowValue};
use crate::segment::TrajectorySegmenter;
use crate::series::{Observation, ObservationSeries};
use crate::shard::GridShardedWriter;
use crate::store::KeyedStore;

/// Counters produced by draining one trajectory batch.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DrainStats {
    /// Distinct devices seen by the batch.
    pub devices: u64,
    /// Trajectories appended to shard files.
    pub runs_written: u64,
    /// Trajectories lost to shard I/O failures.
    pub runs_dropped: u64,
}

impl DrainStats {
    pub fn absorb(&mut self, other: DrainStats) {
        self.devices += other.devices;
        self.runs_written += other.runs_written;
        self.runs_dropped += other.runs_dropped;
    }
}

/// Accumulates full observation histories, then segments and writes them.
pub struct TrajectoryBatch {
    store: KeyedStore<ObservationSeries>,
    config: TrajectoryConfig,
}

impl TrajectoryBatch {
    pub fn new(config: &TrajectoryConfig) -> Result<Self> {
        Ok(Self {
            store: KeyedStore::with_capacity(config.initial_capacity)?,
            config: config.clone(),
        })
    }

    /// Feed one record. Returns whether it was kept (pings at or above the
    /// speed cutoff are discarded).
    pub fn ingest(&mut self, record: &RawRecord) -> bool {
        if record.speed >= self.config.max_speed {
            return false;
        }
        let point = Observation {
            timestamp: record.timestamp,
            latitude: record.latitude,
            longitude: record.longitude,
            speed: record.speed,
        };
        self.store.upsert(&record.key, |series| series.push(point));
        true
    }

    /// Distinct devices ingested so far.
    pub fn devices(&self) -> usize {
        self.store.len()
    }

    /// Sort, segment, and write every device's trajectories, consuming the
    /// batch. A shard failure drops that one run and keeps draining.
    pub fn drain(self, writer: &mut GridShardedWriter) -> DrainStats {
        let segmenter = TrajectorySegmenter::new(self.config.max_time_diff);
        let mut stats = DrainStats::default();
        for (key, mut series) in self.store {
            stats.devices += 1;
            series.sort_by_timestamp();
            for run in segmenter.runs(series.points()) {
                match writer.write_run(&key, run) {
                    Ok(()) => stats.runs_written += 1,
                    Err(err) => {
                        stats.runs_dropped += 1;
                        log::warn!("dropping trajectory for {key}: {err}");
                    }
                }
            }
        }
        stats
    }
}

/// Accumulates per-device presence windows and the stay-counter grid.
pub struct PresenceBatch {
    store: KeyedStore<RunningWindowValue>,
    grid: PresenceGridAccumulator,
    config: PresenceConfig,
}

impl PresenceBatch {
    pub fn new(config: &PresenceConfig) -> Result<Self> {
        Ok(Self {
            store: KeyedStore::with_capacity(config.initial_capacity)?,
            grid: PresenceGridAccumulator::new(config.grid.clone()),
            config: config.clone(),
        })
    }

    /// Feed one record. Returns whether it counted as a stay observation.
    ///
    /// A record counts only inside the overnight window, below the
    /// stationary speed bound, and inside the grid's bounding box. The grid
    /// update is applied in the same step as the store mutation.
    pub fn ingest(&mut self, record: &RawRecord) -> bool {
        let hour = (record.marker / 100) as u8;
        if !self.config.in_window(hour) {
            return false;
        }
        if record.speed >= self.config.stationary_speed
            || record.speed <= -self.config.stationary_speed
        {
            return false;
        }
        if !self.config.grid.contains(record.latitude, record.longitude) {
            return false;
        }

        let policy = self.config.retention;
        let (marker, lat, lon) = (
            record.marker,
            record.latitude as f32,
            record.longitude as f32,
        );
        let mut transition = None;
        self.store.upsert(&record.key, |value| {
            transition = value.absorb(marker, lat, lon, policy);
        });
        match transition {
            Some(transition) => {
                self.grid.apply(&transition);
                true
            }
            None => false,
        }
    }

    /// Distinct devices ingested so far.
    pub fn devices(&self) -> usize {
        self.store.len()
    }

    /// Close the batch, keeping only the counter grid.
    pub fn into_grid(self) -> PresenceGridAccumulator {
        self.grid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetentionPolicy;

    fn record(key: &str, marker: u16, lat: f64, lon: f64, speed: f64) -> RawRecord {
        RawRecord {
            key: key.to_owned(),
            timestamp: i64::from(marker) * 60,
            marker,
            latitude: lat,
            longitude: lon,
            speed,
        }
    }

    #[test]
    fn presence_filters_window_speed_and_bounds() {
        let config = PresenceConfig {
            initial_capacity: 16,
            ..PresenceConfig::default()
        };
        let mut batch = PresenceBatch::new(&config).expect("batch");

        // Daytime ping: outside the overnight window.
        assert!(!batch.ingest(&record("a", 1200, 33.5, -118.5, 0.5)));
        // Too fast to be a stay.
        assert!(!batch.ingest(&record("a", 2200, 33.5, -118.5, 5.0)));
        // Outside the study box.
        assert!(!batch.ingest(&record("a", 2200, 40.0, -118.5, 0.5)));
        // Valid stay.
        assert!(batch.ingest(&record("a", 2200, 33.5, -118.5, 0.5)));
        assert_eq!(batch.devices(), 1);
        assert_eq!(batch.into_grid().total(), 1);
    }

    #[test]
    fn presence_relocation_moves_the_counter() {
        let config = PresenceConfig {
            retention: RetentionPolicy::KeepEarliest,
            initial_capacity: 16,
            ..PresenceConfig::default()
        };
        let mut batch = PresenceBatch::new(&config).expect("batch");
        assert!(batch.ingest(&record("a", 2200, 33.41, -118.59, 0.5)));
        // Earlier marker relocates the stay to a different cell.
        assert!(batch.ingest(&record("a", 2100, 33.45, -118.55, 0.5)));
        let grid = batch.into_grid();
        assert_eq!(grid.count(0, 0), Some(0));
        assert_eq!(grid.count(2, 2), Some(1));
        assert_eq!(grid.total(), 1);
    }

    #[test]
    fn trajectory_ingest_applies_speed_cutoff() {
        let config = TrajectoryConfig {
            initial_capacity: 16,
            ..TrajectoryConfig::default()
        };
        let mut batch = TrajectoryBatch::new(&config).expect("batch");
        assert!(!batch.ingest(&record("a", 100, 34.0, -118.0, 7.0)));
        assert!(batch.ingest(&record("a", 100, 34.0, -118.0, 6.9)));
        assert_eq!(batch.devices(), 1);
    }
}
