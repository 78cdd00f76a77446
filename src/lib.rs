//! Batch aggregation of per-device location pings.
//!
//! Two pipelines share a string-keyed aggregation store:
//!
//! - the trajectory pipeline collects each device's full ping history,
//!   splits it into bounded-gap travel runs, and appends each run to a
//!   file sharded by the run's starting grid cell;
//! - the presence pipeline keeps only a first/last-seen window per device
//!   and maintains a per-cell stay counter grid.
//!
//! Both are strictly single-threaded and batch-oriented: one store per
//! input batch, fully ingested before draining, discarded afterwards.

pub mod config;
pub mod error;
pub mod grid;
pub mod ingest;
pub mod pipeline;
pub mod presence;
pub mod segment;
pub mod series;
pub mod shard;
pub mod store;

pub use config::{CsvColumns, PresenceConfig, RetentionPolicy, TrajectoryConfig};
pub use error::{Error, Result};
pub use grid::GridSpec;
pub use pipeline::{DrainStats, PresenceBatch, TrajectoryBatch};
pub use segment::TrajectorySegmenter;
pub use series::{Observation, ObservationSeries};
pub use shard::{GridShardedWriter, ShardGrid};
pub use store::KeyedStore;
