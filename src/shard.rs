//! Grid-sharded trajectory output.
//!
//! Each trajectory is appended to a file chosen by its starting point's
//! shard cell. Shard handles open once per program run and stay open until
//! [`GridShardedWriter::finish`]; the cache is keyed by cell for O(1)
//! lookup.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::series::Observation;

const SHARD_FILE_NAME: &str = "paths.csv";
const SHARD_HEADER: &str = "advertiser_id;start_timestamp;path_points\n";

/// Unbounded shard grid: cells are signed pairs, not clamped to a box,
/// since shards are directories rather than a fixed counter array.
#[derive(Debug, Clone, Copy)]
pub struct ShardGrid {
    pub lat_origin: f64,
    pub lon_origin: f64,
    pub cell_size: f64,
}

impl ShardGrid {
    pub fn new(lat_origin: f64, lon_origin: f64, cell_size: f64) -> Self {
        Self {
            lat_origin,
            lon_origin,
            cell_size,
        }
    }

    /// Deterministic point-to-shard mapping.
    pub fn cell(&self, lat: f64, lon: f64) -> (i64, i64) {
        (
            ((lat - self.lat_origin) / self.cell_size).floor() as i64,
            ((lon - self.lon_origin) / self.cell_size).floor() as i64,
        )
    }
}

struct ShardFile {
    writer: BufWriter<File>,
}

/// Appends trajectory records to per-cell shard files under a root
/// directory, holding every opened handle until shutdown.
pub struct GridShardedWriter {
    root: PathBuf,
    grid: ShardGrid,
    handles: HashMap<(i64, i64), ShardFile>,
}

impl GridShardedWriter {
    pub fn new(root: impl Into<PathBuf>, grid: ShardGrid) -> Self {
        Self {
            root: root.into(),
            grid,
            handles: HashMap::new(),
        }
    }

    /// Number of shard files opened so far.
    pub fn open_shards(&self) -> usize {
        self.handles.len()
    }

    /// Path of the shard file for a cell.
    pub fn shard_path(&self, cell: (i64, i64)) -> PathBuf {
        shard_path_in(&self.root, cell)
    }

    /// Append one trajectory, routed by its first point.
    ///
    /// Record format: `key;start_timestamp;(lat,lon,speed,...)` with six
    /// decimal places for coordinates and two for speed.
    pub fn write_run(&mut self, key: &str, run: &[Observation]) -> Result<()> {
        let Some(first) = run.first() else {
            return Ok(());
        };
        let cell = self.grid.cell(first.latitude, first.longitude);
        let shard = self.handle_for(cell)?;

        let mut line = String::with_capacity(64 + run.len() * 32);
        let _ = write!(line, "{};{};(", key, first.timestamp);
        for (i, point) in run.iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            let _ = write!(
                line,
                "{:.6},{:.6},{:.2}",
                point.latitude, point.longitude, point.speed
            );
        }
        line.push_str(")\n");
        shard.writer.write_all(line.as_bytes())?;
        Ok(())
    }

    fn handle_for(&mut self, cell: (i64, i64)) -> Result<&mut ShardFile> {
        match self.handles.entry(cell) {
            Entry::Occupied(occupied) => Ok(occupied.into_mut()),
            Entry::Vacant(vacant) => {
                let path = shard_path_in(&self.root, cell);
                if let Some(dir) = path.parent() {
                    fs::create_dir_all(dir)?;
                }
                let existed = path.exists();
                let file = OpenOptions::new().append(true).create(true).open(&path)?;
                let mut writer = BufWriter::new(file);
                if !existed {
                    writer.write_all(SHARD_HEADER.as_bytes())?;
                }
                log::debug!("opened shard {} at {}", cell_label(cell), path.display());
                Ok(vacant.insert(ShardFile { writer }))
            }
        }
    }

    /// Flush and close every open shard handle.
    pub fn finish(mut self) -> Result<()> {
        for (cell, shard) in self.handles.iter_mut() {
            let mut flushed = shard.writer.flush();
            if let Ok(()) = flushed {
                flushed = shard.writer.get_ref().sync_all();
            }
            if let Err(err) = flushed {
                log::warn!("flush failed for shard {}: {err}", cell_label(*cell));
                return Err(err.into());
            }
        }
        Ok(())
    }
}

fn shard_path_in(root: &Path, cell: (i64, i64)) -> PathBuf {
    root.join(cell.0.to_string())
        .join(cell.1.to_string())
        .join(SHARD_FILE_NAME)
}

fn cell_label(cell: (i64, i64)) -> String {
    format!("{}/{}", cell.0, cell.1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn obs(timestamp: i64, lat: f64, lon: f64, speed: f64) -> Observation {
        Observation {
            timestamp,
            latitude: lat,
            longitude: lon,
            speed,
        }
    }

    #[test]
    fn shard_cell_floors_toward_negative_infinity() {
        let grid = ShardGrid::new(0.0, 0.0, 0.01);
        assert_eq!(grid.cell(34.0521, -118.2437), (3405, -11825));
    }

    #[test]
    fn writes_header_once_and_exact_record_format() {
        let dir = tempdir().expect("tempdir");
        let grid = ShardGrid::new(0.0, 0.0, 0.01);
        let mut writer = GridShardedWriter::new(dir.path(), grid);

        let run = [
            obs(1000, 34.0521, -118.2437, 1.5),
            obs(1100, 34.0525, -118.2441, 2.0),
        ];
        writer.write_run("dev-a", &run).expect("write");
        writer
            .write_run("dev-b", &[obs(2000, 34.0529, -118.2445, 0.0), obs(2100, 34.0530, -118.2446, 2.4)])
            .expect("write");
        assert_eq!(writer.open_shards(), 1);
        let path = writer.shard_path((3405, -11825));
        writer.finish().expect("finish");

        let contents = std::fs::read_to_string(path).expect("read shard");
        assert_eq!(
            contents,
            "advertiser_id;start_timestamp;path_points\n\
             dev-a;1000;(34.052100,-118.243700,1.50,34.052500,-118.244100,2.00)\n\
             dev-b;2000;(34.052900,-118.244500,0.00,34.053000,-118.244600,2.40)\n"
        );
    }

    #[test]
    fn runs_route_to_their_starting_cell() {
        let dir = tempdir().expect("tempdir");
        let grid = ShardGrid::new(0.0, 0.0, 0.01);
        let mut writer = GridShardedWriter::new(dir.path(), grid);

        writer
            .write_run("a", &[obs(0, 34.05, -118.24, 1.0), obs(10, 35.00, -120.00, 1.0)])
            .expect("write");
        writer
            .write_run("b", &[obs(0, 35.00, -120.00, 1.0), obs(10, 34.05, -118.24, 1.0)])
            .expect("write");
        assert_eq!(writer.open_shards(), 2);

        let first = writer.shard_path(grid.cell(34.05, -118.24));
        let second = writer.shard_path(grid.cell(35.00, -120.00));
        writer.finish().expect("finish");
        assert!(first.exists());
        assert!(second.exists());
    }

    #[test]
    fn appends_to_existing_shard_without_second_header() {
        let dir = tempdir().expect("tempdir");
        let grid = ShardGrid::new(0.0, 0.0, 0.01);
        let run = [obs(0, 34.05, -118.24, 1.0), obs(10, 34.05, -118.24, 1.0)];

        let mut writer = GridShardedWriter::new(dir.path(), grid);
        writer.write_run("a", &run).expect("write");
        let path = writer.shard_path(grid.cell(34.05, -118.24));
        writer.finish().expect("finish");

        // A second program run appends below the existing header.
        let mut writer = GridShardedWriter::new(dir.path(), grid);
        writer.write_run("b", &run).expect("write");
        writer.finish().expect("finish");

        let contents = std::fs::read_to_string(path).expect("read shard");
        assert_eq!(contents.matches("advertiser_id").count(), 1);
        assert_eq!(contents.lines().count(), 3);
    }
}
