use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;

use wayline::ingest::{self, FileStats};
use wayline::{CsvColumns, DrainStats, GridShardedWriter, ShardGrid, TrajectoryBatch, TrajectoryConfig};

#[derive(Parser)]
#[command(name = "wayline-paths")]
#[command(about = "Build grid-sharded travel trajectories from per-day location ping CSVs")]
struct Cli {
    /// Root directory containing one subdirectory per day of CSV files
    #[arg(long)]
    input: PathBuf,

    /// Output root for shard files
    #[arg(long, default_value = "paths")]
    output: PathBuf,

    /// Maximum gap between consecutive trajectory points, in seconds
    #[arg(long, default_value_t = 14_400)]
    max_time_diff: i64,

    /// Discard pings at or above this speed (m/s)
    #[arg(long, default_value_t = 7.0)]
    max_speed: f64,

    /// Shard grid cell size in degrees
    #[arg(long, default_value_t = 0.01)]
    shard_cell_size: f64,

    /// Initial bucket count for each day's store
    #[arg(long, default_value_t = 1000)]
    initial_capacity: usize,

    /// Write a JSON run summary to this path
    #[arg(long)]
    summary: Option<PathBuf>,
}

#[derive(Serialize)]
struct DaySummary {
    day: String,
    ingest: FileStats,
    drain: DrainStats,
}

#[derive(Serialize)]
struct RunSummary {
    days: Vec<DaySummary>,
    totals: DrainStats,
    open_shards: usize,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = TrajectoryConfig {
        max_time_diff: cli.max_time_diff,
        max_speed: cli.max_speed,
        shard_cell_size: cli.shard_cell_size,
        initial_capacity: cli.initial_capacity,
        ..TrajectoryConfig::default()
    };
    let columns = CsvColumns::default();
    let grid = ShardGrid::new(
        config.shard_origin.0,
        config.shard_origin.1,
        config.shard_cell_size,
    );
    let mut writer = GridShardedWriter::new(&cli.output, grid);

    let days = ingest::day_directories(&cli.input)
        .with_context(|| format!("listing day directories under {}", cli.input.display()))?;
    let mut summaries = Vec::new();
    let mut totals = DrainStats::default();

    for day_dir in days {
        let day = day_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| day_dir.display().to_string());
        log::info!("processing day {day}");

        let mut batch = TrajectoryBatch::new(&config)?;
        let mut day_ingest = FileStats::default();
        for file in ingest::csv_files_in(&day_dir)? {
            let stats = match ingest::read_csv_file(&file, &columns, |record| {
                batch.ingest(&record);
            }) {
                Ok(stats) => stats,
                Err(err) => {
                    log::warn!("skipping {}: {err}", file.display());
                    continue;
                }
            };
            day_ingest.absorb(stats);
        }
        log::info!(
            "day {day}: {} rows, {} parsed, {} devices",
            day_ingest.rows,
            day_ingest.parsed,
            batch.devices()
        );

        let drain = batch.drain(&mut writer);
        log::info!(
            "day {day}: wrote {} trajectories ({} dropped)",
            drain.runs_written,
            drain.runs_dropped
        );
        totals.absorb(drain);
        summaries.push(DaySummary {
            day,
            ingest: day_ingest,
            drain,
        });
    }

    let open_shards = writer.open_shards();
    writer.finish().context("closing shard files")?;

    if let Some(path) = &cli.summary {
        let summary = RunSummary {
            days: summaries,
            totals,
            open_shards,
        };
        let file = std::fs::File::create(path)
            .with_context(|| format!("creating summary file {}", path.display()))?;
        serde_json::to_writer_pretty(file, &summary)?;
    }

    println!(
        "devices={} trajectories={} dropped={} shards={}",
        totals.devices, totals.runs_written, totals.runs_dropped, open_shards
    );
    Ok(())
}
