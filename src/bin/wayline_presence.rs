use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use wayline::ingest::{self, FileStats};
use wayline::{CsvColumns, GridSpec, PresenceBatch, PresenceConfig, RetentionPolicy};

#[derive(Parser)]
#[command(name = "wayline-presence")]
#[command(about = "Aggregate overnight stay locations from location ping CSVs onto a counter grid")]
struct Cli {
    /// Directory of CSV files for one batch
    #[arg(long)]
    input: PathBuf,

    /// Output path for the grid dump
    #[arg(long, default_value = "mmap_unique.txt")]
    output: PathBuf,

    /// Southern latitude bound of the grid
    #[arg(long, default_value_t = 33.4)]
    lat_min: f64,

    /// Western longitude bound of the grid
    #[arg(long, default_value_t = -118.6)]
    lon_min: f64,

    /// Grid cell size in degrees
    #[arg(long, default_value_t = 0.02)]
    cell_size: f64,

    /// Grid rows
    #[arg(long, default_value_t = 45)]
    rows: usize,

    /// Grid columns
    #[arg(long, default_value_t = 50)]
    cols: usize,

    /// Keep the latest-seen location instead of the earliest
    #[arg(long)]
    keep_latest: bool,

    /// Overnight window start hour (inclusive)
    #[arg(long, default_value_t = 20)]
    window_start: u8,

    /// Overnight window end hour (exclusive)
    #[arg(long, default_value_t = 4)]
    window_end: u8,

    /// Treat pings with |speed| below this bound (m/s) as stationary
    #[arg(long, default_value_t = 3.0)]
    stationary_speed: f64,

    /// Initial bucket count for the store
    #[arg(long, default_value_t = 2_000_003)]
    initial_capacity: usize,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = PresenceConfig {
        grid: GridSpec {
            lat_min: cli.lat_min,
            lon_min: cli.lon_min,
            cell_size: cli.cell_size,
            rows: cli.rows,
            cols: cli.cols,
        },
        window_start_hour: cli.window_start,
        window_end_hour: cli.window_end,
        stationary_speed: cli.stationary_speed,
        retention: if cli.keep_latest {
            RetentionPolicy::KeepLatest
        } else {
            RetentionPolicy::KeepEarliest
        },
        initial_capacity: cli.initial_capacity,
    };
    let columns = CsvColumns::default();

    let mut batch = PresenceBatch::new(&config)?;
    let mut totals = FileStats::default();
    for file in ingest::csv_files_in(&cli.input)
        .with_context(|| format!("listing CSV files under {}", cli.input.display()))?
    {
        log::info!("processing file {}", file.display());
        let stats = match ingest::read_csv_file(&file, &columns, |record| {
            batch.ingest(&record);
        }) {
            Ok(stats) => stats,
            Err(err) => {
                log::warn!("skipping {}: {err}", file.display());
                continue;
            }
        };
        totals.absorb(stats);
    }
    log::info!(
        "{} rows, {} parsed, {} devices",
        totals.rows,
        totals.parsed,
        batch.devices()
    );

    let devices = batch.devices();
    let grid = batch.into_grid();
    let mut out = std::fs::File::create(&cli.output)
        .with_context(|| format!("creating grid file {}", cli.output.display()))?;
    grid.write_to(&mut out).context("writing grid")?;
    out.flush()?;

    println!("devices={} stays={} grid={}", devices, grid.total(), cli.output.display());
    Ok(())
}
