//! Raw ping ingestion.
//!
//! Reads headerless, position-indexed CSV files (optionally gzipped) and
//! hands parsed records to a caller-provided sink. Malformed rows are
//! skipped and counted; a file never fails ingestion because of its
//! contents.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::PrimitiveDateTime;

use crate::config::CsvColumns;
use crate::error::Result;

const TIMESTAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// One parsed ping, before any pipeline-specific filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub key: String,
    /// Epoch seconds, timestamp assumed UTC.
    pub timestamp: i64,
    /// Packed time-of-day, `hour * 100 + minute`.
    pub marker: u16,
    pub latitude: f64,
    pub longitude: f64,
    pub speed: f64,
}

/// Per-file ingestion counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct FileStats {
    /// Rows the CSV reader produced.
    pub rows: u64,
    /// Rows that parsed into a full record.
    pub parsed: u64,
    /// Rows dropped for missing fields or unparseable values.
    pub skipped: u64,
}

impl FileStats {
    pub fn absorb(&mut self, other: FileStats) {
        self.rows += other.rows;
        self.parsed += other.parsed;
        self.skipped += other.skipped;
    }
}

fn parse_record(row: &csv::StringRecord, columns: &CsvColumns) -> Option<RawRecord> {
    let key = row.get(columns.key)?.trim();
    if key.is_empty() {
        return None;
    }
    let stamp = row.get(columns.timestamp)?.trim();
    let datetime = PrimitiveDateTime::parse(stamp, TIMESTAMP_FORMAT).ok()?;
    let timestamp = datetime.assume_utc().unix_timestamp();
    let marker = u16::from(datetime.hour()) * 100 + u16::from(datetime.minute());
    let latitude: f64 = row.get(columns.latitude)?.trim().parse().ok()?;
    let longitude: f64 = row.get(columns.longitude)?.trim().parse().ok()?;
    let speed: f64 = row.get(columns.speed)?.trim().parse().ok()?;
    Some(RawRecord {
        key: key.to_owned(),
        timestamp,
        marker,
        latitude,
        longitude,
        speed,
    })
}

fn open_reader(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path)?;
    if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        Ok(Box::new(GzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

/// Read one CSV (or CSV.GZ) file, feeding each parsed record to `sink`.
///
/// # Errors
///
/// `Error::Io` if the file cannot be opened. Row-level problems never
/// error; they increment `skipped`.
pub fn read_csv_file<F>(path: &Path, columns: &CsvColumns, mut sink: F) -> Result<FileStats>
where
    F: FnMut(RawRecord),
{
    let reader = open_reader(path)?;
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(BufReader::new(reader));

    let mut stats = FileStats::default();
    for row in csv_reader.records() {
        stats.rows += 1;
        let row = match row {
            Ok(row) => row,
            Err(err) => {
                stats.skipped += 1;
                log::debug!("{}: unreadable row: {err}", path.display());
                continue;
            }
        };
        match parse_record(&row, columns) {
            Some(record) => {
                stats.parsed += 1;
                sink(record);
            }
            None => stats.skipped += 1,
        }
    }
    log::debug!(
        "{}: {} rows, {} parsed, {} skipped",
        path.display(),
        stats.rows,
        stats.parsed,
        stats.skipped
    );
    Ok(stats)
}

fn has_csv_extension(path: &Path) -> bool {
    match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name.ends_with(".csv") || name.ends_with(".csv.gz"),
        None => false,
    }
}

/// CSV files directly inside `dir`, sorted for deterministic processing.
pub fn csv_files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_file() && has_csv_extension(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Immediate subdirectories of `root`, sorted. Each one is a logical batch
/// (one day of input).
pub fn day_directories(root: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}
