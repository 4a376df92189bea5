//! Output formatting and persistence for ingest statistics and curves.
//!
//! Supports pretty-printing, JSON serialization, and CSV append.

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

use crate::analyzers::smoothing::Curve;
use crate::stats::IngestStats;
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// Logs ingest statistics using Rust's debug pretty-print format.
pub fn print_pretty(stats: &IngestStats) {
    debug!("{:#?}", stats);
}

/// Logs ingest statistics as pretty-printed JSON.
pub fn print_json(stats: &IngestStats) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(stats)?);
    Ok(())
}

/// Appends an [`IngestStats`] record as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &Path, stats: &IngestStats) -> Result<()> {
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, "Appending CSV record");

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // header only on the first write
        .from_writer(file);

    writer.serialize(stats)?;
    writer.flush()?;

    Ok(())
}

#[derive(Serialize)]
struct CurvePoint {
    grade: f64,
    speed_kph: f64,
}

/// Writes a smoothed curve as `grade,speed_kph` rows, replacing any
/// existing file. Degenerate points are written as `NaN`.
pub fn write_curve_csv(path: &Path, curve: &Curve) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for (grade, speed_kph) in curve.points() {
        writer.serialize(CurvePoint { grade, speed_kph })?;
    }
    writer.flush()?;
    Ok(())
}
