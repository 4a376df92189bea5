//! Persisted (index, dataset) pairs, one per segment.
//!
//! Both halves are gzip-compressed CSV with a header row:
//! `index.<segment>.csv.gz` and `data.<segment>.csv.gz`. Floats are written
//! in shortest round-trip form, so a reloaded dataset compares equal to the
//! one that was saved.

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::analyzers::dataset::Dataset;
use crate::analyzers::types::{IndexRow, Row};

pub fn index_path(dir: &Path, segment_id: u64) -> PathBuf {
    dir.join(format!("index.{segment_id}.csv.gz"))
}

pub fn data_path(dir: &Path, segment_id: u64) -> PathBuf {
    dir.join(format!("data.{segment_id}.csv.gz"))
}

/// Whether both halves of a segment's cache are present.
pub fn exists(dir: &Path, segment_id: u64) -> bool {
    data_path(dir, segment_id).exists() && index_path(dir, segment_id).exists()
}

/// Writes both halves of `dataset`. Each file appears under its final name
/// only once fully written.
#[tracing::instrument(skip(dir, dataset), fields(dir = %dir.display(), rows = dataset.len()))]
pub fn save(dir: &Path, segment_id: u64, dataset: &Dataset) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    write_gz_csv(&data_path(dir, segment_id), dataset.rows())?;
    write_gz_csv(&index_path(dir, segment_id), dataset.index())?;
    info!(efforts = dataset.n_efforts(), "Cached dataset");
    Ok(())
}

/// Loads a cached dataset, or `None` if either half is absent.
///
/// # Errors
///
/// Fails if a file cannot be decoded or the index does not partition the
/// rows.
#[tracing::instrument(skip(dir), fields(dir = %dir.display()))]
pub fn load(dir: &Path, segment_id: u64) -> Result<Option<Dataset>> {
    if !exists(dir, segment_id) {
        debug!("No cache found");
        return Ok(None);
    }

    let rows: Vec<Row> = read_gz_csv(&data_path(dir, segment_id))?;
    let index: Vec<IndexRow> = read_gz_csv(&index_path(dir, segment_id))?;
    let dataset = Dataset::from_parts(rows, index)
        .with_context(|| format!("cache for segment {segment_id} is inconsistent"))?;
    info!(efforts = dataset.n_efforts(), rows = dataset.len(), "Loaded cached dataset");
    Ok(Some(dataset))
}

fn write_gz_csv<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let tmp = path.with_extension("gz.tmp");
    let file = File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
    let mut writer = csv::Writer::from_writer(GzEncoder::new(file, Compression::default()));
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    let encoder = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("flushing {}: {}", tmp.display(), e.error()))?;
    encoder.finish()?;
    std::fs::rename(&tmp, path).with_context(|| format!("renaming into {}", path.display()))?;
    Ok(())
}

fn read_gz_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut reader = csv::Reader::from_reader(GzDecoder::new(file));
    let mut records = Vec::new();
    for result in reader.deserialize() {
        records.push(result.with_context(|| format!("decoding {}", path.display()))?);
    }
    Ok(records)
}
