//! On-disk layout for raw API payloads.
//!
//! ```text
//! <root>/<segment>/all_efforts.<segment>.json
//! <root>/<segment>/effort_stream.<segment>.<effort>.json
//! ```
//! Payloads are stored exactly as the API returned them. Each file is
//! written to a temporary name and renamed into place, so a crash never
//! leaves a truncated file that looks complete.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::analyzers::types::{EffortSummary, StreamRecord};
use crate::parser::{parse_streams, parse_summaries};

#[derive(Debug, Clone)]
pub struct RawStore {
    root: PathBuf,
}

impl RawStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn segment_dir(&self, segment_id: u64) -> PathBuf {
        self.root.join(segment_id.to_string())
    }

    pub fn summaries_path(&self, segment_id: u64) -> PathBuf {
        self.segment_dir(segment_id)
            .join(format!("all_efforts.{segment_id}.json"))
    }

    pub fn streams_path(&self, segment_id: u64, effort_id: u64) -> PathBuf {
        self.segment_dir(segment_id)
            .join(format!("effort_stream.{segment_id}.{effort_id}.json"))
    }

    pub fn has_summaries(&self, segment_id: u64) -> bool {
        self.summaries_path(segment_id).exists()
    }

    pub fn has_streams(&self, segment_id: u64, effort_id: u64) -> bool {
        self.streams_path(segment_id, effort_id).exists()
    }

    pub fn write_summaries(&self, segment_id: u64, summaries: &[serde_json::Value]) -> Result<()> {
        write_json(&self.summaries_path(segment_id), summaries)
    }

    pub fn write_streams(&self, segment_id: u64, effort_id: u64, streams: &serde_json::Value) -> Result<()> {
        write_json(&self.streams_path(segment_id, effort_id), streams)
    }

    /// Raw summary objects, for re-reading ids without full decoding.
    pub fn read_raw_summaries(&self, segment_id: u64) -> Result<Vec<serde_json::Value>> {
        let path = self.summaries_path(segment_id);
        let bytes = std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_slice(&bytes).with_context(|| format!("decoding {}", path.display()))
    }

    pub fn read_summaries(&self, segment_id: u64) -> Result<Vec<EffortSummary>> {
        let path = self.summaries_path(segment_id);
        let bytes = std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        parse_summaries(&bytes).with_context(|| format!("in {}", path.display()))
    }

    /// Streams for one effort, or `None` if they were never fetched.
    pub fn read_streams(&self, segment_id: u64, effort_id: u64) -> Result<Option<Vec<StreamRecord>>> {
        let path = self.streams_path(segment_id, effort_id);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        let streams = parse_streams(&bytes).with_context(|| format!("in {}", path.display()))?;
        Ok(Some(streams))
    }
}

fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_vec(value)?)
        .with_context(|| format!("writing {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("renaming into {}", path.display()))?;
    debug!(path = %path.display(), "Persisted payload");
    Ok(())
}
