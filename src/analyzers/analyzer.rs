use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

use crate::analyzers::cache;
use crate::analyzers::dataset::Dataset;
use crate::analyzers::validator::EffortValidator;
use crate::config::SegmentCharacteristics;
use crate::infra::store::RawStore;
use crate::stats::IngestStats;

/// Validates every fetched effort of a segment and returns the time-sorted
/// dataset along with counts of what was kept and why the rest was not.
///
/// Efforts whose streams are missing from the store are skipped. Malformed
/// streams abort the run.
#[tracing::instrument(skip(store, characteristics))]
pub fn build_dataset(
    store: &RawStore,
    segment_id: u64,
    characteristics: &SegmentCharacteristics,
    max_efforts: Option<usize>,
) -> Result<(Dataset, IngestStats)> {
    let mut summaries = store.read_summaries(segment_id)?;
    if let Some(limit) = max_efforts {
        summaries.truncate(limit);
    }
    info!(efforts = summaries.len(), "Validating efforts");

    let validator = EffortValidator::new(characteristics);
    let mut dataset = Dataset::new();
    let mut stats = IngestStats::new(segment_id);

    for summary in &summaries {
        let Some(streams) = store.read_streams(segment_id, summary.id)? else {
            warn!(effort_id = summary.id, "Streams not fetched, skipping effort");
            stats.record_missing();
            continue;
        };

        let outcome = validator
            .consume(&mut dataset, summary, streams)
            .with_context(|| format!("segment {segment_id}"))?;
        stats.record(&outcome);
    }

    dataset.sort_by_total_time();
    let stats = stats.with_dataset(&dataset);

    info!(
        accepted = stats.accepted,
        rejected = stats.rejected(),
        missing = stats.missing_streams,
        rows = dataset.len(),
        "Segment validated"
    );
    Ok((dataset, stats))
}

/// Returns the cached dataset for a segment, building and caching it from
/// the raw store when no cache exists (or `refresh` is set).
///
/// Ingest statistics are only produced when the dataset is built.
#[tracing::instrument(skip(store, cache_dir, characteristics))]
pub fn load_or_build(
    store: &RawStore,
    cache_dir: &Path,
    segment_id: u64,
    characteristics: &SegmentCharacteristics,
    max_efforts: Option<usize>,
    refresh: bool,
) -> Result<(Dataset, Option<IngestStats>)> {
    if !refresh {
        if let Some(dataset) = cache::load(cache_dir, segment_id)? {
            info!("Found cache, skipping validation");
            return Ok((dataset, None));
        }
    }

    info!("No usable cache, reading raw streams");
    let (dataset, stats) = build_dataset(store, segment_id, characteristics, max_efforts)?;
    cache::save(cache_dir, segment_id, &dataset)?;
    Ok((dataset, Some(stats)))
}
