use anyhow::Result;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::infra::store::RawStore;
use crate::services::segment_api::SegmentApi;

/// Largest page size the API accepts.
pub const MAX_PER_PAGE: u64 = 200;

/// Pause after every request, to stay under the API rate limit.
pub const DEFAULT_THROTTLE: Duration = Duration::from_secs(2);

/// What one harvest run did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HarvestReport {
    pub efforts: usize,
    pub page_failures: usize,
    pub streams_fetched: usize,
    pub streams_present: usize,
    pub stream_failures: usize,
}

/// Copies a segment's effort summaries and streams into a [`RawStore`].
///
/// Requests run one at a time with a fixed pause after each. Every payload
/// is written as soon as it arrives, and payloads already in the store are
/// not fetched again, so an interrupted run can simply be restarted.
pub struct Harvester<'a, A> {
    api: &'a A,
    store: &'a RawStore,
    per_page: u64,
    throttle: Duration,
}

impl<'a, A: SegmentApi> Harvester<'a, A> {
    pub fn new(api: &'a A, store: &'a RawStore) -> Self {
        Self {
            api,
            store,
            per_page: MAX_PER_PAGE,
            throttle: DEFAULT_THROTTLE,
        }
    }

    pub fn per_page(mut self, per_page: u64) -> Self {
        self.per_page = per_page.clamp(1, MAX_PER_PAGE);
        self
    }

    pub fn throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    #[tracing::instrument(skip(self))]
    pub async fn harvest(&self, segment_id: u64) -> Result<HarvestReport> {
        let mut report = HarvestReport::default();

        let summaries = if self.store.has_summaries(segment_id) {
            info!("Reusing stored effort summaries");
            self.store.read_raw_summaries(segment_id)?
        } else {
            let summaries = self.fetch_summaries(segment_id, &mut report).await?;
            self.store.write_summaries(segment_id, &summaries)?;
            summaries
        };

        let effort_ids: Vec<u64> = summaries
            .iter()
            .filter_map(|s| {
                let id = s["id"].as_u64();
                if id.is_none() {
                    warn!(summary = %s, "Effort summary has no id");
                }
                id
            })
            .collect();
        report.efforts = effort_ids.len();

        info!(efforts = effort_ids.len(), "Fetching effort streams");
        for (i, &effort_id) in effort_ids.iter().enumerate() {
            if self.store.has_streams(segment_id, effort_id) {
                report.streams_present += 1;
                continue;
            }

            info!(effort_id, n = i + 1, of = effort_ids.len(), "Requesting streams");
            match self.api.effort_streams(effort_id).await {
                Ok(streams) => {
                    self.store.write_streams(segment_id, effort_id, &streams)?;
                    report.streams_fetched += 1;
                }
                Err(e) => {
                    error!(effort_id, error = %e, "Stream request failed");
                    report.stream_failures += 1;
                }
            }
            self.pause().await;
        }

        info!(?report, "Harvest finished");
        Ok(report)
    }

    async fn fetch_summaries(&self, segment_id: u64, report: &mut HarvestReport) -> Result<Vec<serde_json::Value>> {
        let segment = self.api.segment(segment_id).await?;
        self.pause().await;

        let pages = 1 + segment.effort_count / self.per_page;
        info!(
            effort_count = segment.effort_count,
            pages,
            name = %segment.name,
            "Fetching effort summaries"
        );

        let mut summaries = Vec::new();
        for page in 1..=pages {
            match self.api.effort_page(segment_id, page, self.per_page).await {
                Ok(batch) => summaries.extend(batch),
                Err(e) => {
                    error!(page, error = %e, "Summary request failed");
                    report.page_failures += 1;
                }
            }
            self.pause().await;
        }
        Ok(summaries)
    }

    async fn pause(&self) {
        if !self.throttle.is_zero() {
            tokio::time::sleep(self.throttle).await;
        }
    }
}
