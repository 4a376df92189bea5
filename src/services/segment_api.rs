//! Trait and types for fetching segment efforts from a remote provider.

use anyhow::Result;
use serde::Deserialize;

/// Segment metadata needed to plan a fetch.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SegmentInfo {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    pub distance: f64,
    pub maximum_grade: f64,
    pub effort_count: u64,
}

/// Abstraction over a provider of segment efforts (e.g., Strava).
///
/// Effort pages and streams are returned as raw JSON so they can be stored
/// exactly as received.
#[async_trait::async_trait]
pub trait SegmentApi: Send + Sync {
    async fn segment(&self, segment_id: u64) -> Result<SegmentInfo>;

    /// One page (1-based) of effort summaries.
    async fn effort_page(&self, segment_id: u64, page: u64, per_page: u64) -> Result<Vec<serde_json::Value>>;

    /// The position, time, distance, grade and velocity streams of one effort.
    async fn effort_streams(&self, effort_id: u64) -> Result<serde_json::Value>;
}
