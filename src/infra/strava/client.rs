use anyhow::Result;
use async_trait::async_trait;

use crate::fetch::{BasicClient, HttpClient, auth::ApiKey, fetch_json};
use crate::services::segment_api::{SegmentApi, SegmentInfo};

pub const STRAVA_API_BASE: &str = "https://www.strava.com/api/v3";

/// Streams requested for every effort, by Strava stream type.
const STREAM_KEYS: &str = "latlng,time,distance,grade_smooth,velocity_smooth";

pub struct StravaClient<C> {
    base_url: String,
    http: C,
}

impl StravaClient<ApiKey<BasicClient>> {
    /// Client for the public API authenticated with an OAuth access token.
    pub fn new(access_token: &str) -> Result<Self> {
        let http = ApiKey::bearer(BasicClient::new()?, access_token)?;
        Ok(Self::with_client(STRAVA_API_BASE, http))
    }
}

impl<C: HttpClient> StravaClient<C> {
    pub fn with_client(base_url: &str, http: C) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    fn segment_url(&self, segment_id: u64) -> String {
        format!("{}/segments/{}", self.base_url, segment_id)
    }
}

#[async_trait]
impl<C: HttpClient> SegmentApi for StravaClient<C> {
    async fn segment(&self, segment_id: u64) -> Result<SegmentInfo> {
        fetch_json(&self.http, &self.segment_url(segment_id)).await
    }

    async fn effort_page(&self, segment_id: u64, page: u64, per_page: u64) -> Result<Vec<serde_json::Value>> {
        let url = format!(
            "{}/all_efforts?per_page={}&page={}",
            self.segment_url(segment_id),
            per_page,
            page
        );
        fetch_json(&self.http, &url).await
    }

    async fn effort_streams(&self, effort_id: u64) -> Result<serde_json::Value> {
        let url = format!(
            "{}/segment_efforts/{}/streams/{}",
            self.base_url, effort_id, STREAM_KEYS
        );
        fetch_json(&self.http, &url).await
    }
}
