//! Strava v3 API access and the fetch loop that fills the raw store.

mod client;
mod harvest;

pub use client::{STRAVA_API_BASE, StravaClient};
pub use harvest::{DEFAULT_THROTTLE, HarvestReport, Harvester, MAX_PER_PAGE};
