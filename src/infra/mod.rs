pub mod store;
pub mod strava;
