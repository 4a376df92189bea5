use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analyzers::dataset::Dataset;
use crate::analyzers::types::{Outcome, RejectReason};
use crate::analyzers::utility::{mean, stddev};

/// Counts for one segment ingestion run, one CSV row per run.
#[derive(Debug, Default, Serialize)]
pub struct IngestStats {
    pub timestamp: DateTime<Utc>,
    pub segment_id: u64,
    pub efforts_seen: usize,
    pub missing_streams: usize,
    pub accepted: usize,

    // rejections by gate
    pub row_count_mismatch: usize,
    pub empty_streams: usize,
    pub inconsistent_time: usize,
    pub not_always_moving: usize,
    pub inconsistent_distance: usize,
    pub inadmissible_avg_speed: usize,
    pub excessive_censoring: usize,
    pub no_surviving_rows: usize,

    // rows of accepted efforts
    pub rows_kept: usize,
    pub rows_censored: usize,

    // total time of accepted efforts, seconds
    pub mean_total_time_s: f64,
    pub stddev_total_time_s: f64,
}

impl IngestStats {
    pub fn new(segment_id: u64) -> Self {
        IngestStats {
            timestamp: Utc::now(),
            segment_id,
            ..Default::default()
        }
    }

    /// Counts one validator outcome.
    pub fn record(&mut self, outcome: &Outcome) {
        self.efforts_seen += 1;

        match outcome {
            Outcome::Accepted { rows, censored } => {
                self.accepted += 1;
                self.rows_kept += rows;
                self.rows_censored += censored;
            }
            Outcome::Rejected(reason) => {
                let counter = match reason {
                    RejectReason::RowCountMismatch { .. } => &mut self.row_count_mismatch,
                    RejectReason::EmptyStreams => &mut self.empty_streams,
                    RejectReason::InconsistentTime { .. } => &mut self.inconsistent_time,
                    RejectReason::NotAlwaysMoving { .. } => &mut self.not_always_moving,
                    RejectReason::InconsistentDistance { .. } => &mut self.inconsistent_distance,
                    RejectReason::InadmissibleAvgSpeed { .. } => &mut self.inadmissible_avg_speed,
                    RejectReason::ExcessiveCensoring { .. } => &mut self.excessive_censoring,
                    RejectReason::NoSurvivingRows => &mut self.no_surviving_rows,
                };
                *counter += 1;
            }
        }
    }

    /// Counts an effort whose streams were never fetched.
    pub fn record_missing(&mut self) {
        self.efforts_seen += 1;
        self.missing_streams += 1;
    }

    /// Fills in total-time statistics from the finished dataset.
    pub fn with_dataset(mut self, dataset: &Dataset) -> Self {
        let totals: Vec<f64> = (0..dataset.n_efforts())
            .map(|i| dataset.total_time(i))
            .collect();
        self.mean_total_time_s = mean(&totals);
        self.stddev_total_time_s = stddev(&totals, self.mean_total_time_s);
        self
    }

    pub fn rejected(&self) -> usize {
        self.efforts_seen - self.accepted - self.missing_streams
    }

    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    pub fn acceptance_pct(&self) -> f64 {
        Self::pct(self.accepted, self.efforts_seen)
    }

    pub fn censored_pct(&self) -> f64 {
        Self::pct(self.rows_censored, self.rows_kept + self.rows_censored)
    }
}
