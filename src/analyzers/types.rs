//! Data types used by the ingestion pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The six canonical stream columns, in storage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Lat,
    Lng,
    Time,
    Distance,
    GradeSmooth,
    VelocitySmooth,
}

impl Column {
    pub const ALL: [Column; 6] = [
        Column::Lat,
        Column::Lng,
        Column::Time,
        Column::Distance,
        Column::GradeSmooth,
        Column::VelocitySmooth,
    ];

    /// Stream type name as reported by the API.
    pub fn name(self) -> &'static str {
        match self {
            Column::Lat => "lat",
            Column::Lng => "lng",
            Column::Time => "time",
            Column::Distance => "distance",
            Column::GradeSmooth => "grade_smooth",
            Column::VelocitySmooth => "velocity_smooth",
        }
    }

    pub fn from_name(name: &str) -> Option<Column> {
        Column::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Cumulative columns are stored relative to the effort's first sample.
    pub fn delta_from_start(self) -> bool {
        matches!(self, Column::Time | Column::Distance)
    }
}

/// Reference to the athlete who recorded an effort.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AthleteRef {
    pub id: u64,
}

/// The segment fields an effort summary carries about its segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentRef {
    pub distance: f64,
    pub maximum_grade: f64,
}

/// Remote metadata for one attempt at a segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffortSummary {
    pub id: u64,
    pub athlete: AthleteRef,
    pub elapsed_time: f64,
    pub moving_time: f64,
    pub distance: f64,
    pub start_index: i64,
    pub end_index: i64,
    pub segment: SegmentRef,
}

impl EffortSummary {
    /// Number of samples the summary says its streams should hold.
    pub fn declared_rows(&self) -> i64 {
        self.end_index - self.start_index + 1
    }
}

/// Payload of a single stream: either one value per sample or a
/// two-component value per sample (`latlng`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamData {
    Scalars(Vec<f64>),
    Pairs(Vec<[f64; 2]>),
}

impl StreamData {
    pub fn len(&self) -> usize {
        match self {
            StreamData::Scalars(v) => v.len(),
            StreamData::Pairs(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One named series as delivered by the streams endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: StreamData,
}

impl StreamRecord {
    pub fn scalars(kind: &str, data: Vec<f64>) -> Self {
        Self {
            kind: kind.to_string(),
            data: StreamData::Scalars(data),
        }
    }

    pub fn pairs(kind: &str, data: Vec<[f64; 2]>) -> Self {
        Self {
            kind: kind.to_string(),
            data: StreamData::Pairs(data),
        }
    }
}

/// One cleaned sample in the consolidated dataset.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Row {
    pub lat: f64,
    pub lng: f64,
    pub time: f64,
    pub distance: f64,
    pub grade_smooth: f64,
    pub velocity_smooth: f64,
}

impl Row {
    pub fn get(&self, column: Column) -> f64 {
        match column {
            Column::Lat => self.lat,
            Column::Lng => self.lng,
            Column::Time => self.time,
            Column::Distance => self.distance,
            Column::GradeSmooth => self.grade_smooth,
            Column::VelocitySmooth => self.velocity_smooth,
        }
    }

    /// Smoothed speed converted from m/s to km/h.
    pub fn speed_kph(&self) -> f64 {
        self.velocity_smooth * 3.6
    }
}

/// Location of one accepted effort inside the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRow {
    pub athlete_id: u64,
    pub effort_id: u64,
    pub start_row: usize,
    pub n_rows: usize,
}

impl IndexRow {
    pub fn end_row(&self) -> usize {
        self.start_row + self.n_rows
    }
}

/// Why an effort was left out of the dataset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RejectReason {
    RowCountMismatch { declared: i64, found: usize },
    EmptyStreams,
    InconsistentTime { streamed: f64, declared: f64 },
    NotAlwaysMoving { elapsed: f64, moving: f64 },
    InconsistentDistance { streamed: f64, declared: f64, segment: f64 },
    InadmissibleAvgSpeed { kph: f64 },
    ExcessiveCensoring { fraction: f64 },
    NoSurvivingRows,
}

impl RejectReason {
    /// Short stable label, used as a column name in ingest statistics.
    pub fn label(&self) -> &'static str {
        match self {
            RejectReason::RowCountMismatch { .. } => "row_count_mismatch",
            RejectReason::EmptyStreams => "empty_streams",
            RejectReason::InconsistentTime { .. } => "inconsistent_time",
            RejectReason::NotAlwaysMoving { .. } => "not_always_moving",
            RejectReason::InconsistentDistance { .. } => "inconsistent_distance",
            RejectReason::InadmissibleAvgSpeed { .. } => "inadmissible_avg_speed",
            RejectReason::ExcessiveCensoring { .. } => "excessive_censoring",
            RejectReason::NoSurvivingRows => "no_surviving_rows",
        }
    }
}

/// Result of offering one effort to the validator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    Accepted { rows: usize, censored: usize },
    Rejected(RejectReason),
}

impl Outcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted { .. })
    }
}

/// Malformed upstream data or a corrupt cache. Never recoverable mid-run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntegrityError {
    #[error("effort {effort_id}: stream '{column}' is missing")]
    MissingColumn { effort_id: u64, column: &'static str },
    #[error("effort {effort_id}: stream '{kind}' has the wrong shape")]
    WrongShape { effort_id: u64, kind: String },
    #[error("index entry {position} covers rows {start}..{end}, expected start {expected}")]
    BrokenPartition {
        position: usize,
        start: usize,
        end: usize,
        expected: usize,
    },
    #[error("index covers {covered} rows but dataset holds {rows}")]
    UncoveredRows { covered: usize, rows: usize },
    #[error("index entry {position} is empty")]
    EmptyEffort { position: usize },
}

/// A slice of efforts ranked by total time, e.g. the fastest 0–10%.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PercentileBand {
    lb: u8,
    ub: u8,
}

impl PercentileBand {
    pub fn new(lb: u8, ub: u8) -> anyhow::Result<Self> {
        if lb > ub || ub > 100 {
            anyhow::bail!("invalid percentile band {lb}-{ub}");
        }
        Ok(Self { lb, ub })
    }

    pub fn lb(&self) -> u8 {
        self.lb
    }

    pub fn ub(&self) -> u8 {
        self.ub
    }

    /// Consecutive bands of `step` percent starting at zero, stopping before `limit`.
    pub fn steps(step: u8, limit: u8) -> Vec<PercentileBand> {
        if step == 0 {
            return Vec::new();
        }
        (0..limit)
            .step_by(step as usize)
            .filter_map(|lb| {
                let ub = lb.checked_add(step)?;
                (ub <= limit).then_some(PercentileBand { lb, ub })
            })
            .collect()
    }
}

impl std::fmt::Display for PercentileBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.lb, self.ub)
    }
}
