//! Per-segment validation thresholds and chart styling.
//!
//! Stored as a JSON object keyed by segment id:
//! ```json
//! {
//!   "3538533": {
//!     "title": "Stocking Lane",
//!     "color": "#FF6961",
//!     "characteristics": { "min_effort_rows": 50, "...": "..." }
//!   }
//! }
//! ```
//! The catalog is validated once when it is loaded and is read-only after.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

const BUILTIN_CATALOG: &str = include_str!("../config/segments.json");

/// Tunable thresholds the validator applies to one segment's efforts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentCharacteristics {
    pub min_effort_rows: i64,
    pub min_avg_speed_kph: f64,
    pub max_avg_speed_kph: f64,
    pub distance_slippage: f64,
    pub grade_slippage: f64,
    pub max_abs_speed_kph: f64,
    pub max_accel_mpsps: f64,
    pub max_grade_delta_pm: f64,
    pub max_censoring: f64,
}

impl SegmentCharacteristics {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("min_avg_speed_kph", self.min_avg_speed_kph),
            ("max_avg_speed_kph", self.max_avg_speed_kph),
            ("distance_slippage", self.distance_slippage),
            ("grade_slippage", self.grade_slippage),
            ("max_abs_speed_kph", self.max_abs_speed_kph),
            ("max_accel_mpsps", self.max_accel_mpsps),
            ("max_grade_delta_pm", self.max_grade_delta_pm),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::OutOfRange { field, value });
            }
        }

        if self.min_effort_rows < 0 {
            return Err(ConfigError::OutOfRange {
                field: "min_effort_rows",
                value: self.min_effort_rows as f64,
            });
        }

        if !(0.0..=1.0).contains(&self.max_censoring) {
            return Err(ConfigError::OutOfRange {
                field: "max_censoring",
                value: self.max_censoring,
            });
        }

        if self.min_avg_speed_kph > self.max_avg_speed_kph {
            return Err(ConfigError::InvertedSpeedRange {
                min: self.min_avg_speed_kph,
                max: self.max_avg_speed_kph,
            });
        }

        Ok(())
    }
}

/// Everything configured for one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentProfile {
    pub title: String,
    pub color: String,
    pub characteristics: SegmentCharacteristics,
}

impl SegmentProfile {
    /// The configured `#RRGGBB` color as components.
    pub fn rgb(&self) -> Result<(u8, u8, u8), ConfigError> {
        parse_hex_color(&self.color)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} is out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },
    #[error("min_avg_speed_kph {min} exceeds max_avg_speed_kph {max}")]
    InvertedSpeedRange { min: f64, max: f64 },
    #[error("'{0}' is not a #RRGGBB color")]
    BadColor(String),
    #[error("segment {0} is not configured")]
    UnknownSegment(u64),
    #[error("segment {segment_id}: {source}")]
    Segment {
        segment_id: u64,
        #[source]
        source: Box<ConfigError>,
    },
}

/// Validated mapping of segment id to [`SegmentProfile`], iterated in
/// ascending id order.
#[derive(Debug, Clone)]
pub struct SegmentCatalog {
    segments: BTreeMap<u64, SegmentProfile>,
}

impl SegmentCatalog {
    /// Loads the catalog from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading catalog '{path}'"))?;
        Self::from_json(&content).with_context(|| format!("parsing catalog '{path}'"))
    }

    /// The catalog compiled into the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_CATALOG).context("parsing built-in catalog")
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let segments: BTreeMap<u64, SegmentProfile> = serde_json::from_str(content)?;
        Ok(Self::new(segments)?)
    }

    pub fn new(segments: BTreeMap<u64, SegmentProfile>) -> Result<Self, ConfigError> {
        for (&segment_id, profile) in &segments {
            profile
                .characteristics
                .validate()
                .and_then(|_| profile.rgb().map(|_| ()))
                .map_err(|e| ConfigError::Segment {
                    segment_id,
                    source: Box::new(e),
                })?;
        }
        Ok(Self { segments })
    }

    pub fn get(&self, segment_id: u64) -> Result<&SegmentProfile, ConfigError> {
        self.segments
            .get(&segment_id)
            .ok_or(ConfigError::UnknownSegment(segment_id))
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &SegmentProfile)> {
        self.segments.iter().map(|(id, p)| (*id, p))
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

fn parse_hex_color(color: &str) -> Result<(u8, u8, u8), ConfigError> {
    let bad = || ConfigError::BadColor(color.to_string());
    let hex = color.strip_prefix('#').ok_or_else(bad)?;
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(bad());
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| bad());
    Ok((channel(0)?, channel(2)?, channel(4)?))
}
