//! Column normalization for raw effort streams.
//!
//! The streams endpoint returns series in no particular order and packs
//! positions into a single two-component `latlng` series. Everything
//! downstream works on [`EffortStreams`], which holds exactly the six
//! canonical columns.

use tracing::debug;

use crate::analyzers::types::{Column, IntegrityError, Row, StreamData, StreamRecord};

/// The six canonical series of one effort, after normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffortStreams {
    pub lat: Vec<f64>,
    pub lng: Vec<f64>,
    pub time: Vec<f64>,
    pub distance: Vec<f64>,
    pub grade_smooth: Vec<f64>,
    pub velocity_smooth: Vec<f64>,
}

impl EffortStreams {
    pub fn column(&self, column: Column) -> &[f64] {
        match column {
            Column::Lat => &self.lat,
            Column::Lng => &self.lng,
            Column::Time => &self.time,
            Column::Distance => &self.distance,
            Column::GradeSmooth => &self.grade_smooth,
            Column::VelocitySmooth => &self.velocity_smooth,
        }
    }

    fn column_mut(&mut self, column: Column) -> &mut Vec<f64> {
        match column {
            Column::Lat => &mut self.lat,
            Column::Lng => &mut self.lng,
            Column::Time => &mut self.time,
            Column::Distance => &mut self.distance,
            Column::GradeSmooth => &mut self.grade_smooth,
            Column::VelocitySmooth => &mut self.velocity_smooth,
        }
    }

    /// Sample `i` as a dataset row, with cumulative columns made relative
    /// to the first sample.
    ///
    /// Panics if `i` is out of range for any column.
    pub fn row(&self, i: usize) -> Row {
        let value = |column: Column| {
            let series = self.column(column);
            let offset = if column.delta_from_start() {
                series[0]
            } else {
                0.0
            };
            series[i] - offset
        };

        Row {
            lat: value(Column::Lat),
            lng: value(Column::Lng),
            time: value(Column::Time),
            distance: value(Column::Distance),
            grade_smooth: value(Column::GradeSmooth),
            velocity_smooth: value(Column::VelocitySmooth),
        }
    }
}

/// Splits `latlng`, drops unknown series and places the rest in canonical
/// order.
///
/// When a series type appears twice the first occurrence wins.
///
/// # Errors
///
/// Returns [`IntegrityError`] if a canonical column is missing or a series
/// has the wrong shape for its column.
pub fn normalize(effort_id: u64, records: Vec<StreamRecord>) -> Result<EffortStreams, IntegrityError> {
    let mut streams = EffortStreams::default();
    let mut seen = [false; 6];

    let mut place = |column: Column, data: Vec<f64>, streams: &mut EffortStreams| {
        let slot = column as usize;
        if !seen[slot] {
            seen[slot] = true;
            *streams.column_mut(column) = data;
        }
    };

    for record in records {
        if record.kind == "latlng" {
            let pairs = match record.data {
                StreamData::Pairs(pairs) => pairs,
                StreamData::Scalars(values) if values.is_empty() => Vec::new(),
                StreamData::Scalars(_) => {
                    return Err(IntegrityError::WrongShape {
                        effort_id,
                        kind: record.kind,
                    });
                }
            };
            let (lat, lng): (Vec<f64>, Vec<f64>) = pairs.into_iter().map(|[a, b]| (a, b)).unzip();
            place(Column::Lat, lat, &mut streams);
            place(Column::Lng, lng, &mut streams);
            continue;
        }

        let Some(column) = Column::from_name(&record.kind) else {
            debug!(effort_id, kind = %record.kind, "Ignoring unknown stream type");
            continue;
        };

        match record.data {
            StreamData::Scalars(values) => place(column, values, &mut streams),
            StreamData::Pairs(_) => {
                return Err(IntegrityError::WrongShape {
                    effort_id,
                    kind: record.kind,
                });
            }
        }
    }

    for (column, present) in Column::ALL.into_iter().zip(seen) {
        if !present {
            return Err(IntegrityError::MissingColumn {
                effort_id,
                column: column.name(),
            });
        }
    }

    Ok(streams)
}
