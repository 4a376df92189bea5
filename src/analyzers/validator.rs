//! Effort validation and sample censoring.
//!
//! [`EffortValidator::consume`] runs one effort through a fixed sequence of
//! gates. The first gate that fails rejects the whole effort and nothing is
//! written to the dataset. An effort that passes every gate has its
//! non-censored samples appended as one block.

use tracing::debug;

use crate::analyzers::dataset::Dataset;
use crate::analyzers::streams::{EffortStreams, normalize};
use crate::analyzers::types::{
    Column, EffortSummary, IntegrityError, Outcome, RejectReason, StreamRecord,
};
use crate::analyzers::utility::{diffs, relative_deviation, span};
use crate::config::SegmentCharacteristics;

/// Absolute grade (percent) above which a sample is treated as noise.
pub const MAX_ABS_GRADE: f64 = 25.0;

pub struct EffortValidator<'a> {
    characteristics: &'a SegmentCharacteristics,
}

impl<'a> EffortValidator<'a> {
    pub fn new(characteristics: &'a SegmentCharacteristics) -> Self {
        Self { characteristics }
    }

    /// Validates one effort and, if it is accepted, appends its cleaned rows
    /// to `dataset`.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrityError`] when the streams cannot be normalized into
    /// the canonical columns. Failed gates are not errors; they come back as
    /// [`Outcome::Rejected`].
    pub fn consume(
        &self,
        dataset: &mut Dataset,
        summary: &EffortSummary,
        records: Vec<StreamRecord>,
    ) -> Result<Outcome, IntegrityError> {
        let streams = normalize(summary.id, records)?;

        let outcome = match self.check(summary, &streams) {
            Err(reason) => Outcome::Rejected(reason),
            Ok(mask) => {
                let rows = mask
                    .iter()
                    .enumerate()
                    .filter(|(_, censored)| !**censored)
                    .map(|(i, _)| streams.row(i));
                let kept = dataset.append_effort(summary.athlete.id, summary.id, rows);
                Outcome::Accepted {
                    rows: kept,
                    censored: mask.len() - kept,
                }
            }
        };

        match outcome {
            Outcome::Rejected(reason) => {
                debug!(effort_id = summary.id, reason = reason.label(), detail = ?reason, "Effort rejected");
            }
            Outcome::Accepted { rows, censored } => {
                debug!(effort_id = summary.id, rows, censored, "Effort accepted");
            }
        }

        Ok(outcome)
    }

    /// Runs every gate and returns the censor mask of an acceptable effort.
    fn check(&self, summary: &EffortSummary, streams: &EffortStreams) -> Result<Vec<bool>, RejectReason> {
        let declared = summary.declared_rows();

        self.check_row_count(declared, streams)?;
        check_times(summary, streams)?;
        check_always_moving(summary)?;
        self.check_distances(summary, streams)?;
        self.check_avg_speed(summary)?;

        let mask = self.censor_mask(streams);
        let censored = mask.iter().filter(|c| **c).count();

        let fraction = censored as f64 / declared as f64;
        if fraction.is_nan() || fraction > self.characteristics.max_censoring {
            return Err(RejectReason::ExcessiveCensoring { fraction });
        }
        if censored == mask.len() {
            return Err(RejectReason::NoSurvivingRows);
        }

        Ok(mask)
    }

    /// Efforts declaring fewer than `min_effort_rows` samples are not held
    /// to their declared count; the remaining gates are left to filter them.
    /// Rows are taken up to the length of `time`, so no column may be
    /// shorter than it.
    fn check_row_count(&self, declared: i64, streams: &EffortStreams) -> Result<(), RejectReason> {
        let exempt = declared < self.characteristics.min_effort_rows;
        let samples = streams.time.len() as i64;
        for column in Column::ALL {
            let found = streams.column(column).len();
            let fits = if exempt {
                found as i64 >= samples
            } else {
                found as i64 == declared
            };
            if !fits {
                return Err(RejectReason::RowCountMismatch { declared, found });
            }
        }
        Ok(())
    }

    fn check_distances(&self, summary: &EffortSummary, streams: &EffortStreams) -> Result<(), RejectReason> {
        let streamed = span(&streams.distance).ok_or(RejectReason::EmptyStreams)?;
        let allowed = self.characteristics.distance_slippage;

        let within = |deviation: f64| deviation <= allowed;
        if !within(relative_deviation(streamed, summary.distance))
            || !within(relative_deviation(summary.distance, summary.segment.distance))
        {
            return Err(RejectReason::InconsistentDistance {
                streamed,
                declared: summary.distance,
                segment: summary.segment.distance,
            });
        }
        Ok(())
    }

    fn check_avg_speed(&self, summary: &EffortSummary) -> Result<(), RejectReason> {
        let kph = (summary.distance / 1000.0) / (summary.elapsed_time / 3600.0);
        let admissible = self.characteristics.min_avg_speed_kph..=self.characteristics.max_avg_speed_kph;
        if !admissible.contains(&kph) {
            return Err(RejectReason::InadmissibleAvgSpeed { kph });
        }
        Ok(())
    }

    /// Marks samples to drop: implausible speed or grade, or a jump in speed
    /// or grade relative to the previous sample. The first sample has no
    /// predecessor and is always dropped. If time or distance ever runs
    /// backwards the whole effort is dropped.
    pub fn censor_mask(&self, streams: &EffortStreams) -> Vec<bool> {
        let n = streams.time.len();
        let dts = diffs(&streams.time);
        let dds = diffs(&streams.distance);

        if dts.iter().chain(&dds).any(|d| *d < 0.0) {
            return vec![true; n];
        }

        let dvs = diffs(&streams.velocity_smooth);
        let dgs = diffs(&streams.grade_smooth);
        let max_speed_mps = self.characteristics.max_abs_speed_kph * 1000.0 / 3600.0;

        (0..n)
            .map(|i| {
                let v = streams.velocity_smooth.get(i).copied().unwrap_or(f64::NAN);
                let g = streams.grade_smooth.get(i).copied().unwrap_or(f64::NAN);
                let implausible = v > max_speed_mps || g.abs() > MAX_ABS_GRADE;

                let jump = match i.checked_sub(1) {
                    None => true,
                    Some(j) => {
                        let accel = rate(&dvs, &dts, j);
                        let grade_delta = rate(&dgs, &dds, j);
                        accel.abs() > self.characteristics.max_accel_mpsps
                            || grade_delta.abs() > self.characteristics.max_grade_delta_pm
                    }
                };

                implausible || jump
            })
            .collect()
    }
}

fn check_times(summary: &EffortSummary, streams: &EffortStreams) -> Result<(), RejectReason> {
    let streamed = span(&streams.time).ok_or(RejectReason::EmptyStreams)?;
    if streamed != summary.elapsed_time {
        return Err(RejectReason::InconsistentTime {
            streamed,
            declared: summary.elapsed_time,
        });
    }
    Ok(())
}

fn check_always_moving(summary: &EffortSummary) -> Result<(), RejectReason> {
    if summary.elapsed_time != summary.moving_time {
        return Err(RejectReason::NotAlwaysMoving {
            elapsed: summary.elapsed_time,
            moving: summary.moving_time,
        });
    }
    Ok(())
}

/// `num[j] / den[j]`, NaN where either side has no sample `j`.
fn rate(num: &[f64], den: &[f64], j: usize) -> f64 {
    match (num.get(j), den.get(j)) {
        (Some(n), Some(d)) => n / d,
        _ => f64::NAN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::types::{AthleteRef, SegmentRef};

    fn characteristics() -> SegmentCharacteristics {
        SegmentCharacteristics {
            min_effort_rows: 5,
            min_avg_speed_kph: 6.0,
            max_avg_speed_kph: 25.0,
            distance_slippage: 0.02,
            grade_slippage: 0.2,
            max_abs_speed_kph: 60.0,
            max_accel_mpsps: 5.0,
            max_grade_delta_pm: 5.0,
            max_censoring: 0.3,
        }
    }

    /// Ten samples, one per second, 4 m/s on a steady 5% grade: 36 m in 9 s,
    /// 14.4 km/h.
    fn summary() -> EffortSummary {
        EffortSummary {
            id: 11,
            athlete: AthleteRef { id: 7 },
            elapsed_time: 9.0,
            moving_time: 9.0,
            distance: 36.0,
            start_index: 100,
            end_index: 109,
            segment: SegmentRef {
                distance: 36.0,
                maximum_grade: 6.0,
            },
        }
    }

    fn records() -> Vec<StreamRecord> {
        let n = 10;
        vec![
            StreamRecord::pairs(
                "latlng",
                (0..n).map(|i| [45.0 + i as f64 * 1e-5, 6.0]).collect(),
            ),
            StreamRecord::scalars("time", (0..n).map(|i| 500.0 + i as f64).collect()),
            StreamRecord::scalars("distance", (0..n).map(|i| 1000.0 + 4.0 * i as f64).collect()),
            StreamRecord::scalars("grade_smooth", vec![5.0; n]),
            StreamRecord::scalars("velocity_smooth", vec![4.0; n]),
        ]
    }

    fn set(records: &mut [StreamRecord], kind: &str, i: usize, value: f64) {
        let record = records.iter_mut().find(|r| r.kind == kind).unwrap();
        match &mut record.data {
            crate::analyzers::types::StreamData::Scalars(v) => v[i] = value,
            crate::analyzers::types::StreamData::Pairs(_) => panic!("not a scalar stream"),
        }
    }

    fn consume(summary: &EffortSummary, records: Vec<StreamRecord>) -> (Outcome, Dataset) {
        let c = characteristics();
        let mut dataset = Dataset::new();
        let outcome = EffortValidator::new(&c)
            .consume(&mut dataset, summary, records)
            .unwrap();
        (outcome, dataset)
    }

    fn assert_rejected(outcome: Outcome, dataset: &Dataset, label: &str) {
        match outcome {
            Outcome::Rejected(reason) => assert_eq!(reason.label(), label),
            other => panic!("expected rejection '{label}', got {other:?}"),
        }
        assert!(dataset.is_empty());
        assert_eq!(dataset.n_efforts(), 0);
    }

    #[test]
    fn test_clean_effort_is_accepted_minus_first_sample() {
        let (outcome, dataset) = consume(&summary(), records());

        assert_eq!(outcome, Outcome::Accepted { rows: 9, censored: 1 });
        assert_eq!(dataset.len(), 9);
        let entry = dataset.index()[0];
        assert_eq!((entry.athlete_id, entry.effort_id), (7, 11));
        assert_eq!((entry.start_row, entry.n_rows), (0, 9));
    }

    #[test]
    fn test_emitted_rows_match_offset_raw_samples() {
        let (_, dataset) = consume(&summary(), records());

        for (k, row) in dataset.rows().iter().enumerate() {
            let i = k + 1;
            for column in Column::ALL {
                let expected = match column {
                    Column::Lat => 45.0 + i as f64 * 1e-5,
                    Column::Lng => 6.0,
                    Column::Time => i as f64,
                    Column::Distance => 4.0 * i as f64,
                    Column::GradeSmooth => 5.0,
                    Column::VelocitySmooth => 4.0,
                };
                assert_eq!(row.get(column), expected, "{} at sample {i}", column.name());
            }
        }
    }

    #[test]
    fn test_row_count_mismatch_rejected() {
        let mut s = summary();
        s.end_index += 1;
        s.elapsed_time = 9.0;
        let (outcome, dataset) = consume(&s, records());
        assert_rejected(outcome, &dataset, "row_count_mismatch");
    }

    #[test]
    fn test_short_effort_skips_row_count_gate() {
        let mut s = summary();
        s.end_index = s.start_index + 3;
        let (outcome, dataset) = consume(&s, records());

        // Declares four rows but streams ten; one censored of four declared
        // is within the 30% budget.
        assert_eq!(outcome, Outcome::Accepted { rows: 9, censored: 1 });
        assert_eq!(dataset.len(), 9);
    }

    #[test]
    fn test_short_effort_with_longer_column_accepted() {
        let mut s = summary();
        s.end_index = s.start_index + 3;
        let mut r = records();
        r.retain(|record| record.kind != "latlng");
        r.push(StreamRecord::pairs(
            "latlng",
            (0..11).map(|i| [45.0 + i as f64 * 1e-5, 6.0]).collect(),
        ));

        let (outcome, dataset) = consume(&s, r);
        assert_eq!(outcome, Outcome::Accepted { rows: 9, censored: 1 });
        assert_eq!(dataset.rows()[8].lat, 45.0 + 9.0 * 1e-5);
    }

    #[test]
    fn test_long_effort_with_longer_column_rejected() {
        let mut r = records();
        r.retain(|record| record.kind != "latlng");
        r.push(StreamRecord::pairs(
            "latlng",
            (0..11).map(|i| [45.0 + i as f64 * 1e-5, 6.0]).collect(),
        ));
        let (outcome, dataset) = consume(&summary(), r);
        assert_rejected(outcome, &dataset, "row_count_mismatch");
    }

    #[test]
    fn test_short_effort_with_ragged_columns_rejected() {
        let mut s = summary();
        s.end_index = s.start_index + 3;
        let mut r = records();
        r.push(StreamRecord::scalars("grade_smooth", vec![]));
        r.retain(|record| record.kind != "grade_smooth" || record.data.is_empty());
        let (outcome, dataset) = consume(&s, r);
        assert_rejected(outcome, &dataset, "row_count_mismatch");
    }

    #[test]
    fn test_inconsistent_time_rejected() {
        let mut s = summary();
        s.elapsed_time = 10.0;
        s.moving_time = 10.0;
        let (outcome, dataset) = consume(&s, records());
        assert_rejected(outcome, &dataset, "inconsistent_time");
    }

    #[test]
    fn test_stopped_effort_always_rejected() {
        let mut s = summary();
        s.elapsed_time = 100.0;
        s.moving_time = 90.0;
        let mut r = records();
        set(&mut r, "time", 9, 600.0);
        let (outcome, dataset) = consume(&s, r);
        assert_rejected(outcome, &dataset, "not_always_moving");
    }

    #[test]
    fn test_distance_slippage_rejected() {
        let mut s = summary();
        s.distance = 37.0;
        let (outcome, dataset) = consume(&s, records());
        assert_rejected(outcome, &dataset, "inconsistent_distance");

        let mut s = summary();
        s.segment.distance = 40.0;
        let (outcome, dataset) = consume(&s, records());
        assert_rejected(outcome, &dataset, "inconsistent_distance");
    }

    #[test]
    fn test_zero_segment_distance_rejected() {
        let mut s = summary();
        s.segment.distance = 0.0;
        let (outcome, dataset) = consume(&s, records());
        assert_rejected(outcome, &dataset, "inconsistent_distance");
    }

    #[test]
    fn test_avg_speed_out_of_range_rejected() {
        let mut s = summary();
        let mut r = records();
        s.elapsed_time = 90.0;
        s.moving_time = 90.0;
        for i in 0..10 {
            set(&mut r, "time", i, 500.0 + 10.0 * i as f64);
        }
        let (outcome, dataset) = consume(&s, r);
        assert_rejected(outcome, &dataset, "inadmissible_avg_speed");
    }

    #[test]
    fn test_backwards_time_censors_everything() {
        let c = characteristics();
        let mut r = records();
        set(&mut r, "time", 4, 502.0);
        let streams = normalize(11, r.clone()).unwrap();

        let mask = EffortValidator::new(&c).censor_mask(&streams);
        assert!(mask.iter().all(|m| *m));

        let (outcome, dataset) = consume(&summary(), r);
        assert_rejected(outcome, &dataset, "excessive_censoring");
    }

    #[test]
    fn test_backwards_distance_censors_everything() {
        let c = characteristics();
        let mut r = records();
        set(&mut r, "distance", 6, 1000.0);
        let streams = normalize(11, r).unwrap();

        assert!(EffortValidator::new(&c).censor_mask(&streams).iter().all(|m| *m));
    }

    #[test]
    fn test_speed_spike_censored() {
        let c = characteristics();
        let mut r = records();
        set(&mut r, "velocity_smooth", 5, 20.0);
        let streams = normalize(11, r).unwrap();

        let mask = EffortValidator::new(&c).censor_mask(&streams);
        let censored: Vec<usize> = (0..mask.len()).filter(|i| mask[*i]).collect();
        // Over 60 km/h at 5, and the jump into and out of it.
        assert_eq!(censored, vec![0, 5, 6]);
    }

    #[test]
    fn test_steep_grade_censored() {
        let c = characteristics();
        let mut r = records();
        for i in 0..10 {
            set(&mut r, "grade_smooth", i, 26.0);
        }
        let streams = normalize(11, r).unwrap();

        assert!(EffortValidator::new(&c).censor_mask(&streams).iter().all(|m| *m));
    }

    #[test]
    fn test_grade_jump_censored() {
        let c = characteristics();
        let mut r = records();
        // -20% is plausible, but a change of 25 over 4 m is above 5 per metre.
        set(&mut r, "grade_smooth", 3, -20.0);
        let streams = normalize(11, r).unwrap();

        let mask = EffortValidator::new(&c).censor_mask(&streams);
        assert!(mask[3]);
        assert!(mask[4]);
        assert!(!mask[2]);
        assert!(!mask[5]);
    }

    #[test]
    fn test_censoring_budget() {
        let mut r = records();
        set(&mut r, "velocity_smooth", 3, 20.0);
        set(&mut r, "velocity_smooth", 7, 20.0);
        // 1 + 2 + 2 of 10 censored is over the 30% budget.
        let (outcome, dataset) = consume(&summary(), r);
        assert_rejected(outcome, &dataset, "excessive_censoring");

        let mut r = records();
        set(&mut r, "velocity_smooth", 3, 20.0);
        let (outcome, dataset) = consume(&summary(), r);
        assert_eq!(outcome, Outcome::Accepted { rows: 7, censored: 3 });
        let times: Vec<f64> = dataset.rows().iter().map(|row| row.time).collect();
        assert_eq!(times, vec![1.0, 2.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_no_surviving_rows_rejected() {
        let mut c = characteristics();
        c.max_censoring = 1.0;
        let mut r = records();
        set(&mut r, "time", 4, 502.0);
        let mut dataset = Dataset::new();

        let outcome = EffortValidator::new(&c)
            .consume(&mut dataset, &summary(), r)
            .unwrap();
        assert_rejected(outcome, &dataset, "no_surviving_rows");
    }

    #[test]
    fn test_rejection_leaves_existing_dataset_untouched() {
        let c = characteristics();
        let validator = EffortValidator::new(&c);
        let mut dataset = Dataset::new();
        validator.consume(&mut dataset, &summary(), records()).unwrap();
        let before = dataset.clone();

        let mut s = summary();
        s.id = 12;
        s.moving_time = 8.0;
        let outcome = validator.consume(&mut dataset, &s, records()).unwrap();

        assert!(!outcome.is_accepted());
        assert_eq!(dataset, before);
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let c = characteristics();
        let mut r = records();
        r.retain(|record| record.kind != "distance");
        let mut dataset = Dataset::new();

        let err = EffortValidator::new(&c)
            .consume(&mut dataset, &summary(), r)
            .unwrap_err();
        assert!(matches!(err, IntegrityError::MissingColumn { column: "distance", .. }));
    }
}
