use crate::analyzers::dataset::Dataset;
use crate::analyzers::smoothing::{Curve, default_sweep, smooth_curve};
use crate::analyzers::types::PercentileBand;

/// Kernel bandwidth used for band curves, in percent grade.
pub const DEFAULT_SIGMA: f64 = 1.0;

/// What to evaluate for every band: grade grid and kernel width.
#[derive(Debug, Clone)]
pub struct CurvePlan {
    pub bands: Vec<PercentileBand>,
    pub sweep: Vec<f64>,
    pub sigma: f64,
}

impl Default for CurvePlan {
    fn default() -> Self {
        Self {
            bands: PercentileBand::steps(10, 90),
            sweep: default_sweep(),
            sigma: DEFAULT_SIGMA,
        }
    }
}

/// Smoothed speed-vs-grade curve for the efforts ranked inside `band`.
///
/// `dataset` must already be sorted by total time.
pub fn band_curve(dataset: &Dataset, band: PercentileBand, sweep: &[f64], sigma: f64) -> Curve {
    let training: Vec<(f64, f64)> = dataset
        .band_rows(band)
        .iter()
        .map(|row| (row.grade_smooth, row.speed_kph()))
        .collect();
    smooth_curve(&training, sweep, sigma)
}

/// One curve per band for a single segment, in the plan's band order.
pub fn segment_curves(dataset: &Dataset, plan: &CurvePlan) -> Vec<(PercentileBand, Curve)> {
    plan.bands
        .iter()
        .map(|&band| (band, band_curve(dataset, band, &plan.sweep, plan.sigma)))
        .collect()
}
