//! Nadaraya-Watson kernel regression.
//!
//! Turns a scattered cloud of `(grade, speed)` points into a smooth curve by
//! evaluating a Gaussian-weighted average of the speeds at each grade of an
//! evenly spaced sweep.
//!
//! The kernel is left unnormalized, `K(t) = exp(-t^2 / 2)`; the constant
//! cancels in the ratio. Far from all training points every weight
//! underflows to zero and the estimate is `NaN`. Callers render that as a gap.

/// Default evaluation grid start, in percent grade.
pub const SWEEP_START: f64 = -5.0;
/// Default evaluation grid end (exclusive), in percent grade.
pub const SWEEP_STOP: f64 = 25.0;
/// Default evaluation grid spacing.
pub const SWEEP_STEP: f64 = 0.2;

/// Unnormalized Gaussian kernel.
#[inline]
pub fn gaussian(t: f64) -> f64 {
    (-0.5 * t * t).exp()
}

/// Kernel-weighted average of `ys` at `x`, with bandwidth `sigma`.
///
/// Returns `NaN` when the weights sum to zero, including for an empty
/// training set.
pub fn nadaraya_watson(x: f64, xs: &[f64], ys: &[f64], sigma: f64) -> f64 {
    nadaraya_watson_pairs(x, xs.iter().copied().zip(ys.iter().copied()), sigma)
}

fn nadaraya_watson_pairs(x: f64, points: impl Iterator<Item = (f64, f64)>, sigma: f64) -> f64 {
    let (p, q) = points.fold((0.0, 0.0), |(p, q), (xi, yi)| {
        let w = gaussian((x - xi) / sigma);
        (p + w * yi, q + w)
    });
    if q == 0.0 { f64::NAN } else { p / q }
}

/// `[start, stop)` in increments of `step`.
pub fn grade_sweep(start: f64, stop: f64, step: f64) -> Vec<f64> {
    if !(step > 0.0) || !(stop > start) {
        return Vec::new();
    }
    let n = ((stop - start) / step).ceil() as usize;
    (0..n)
        .map(|i| start + i as f64 * step)
        .filter(|x| *x < stop)
        .collect()
}

/// The default `-5..25` grid at `0.2` spacing.
pub fn default_sweep() -> Vec<f64> {
    grade_sweep(SWEEP_START, SWEEP_STOP, SWEEP_STEP)
}

/// A smoothed speed curve sampled on a grade sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    pub grades: Vec<f64>,
    pub speeds_kph: Vec<f64>,
}

impl Curve {
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.grades.iter().copied().zip(self.speeds_kph.iter().copied())
    }

    /// Maximal runs of finite points, for drawing with gaps.
    pub fn finite_runs(&self) -> Vec<Vec<(f64, f64)>> {
        self.runs(|_, y| y.is_finite())
    }

    /// Maximal runs of consecutive points satisfying `keep`.
    pub fn runs(&self, keep: impl Fn(f64, f64) -> bool) -> Vec<Vec<(f64, f64)>> {
        let mut runs = Vec::new();
        let mut current = Vec::new();
        for (x, y) in self.points() {
            if keep(x, y) {
                current.push((x, y));
            } else if !current.is_empty() {
                runs.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            runs.push(current);
        }
        runs
    }
}

/// Evaluates the estimator over `sweep` using `training` as `(x, y)` pairs.
pub fn smooth_curve(training: &[(f64, f64)], sweep: &[f64], sigma: f64) -> Curve {
    let speeds_kph = sweep
        .iter()
        .map(|&x| nadaraya_watson_pairs(x, training.iter().copied(), sigma))
        .collect();
    Curve {
        grades: sweep.to_vec(),
        speeds_kph,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_flat_data_gives_constant_estimate() {
        let xs = [0.0, 10.0];
        let ys = [10.0, 10.0];
        assert_relative_eq!(nadaraya_watson(5.0, &xs, &ys, 1000.0), 10.0, epsilon = 1e-9);
        assert_relative_eq!(nadaraya_watson(-50.0, &xs, &ys, 1000.0), 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_midpoint_of_symmetric_pair_is_mean() {
        let xs = [0.0, 2.0];
        let ys = [4.0, 8.0];
        assert_relative_eq!(nadaraya_watson(1.0, &xs, &ys, 0.5), 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_narrow_kernel_tracks_nearest_point() {
        let xs = [0.0, 10.0];
        let ys = [1.0, 3.0];
        assert_relative_eq!(nadaraya_watson(0.1, &xs, &ys, 1.0), 1.0, epsilon = 1e-9);
        assert_relative_eq!(nadaraya_watson(9.9, &xs, &ys, 1.0), 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_no_support_is_nan() {
        assert!(nadaraya_watson(0.0, &[], &[], 1.0).is_nan());
        assert!(nadaraya_watson(1000.0, &[0.0], &[1.0], 1.0).is_nan());
    }

    #[test]
    fn test_grade_sweep() {
        let sweep = default_sweep();
        assert_eq!(sweep.len(), 150);
        assert_eq!(sweep[0], -5.0);
        assert_relative_eq!(sweep[149], 24.8, epsilon = 1e-9);

        assert_eq!(grade_sweep(0.0, 1.0, 0.5), vec![0.0, 0.5]);
        assert!(grade_sweep(0.0, 1.0, 0.0).is_empty());
        assert!(grade_sweep(1.0, 0.0, 0.1).is_empty());
    }

    #[test]
    fn test_smooth_curve_and_gaps() {
        let training = [(0.0, 10.0), (1.0, 12.0)];
        let curve = smooth_curve(&training, &[0.0, 0.5, 1.0, 500.0], 1.0);

        assert_eq!(curve.grades.len(), 4);
        assert_relative_eq!(curve.speeds_kph[1], 11.0, epsilon = 1e-12);
        assert!(curve.speeds_kph[3].is_nan());

        let runs = curve.finite_runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].len(), 3);
    }
}
