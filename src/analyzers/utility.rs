/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Computes the population standard deviation given a pre-computed mean.
/// Returns 0.0 for empty input.
pub fn stddev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;

    variance.sqrt()
}

/// Successive differences `xs[i + 1] - xs[i]`; one shorter than the input.
pub fn diffs(xs: &[f64]) -> Vec<f64> {
    xs.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Fractional deviation `|x / y - 1|`. Not finite when `y` is zero.
pub fn relative_deviation(x: f64, y: f64) -> f64 {
    (x / y - 1.0).abs()
}

/// `last - first`, or `None` for an empty slice.
pub fn span(xs: &[f64]) -> Option<f64> {
    Some(xs.last()? - xs.first()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_and_stddev() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let m = mean(&values);
        assert_eq!(m, 5.0);
        assert_eq!(stddev(&values, m), 2.0);
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn test_diffs() {
        assert_eq!(diffs(&[1.0, 3.0, 2.0]), vec![2.0, -1.0]);
        assert!(diffs(&[1.0]).is_empty());
    }

    #[test]
    fn test_relative_deviation() {
        assert_relative_eq!(relative_deviation(102.0, 100.0), 0.02, epsilon = 1e-12);
        assert_relative_eq!(relative_deviation(98.0, 100.0), 0.02, epsilon = 1e-12);
        assert!(!relative_deviation(1.0, 0.0).is_finite());
    }

    #[test]
    fn test_span() {
        assert_eq!(span(&[3.0, 4.0, 10.0]), Some(7.0));
        assert_eq!(span(&[]), None);
    }
}
