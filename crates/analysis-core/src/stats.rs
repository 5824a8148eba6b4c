//! Descriptive statistics shared by the growth, range and rating code.
//!
//! Everything here works on plain slices and is deterministic for identical
//! input, so ranks and fits are reproducible across calls.
use statrs::statistics::Statistics;

/// Values excluded from ranking by default: zero and NaN.
pub const DEFAULT_DISREGARDED: [f64; 2] = [0.0, f64::NAN];

/// Whether `value` belongs to the disregarded set. A NaN entry in the set matches any NaN.
pub fn is_disregarded(value: f64, disregarded: &[f64]) -> bool {
    disregarded.iter().any(|d| {
        if d.is_nan() {
            value.is_nan()
        } else {
            *d == value
        }
    })
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(data.mean())
}

/// Median; averages the two middle values for even counts.
pub fn median(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    let mut sorted = data.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Percentile rank of `target` within `data` on a 0-100 scale: the share of
/// values strictly below the target. Returns the neutral 50 when there is
/// nothing to compare against or the target is unavailable.
pub fn percentile_rank(target: Option<f64>, data: &[f64]) -> f64 {
    match target {
        Some(t) if !t.is_nan() && !data.is_empty() => {
            let below = data.iter().filter(|&&x| x < t).count();
            100.0 * below as f64 / data.len() as f64
        }
        _ => 50.0,
    }
}

/// Ordinary least squares slope of `values` against the index 0..n.
pub fn index_slope(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = values.mean();
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        sxy += dx * (y - y_mean);
        sxx += dx * dx;
    }
    Some(sxy / sxx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_percentile_rank_counts_strictly_below() {
        let data = vec![1.0, -2.0, 4.0, 5.0];
        assert_relative_eq!(percentile_rank(Some(3.0), &data), 50.0);
        assert_relative_eq!(percentile_rank(Some(-5.0), &data), 0.0);
        assert_relative_eq!(percentile_rank(Some(6.0), &data), 100.0);
        // ties are not counted as below
        assert_relative_eq!(percentile_rank(Some(4.0), &data), 50.0);
    }

    #[test]
    fn test_percentile_rank_neutral_default() {
        assert_relative_eq!(percentile_rank(Some(3.0), &[]), 50.0);
        assert_relative_eq!(percentile_rank(None, &[1.0, 2.0]), 50.0);
        assert_relative_eq!(percentile_rank(Some(f64::NAN), &[1.0, 2.0]), 50.0);
    }

    #[test]
    fn test_percentile_rank_monotonic() {
        let data = vec![3.0, 9.0, -1.0, 4.5, 7.0, 7.0, 2.0];
        let mut previous = 0.0;
        for i in -20..=20 {
            let rank = percentile_rank(Some(i as f64 * 0.5), &data);
            assert!(rank >= previous);
            previous = rank;
        }
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_index_slope() {
        assert_relative_eq!(index_slope(&[3.0, 2.0, 2.0, 6.0]).unwrap(), 0.9, epsilon = 1e-12);
        assert_relative_eq!(index_slope(&[1.0, 3.0, 5.0]).unwrap(), 2.0, epsilon = 1e-12);
        assert!(index_slope(&[1.0]).is_none());
    }

    #[test]
    fn test_is_disregarded() {
        assert!(is_disregarded(0.0, &DEFAULT_DISREGARDED));
        assert!(is_disregarded(f64::NAN, &DEFAULT_DISREGARDED));
        assert!(!is_disregarded(1.5, &DEFAULT_DISREGARDED));
        assert!(!is_disregarded(f64::NAN, &[0.0]));
    }
}
