use chrono::Datelike;
use serde::Serialize;
use statrs::statistics::Statistics;

use crate::stats::{is_disregarded, median, percentile_rank};
use crate::MetricSeries;

/// Min/max/median of the valid values in a window plus the latest value's rank.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RangeInfo {
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub percentile_rank: f64,
}

impl MetricSeries {
    /// Data values from the last `lookback_years` fiscal years (all years when
    /// `None`), without the disregarded sentinels.
    pub fn valid_values(&self, lookback_years: Option<u32>, disregarded: &[f64]) -> Vec<f64> {
        let Some((latest, _)) = self.latest() else {
            return Vec::new();
        };
        // a lookback longer than the calendar covers everything
        let first_year = lookback_years.and_then(|n| i32::try_from(n).ok().and_then(|n| latest.year().checked_sub(n)));
        self.data
            .iter()
            .filter(|(date, _)| first_year.map_or(true, |first| date.year() > first))
            .map(|(_, v)| *v)
            .filter(|v| !is_disregarded(*v, disregarded))
            .collect()
    }

    /// Percentile rank (0-100) of `target` against the valid values in the window.
    pub fn percentile_rank(&self, target: Option<f64>, lookback_years: Option<u32>, disregarded: &[f64]) -> f64 {
        percentile_rank(target, &self.valid_values(lookback_years, disregarded))
    }

    pub fn pctrank_of_latest(&self, lookback_years: Option<u32>, disregarded: &[f64]) -> f64 {
        self.percentile_rank(self.latest_value(), lookback_years, disregarded)
    }

    /// `None` when the window holds no valid values.
    pub fn range_info(&self, lookback_years: Option<u32>, disregarded: &[f64]) -> Option<RangeInfo> {
        let window = self.valid_values(lookback_years, disregarded);
        if window.is_empty() {
            return None;
        }
        Some(RangeInfo {
            min: window.as_slice().min(),
            max: window.as_slice().max(),
            median: median(&window)?,
            percentile_rank: percentile_rank(self.latest_value(), &window),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::DEFAULT_DISREGARDED;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn annual(values: &[f64], ttm: Option<f64>) -> MetricSeries {
        MetricSeries::from_points(
            "Debt-to-Equity",
            values
                .iter()
                .enumerate()
                .map(|(i, v)| (NaiveDate::from_ymd_opt(2011 + i as i32, 9, 1).unwrap(), *v)),
            ttm,
            None,
        )
    }

    #[test]
    fn test_reference_percentile_rank() {
        let series = annual(&[1.0, -2.0, 0.0, 4.0, 5.0], Some(3.0));
        assert_relative_eq!(series.percentile_rank(Some(3.0), None, &DEFAULT_DISREGARDED), 50.0);
        assert_relative_eq!(series.pctrank_of_latest(None, &DEFAULT_DISREGARDED), 50.0);
    }

    #[test]
    fn test_valid_values_window_and_sentinels() {
        let series = annual(&[1.0, f64::NAN, 0.0, 4.0, 5.0, 6.0], None);
        assert_eq!(series.valid_values(None, &DEFAULT_DISREGARDED), vec![1.0, 4.0, 5.0, 6.0]);
        assert_eq!(series.valid_values(Some(3), &DEFAULT_DISREGARDED), vec![4.0, 5.0, 6.0]);
        assert_eq!(series.valid_values(Some(4), &DEFAULT_DISREGARDED), vec![4.0, 5.0, 6.0]);
        assert_eq!(series.valid_values(Some(3), &[]).len(), 3);
    }

    #[test]
    fn test_huge_lookback_keeps_every_year() {
        let series = annual(&[1.0, 2.0, 3.0], None);
        assert_eq!(series.valid_values(Some(u32::MAX), &DEFAULT_DISREGARDED), vec![1.0, 2.0, 3.0]);
        assert_eq!(series.valid_values(Some(i32::MAX as u32), &DEFAULT_DISREGARDED).len(), 3);
    }

    #[test]
    fn test_neutral_rank_without_data() {
        let series = annual(&[0.0, 0.0], Some(1.0));
        assert_relative_eq!(series.pctrank_of_latest(None, &DEFAULT_DISREGARDED), 50.0);
        let empty = annual(&[], None);
        assert_relative_eq!(empty.pctrank_of_latest(None, &DEFAULT_DISREGARDED), 50.0);
        assert!(empty.range_info(None, &DEFAULT_DISREGARDED).is_none());
    }

    #[test]
    fn test_range_info() {
        let series = annual(&[4.0, 1.0, 3.0, 2.0], Some(3.5));
        let info = series.range_info(None, &DEFAULT_DISREGARDED).unwrap();
        assert_eq!(info.min, 1.0);
        assert_eq!(info.max, 4.0);
        assert_relative_eq!(info.median, 2.5);
        assert_relative_eq!(info.percentile_rank, 75.0);
    }
}
