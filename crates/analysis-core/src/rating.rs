use serde::{Deserialize, Serialize};

use crate::stats::DEFAULT_DISREGARDED;
use crate::{AnalysisError, AnalysisResult, MetricSeries};

/// Nominal weights of the three rating components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingWeights {
    pub percentile: f64,
    pub trend: f64,
    pub benchmark: f64,
}

impl Default for RatingWeights {
    fn default() -> Self {
        Self {
            percentile: 1.0 / 3.0,
            trend: 1.0 / 3.0,
            benchmark: 1.0 / 3.0,
        }
    }
}

impl RatingWeights {
    pub fn validate(&self) -> AnalysisResult<()> {
        let all = [self.percentile, self.trend, self.benchmark];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(AnalysisError::InvalidConfig(format!("rating weights must be non-negative: {:?}", self)));
        }
        if all.iter().sum::<f64>() <= 0.0 {
            return Err(AnalysisError::InvalidConfig("rating weights sum to zero".to_string()));
        }
        Ok(())
    }
}

/// Tuning shared by every rating in an analysis run.
#[derive(Debug, Clone)]
pub struct RatingParams {
    /// Years of history the percentile rank compares against; `None` for all.
    pub lookback_years: Option<u32>,
    /// Years of linear-scale growth that define the trend.
    pub trend_window: usize,
    /// Trend must exceed this to count as improving; `None` disables the trend component.
    pub trend_threshold: Option<f64>,
    pub weights: RatingWeights,
    /// Values ignored by the percentile rank.
    pub disregarded: Vec<f64>,
}

impl Default for RatingParams {
    fn default() -> Self {
        Self {
            lookback_years: Some(10),
            trend_window: 5,
            trend_threshold: Some(0.0),
            weights: RatingWeights::default(),
            disregarded: DEFAULT_DISREGARDED.to_vec(),
        }
    }
}

/// Every intermediate quantity behind a rating.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingBreakdown {
    pub latest: Option<f64>,
    /// 0-100
    pub percentile_rank: f64,
    pub percentile_score: f64,
    pub trend: Option<f64>,
    pub trend_score: Option<f64>,
    pub benchmark: Option<f64>,
    pub benchmark_ratio: Option<f64>,
    pub benchmark_score: Option<f64>,
    /// Weights actually applied; zero for components without input.
    pub weights: RatingWeights,
    pub score: Option<f64>,
}

fn trend_score(trend: f64, threshold: f64, reverse: bool) -> f64 {
    let improving = trend > threshold;
    if reverse {
        // a falling "lower is better" metric always counts as favourable
        if !improving || trend <= 0.0 {
            1.0
        } else {
            0.0
        }
    } else if improving {
        1.0
    } else {
        0.0
    }
}

fn benchmark_score(ratio: f64, reverse: bool) -> f64 {
    let favourable = if reverse { ratio <= 1.0 } else { ratio > 1.0 };
    if favourable {
        1.0
    } else {
        0.0
    }
}

impl MetricSeries {
    /// Composite 0-1 rating, `None` when no component has input.
    pub fn rating(&self, benchmark: Option<f64>, reverse: bool, params: &RatingParams) -> Option<f64> {
        self.rating_breakdown(benchmark, reverse, params).score
    }

    /// Blend of percentile rank, trend direction and benchmark comparison,
    /// normalised by the weights of the components that have input.
    /// `reverse` marks metrics where lower values are better.
    pub fn rating_breakdown(&self, benchmark: Option<f64>, reverse: bool, params: &RatingParams) -> RatingBreakdown {
        let latest = self.latest_value();

        let rank = self.percentile_rank(latest, params.lookback_years, &params.disregarded);
        let percentile_score = if reverse { 1.0 - rank / 100.0 } else { rank / 100.0 };

        let trend = self.growth_rate(params.trend_window, false);
        let trend_component = match (trend, params.trend_threshold) {
            (Some(t), Some(threshold)) => Some(trend_score(t, threshold, reverse)),
            _ => None,
        };

        let benchmark_ratio = match (latest, benchmark) {
            (Some(value), Some(b)) if value.is_finite() && b != 0.0 => Some(value / b),
            _ => None,
        };
        let benchmark_component = benchmark_ratio.map(|ratio| benchmark_score(ratio, reverse));

        let weights = RatingWeights {
            percentile: params.weights.percentile,
            trend: if trend_component.is_some() { params.weights.trend } else { 0.0 },
            benchmark: if benchmark_component.is_some() { params.weights.benchmark } else { 0.0 },
        };
        let total = weights.percentile + weights.trend + weights.benchmark;
        let score = if total > 0.0 {
            let weighted = weights.percentile * percentile_score
                + weights.trend * trend_component.unwrap_or(0.0)
                + weights.benchmark * benchmark_component.unwrap_or(0.0);
            Some(weighted / total)
        } else {
            None
        };

        RatingBreakdown {
            latest,
            percentile_rank: rank,
            percentile_score,
            trend,
            trend_score: trend_component,
            benchmark,
            benchmark_ratio,
            benchmark_score: benchmark_component,
            weights,
            score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn annual(values: &[f64], ttm: Option<f64>) -> MetricSeries {
        MetricSeries::from_points(
            "ROE %",
            values
                .iter()
                .enumerate()
                .map(|(i, v)| (NaiveDate::from_ymd_opt(2012 + i as i32, 12, 1).unwrap(), *v)),
            ttm,
            None,
        )
    }

    fn percentile_only() -> RatingParams {
        RatingParams {
            trend_threshold: None,
            ..RatingParams::default()
        }
    }

    #[test]
    fn test_collapses_to_percentile_score() {
        let series = annual(&[1.0, 2.0, 3.0, 4.0], Some(3.5));
        let breakdown = series.rating_breakdown(None, false, &percentile_only());
        assert_relative_eq!(breakdown.percentile_rank, 75.0);
        assert_relative_eq!(breakdown.score.unwrap(), 0.75);
        assert_eq!(breakdown.weights.trend, 0.0);
        assert_eq!(breakdown.weights.benchmark, 0.0);

        let reversed = series.rating(None, true, &percentile_only()).unwrap();
        assert_relative_eq!(reversed, 0.25);
    }

    #[test]
    fn test_all_components() {
        // rising series, latest above benchmark
        let series = annual(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], Some(5.5));
        let breakdown = series.rating_breakdown(Some(5.0), false, &RatingParams::default());
        assert_relative_eq!(breakdown.percentile_score, 5.0 / 6.0);
        assert_eq!(breakdown.trend_score, Some(1.0));
        assert_eq!(breakdown.benchmark_score, Some(1.0));
        assert_relative_eq!(breakdown.score.unwrap(), (5.0 / 6.0 + 2.0) / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_reverse_trend_asymmetry() {
        // falling metric where lower is better: favourable
        let falling = annual(&[6.0, 5.0, 4.0, 3.0, 2.0, 1.0], None);
        assert_eq!(falling.rating_breakdown(None, true, &RatingParams::default()).trend_score, Some(1.0));
        // rising metric where lower is better: unfavourable
        let rising = annual(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], None);
        assert_eq!(rising.rating_breakdown(None, true, &RatingParams::default()).trend_score, Some(0.0));
        // flat trend with a negative threshold: inverted outcome would be 0, non-positive keeps it at 1
        let flat = annual(&[2.0; 6], None);
        let params = RatingParams {
            trend_threshold: Some(-0.5),
            ..RatingParams::default()
        };
        assert_eq!(flat.rating_breakdown(None, true, &params).trend_score, Some(1.0));
        assert_eq!(flat.rating_breakdown(None, false, &params).trend_score, Some(1.0));
        assert_eq!(flat.rating_breakdown(None, false, &RatingParams::default()).trend_score, Some(0.0));
    }

    #[test]
    fn test_benchmark_component() {
        let series = annual(&[1.0, 1.0], Some(1.5));
        let params = percentile_only();
        assert_eq!(series.rating_breakdown(Some(1.5), true, &params).benchmark_score, Some(1.0));
        assert_eq!(series.rating_breakdown(Some(1.5), false, &params).benchmark_score, Some(0.0));
        assert_eq!(series.rating_breakdown(Some(1.0), false, &params).benchmark_score, Some(1.0));
        assert_eq!(series.rating_breakdown(Some(0.0), false, &params).benchmark_score, None);
    }

    #[test]
    fn test_unavailable_latest_drops_benchmark() {
        let series = annual(&[2.0, f64::NAN], None);
        let breakdown = series.rating_breakdown(Some(1.0), true, &RatingParams::default());
        assert_eq!(breakdown.latest, None);
        assert_eq!(breakdown.benchmark_ratio, None);
        assert_eq!(breakdown.benchmark_score, None);
        assert_eq!(breakdown.weights.benchmark, 0.0);
        assert_relative_eq!(breakdown.percentile_rank, 50.0);
        assert_relative_eq!(breakdown.score.unwrap(), 0.5);
    }

    #[test]
    fn test_short_history_drops_trend() {
        let series = annual(&[1.0, 2.0], Some(3.0));
        let breakdown = series.rating_breakdown(None, false, &RatingParams::default());
        assert!(breakdown.trend.is_none());
        assert_eq!(breakdown.weights.trend, 0.0);
        assert_relative_eq!(breakdown.score.unwrap(), 1.0);
    }

    #[test]
    fn test_rating_bounded_and_deterministic() {
        let params = RatingParams::default();
        let series = annual(&[3.0, -1.0, 7.5, 0.0, 2.2, 9.1, -4.0, 5.5], Some(-2.0));
        for benchmark in [None, Some(-3.0), Some(0.5), Some(100.0)] {
            for reverse in [false, true] {
                let first = series.rating(benchmark, reverse, &params).unwrap();
                assert!((0.0..=1.0).contains(&first));
                assert_eq!(first, series.rating(benchmark, reverse, &params).unwrap());
            }
        }
    }

    #[test]
    fn test_weight_validation() {
        assert!(RatingWeights::default().validate().is_ok());
        let negative = RatingWeights {
            percentile: -1.0,
            ..RatingWeights::default()
        };
        assert!(negative.validate().is_err());
        let zero = RatingWeights {
            percentile: 0.0,
            trend: 0.0,
            benchmark: 0.0,
        };
        assert!(zero.validate().is_err());
    }
}
