use std::collections::BTreeMap;

use analysis_core::stats::mean;
use analysis_core::{
    AnalysisError, AnalysisResult, AnalystEstimates, FinancialsPayload, MetricSeries, QuoteHistory, SeriesOptions,
    ESTIMATE_PERIOD_FORMAT,
};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::config::{AnalysisConfig, ValuationMetric, ValuationParams, SHARES_FIELD, SHARES_SECTION};

/// One month of price against the interpolated per-share metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValuationRatio {
    pub price: f64,
    pub metric: f64,
    /// `None` when the metric is zero.
    pub ratio: Option<f64>,
}

/// Month in which every fiscal year ends; `None` for an empty series.
pub fn fiscal_year_end_month(per_share: &BTreeMap<NaiveDate, f64>) -> AnalysisResult<Option<u32>> {
    let mut dates = per_share.keys();
    let Some(first) = dates.next() else {
        return Ok(None);
    };
    for date in dates {
        if date.month() != first.month() {
            return Err(AnalysisError::FiscalYearEndMismatch {
                first: *first,
                expected: first.month(),
                found_at: *date,
                found: date.month(),
            });
        }
    }
    Ok(Some(first.month()))
}

/// Monthly price multiples. The annual per-share metric is interpolated
/// linearly between fiscal year ends: months up to the fiscal year end use
/// the prior year as the other anchor, later months the next year.
pub fn valuation_ratios(
    quotes: &QuoteHistory,
    per_share: &BTreeMap<NaiveDate, f64>,
    params: &ValuationParams,
) -> AnalysisResult<BTreeMap<NaiveDate, ValuationRatio>> {
    let Some(fye_month) = fiscal_year_end_month(per_share)? else {
        return Ok(BTreeMap::new());
    };
    let by_year: BTreeMap<i32, f64> = per_share
        .iter()
        .filter(|(_, v)| v.is_finite())
        .map(|(date, v)| (date.year(), *v))
        .collect();
    let last = per_share.iter().next_back().map(|(d, v)| (*d, *v));

    let mut ratios = BTreeMap::new();
    for (date, price) in quotes {
        let year = date.year();
        let month = date.month();
        let current = by_year.get(&year).copied();

        let interpolated = if month <= fye_month {
            match (current, by_year.get(&(year - 1))) {
                (Some(cur), Some(&prev)) => Some(prev + (cur - prev) * f64::from(month + 12 - fye_month) / 12.0),
                _ => None,
            }
        } else {
            match (current, by_year.get(&(year + 1))) {
                (Some(cur), Some(&next)) => Some(cur + (next - cur) * f64::from(month - fye_month) / 12.0),
                _ => None,
            }
        };

        let metric = match (interpolated, last) {
            (Some(value), _) => value,
            (None, Some((last_date, last_value))) if params.extrapolate && *date > last_date && last_value.is_finite() => {
                last_value
            }
            _ => continue,
        };

        if metric <= 0.0 && !params.keep_non_positive {
            continue;
        }
        let ratio = if metric == 0.0 { None } else { Some(price / metric) };
        ratios.insert(
            *date,
            ValuationRatio {
                price: *price,
                metric,
                ratio,
            },
        );
    }
    Ok(ratios)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum AverageMultiple {
    Average {
        value: f64,
        sample_size: usize,
        /// Ratios dropped from each end.
        trimmed: usize,
    },
    InsufficientData {
        available: usize,
        required: usize,
    },
}

impl AverageMultiple {
    pub fn value(&self) -> Option<f64> {
        match self {
            AverageMultiple::Average { value, .. } => Some(*value),
            AverageMultiple::InsufficientData { .. } => None,
        }
    }
}

/// Mean of the monthly ratios with `trim_per_side` dropped from each end.
/// With too few ratios to trim the plain mean is used.
pub fn average_price_multiple(ratios: &BTreeMap<NaiveDate, ValuationRatio>, params: &ValuationParams) -> AverageMultiple {
    let mut values: Vec<f64> = ratios
        .values()
        .filter_map(|r| r.ratio)
        .filter(|r| r.is_finite())
        .collect();
    if values.len() < params.min_ratios || values.is_empty() {
        return AverageMultiple::InsufficientData {
            available: values.len(),
            required: params.min_ratios,
        };
    }

    values.sort_by(f64::total_cmp);
    let trim = if values.len() > 2 * params.trim_per_side {
        params.trim_per_side
    } else {
        0
    };
    let kept = &values[trim..values.len() - trim];
    match mean(kept) {
        Some(value) => AverageMultiple::Average {
            value,
            sample_size: kept.len(),
            trimmed: trim,
        },
        None => AverageMultiple::InsufficientData {
            available: values.len(),
            required: params.min_ratios,
        },
    }
}

/// `max(0, multiple * per_share)` for every historical and estimated point;
/// estimates replace historical values on the same date.
pub fn normal_price_series(
    multiple: f64,
    historical: &BTreeMap<NaiveDate, f64>,
    estimated: Option<&BTreeMap<NaiveDate, f64>>,
) -> BTreeMap<NaiveDate, f64> {
    let mut combined = historical.clone();
    if let Some(estimated) = estimated {
        combined.extend(estimated.iter().map(|(d, v)| (*d, *v)));
    }
    combined
        .into_iter()
        .filter(|(_, v)| v.is_finite())
        .map(|(date, value)| (date, (multiple * value).max(0.0)))
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct NormalPriceEstimate {
    pub metric: String,
    pub average: AverageMultiple,
    pub ratios: BTreeMap<NaiveDate, ValuationRatio>,
    /// Empty when the average multiple could not be computed.
    pub normal_prices: BTreeMap<NaiveDate, f64>,
}

/// Normal prices of one issuer based on `metric` and its historical average multiple.
pub fn normal_price(
    payload: &FinancialsPayload,
    quotes: &QuoteHistory,
    estimates: Option<&AnalystEstimates>,
    metric: &ValuationMetric,
    config: &AnalysisConfig,
) -> AnalysisResult<NormalPriceEstimate> {
    let annuals = payload.annuals();
    let options = SeriesOptions::default().with_coercion(config.coercion.clone());

    let shares = MetricSeries::from_raw(
        SHARES_FIELD,
        &annuals.fiscal_years,
        annuals.field(SHARES_SECTION, SHARES_FIELD)?,
        config.start_date,
        &options,
    )?;
    let totals = MetricSeries::from_raw(
        &metric.name,
        &annuals.fiscal_years,
        annuals.field(&metric.section, &metric.name)?,
        config.start_date,
        &options,
    )?
    .with_shares(shares.values())?;
    let per_share = totals.per_share_data().unwrap_or_default();

    let ratios = valuation_ratios(quotes, &per_share, &config.valuation)?;
    let average = average_price_multiple(&ratios, &config.valuation);

    let Some(multiple) = average.value() else {
        tracing::info!("Not enough monthly ratios for a {} multiple: {:?}", metric.name, average);
        return Ok(NormalPriceEstimate {
            metric: metric.name.clone(),
            average,
            ratios,
            normal_prices: BTreeMap::new(),
        });
    };

    let projected = match estimates {
        Some(estimates) => estimated_per_share(estimates, metric, shares.ttm(), config)?,
        None => None,
    };

    Ok(NormalPriceEstimate {
        metric: metric.name.clone(),
        average,
        normal_prices: normal_price_series(multiple, &per_share, projected.as_ref()),
        ratios,
    })
}

fn estimated_per_share(
    estimates: &AnalystEstimates,
    metric: &ValuationMetric,
    shares_ttm: Option<f64>,
    config: &AnalysisConfig,
) -> AnalysisResult<Option<BTreeMap<NaiveDate, f64>>> {
    let table = &estimates.annual;
    let values = match table.field(&metric.estimate_field) {
        Ok(values) => values,
        Err(AnalysisError::MissingField { field, .. }) => {
            tracing::warn!("No {} estimates, normal prices cover history only", field);
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let options = SeriesOptions::default()
        .with_format(ESTIMATE_PERIOD_FORMAT)
        .with_coercion(config.coercion.clone());
    let name = format!("{} (estimated)", metric.name);
    let series = MetricSeries::from_raw(&name, &table.date, values, config.start_date, &options)?;

    if metric.estimate_per_share {
        return Ok(Some(series.data().clone()));
    }
    match shares_ttm {
        Some(count) => Ok(series.with_shares(vec![count])?.per_share_data()),
        None => {
            tracing::warn!("No TTM share count, cannot project {}", name);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn date(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn ratio(value: f64) -> ValuationRatio {
        ValuationRatio {
            price: value,
            metric: 1.0,
            ratio: Some(value),
        }
    }

    #[test]
    fn test_interpolates_around_fiscal_year_end() {
        let per_share = BTreeMap::from([(date(2019, 9), 1.0), (date(2020, 9), 2.2), (date(2021, 9), 3.4)]);
        let quotes = QuoteHistory::from([(date(2020, 3), 16.0), (date(2020, 9), 22.0), (date(2020, 12), 25.0)]);
        let ratios = valuation_ratios(&quotes, &per_share, &ValuationParams::default()).unwrap();

        // March is six months after the September year end
        assert_relative_eq!(ratios[&date(2020, 3)].metric, 1.6, epsilon = 1e-12);
        assert_relative_eq!(ratios[&date(2020, 3)].ratio.unwrap(), 10.0, epsilon = 1e-12);
        assert_relative_eq!(ratios[&date(2020, 9)].metric, 2.2, epsilon = 1e-12);
        assert_relative_eq!(ratios[&date(2020, 12)].metric, 2.5, epsilon = 1e-12);
    }

    #[test]
    fn test_non_positive_months_dropped_unless_kept() {
        let per_share = BTreeMap::from([(date(2019, 12), -1.0), (date(2020, 12), 1.0)]);
        let quotes = QuoteHistory::from([(date(2020, 3), 10.0), (date(2020, 9), 10.0)]);

        let ratios = valuation_ratios(&quotes, &per_share, &ValuationParams::default()).unwrap();
        assert_eq!(ratios.keys().copied().collect::<Vec<_>>(), vec![date(2020, 9)]);

        let params = ValuationParams {
            keep_non_positive: true,
            ..ValuationParams::default()
        };
        let ratios = valuation_ratios(&quotes, &per_share, &params).unwrap();
        assert_eq!(ratios.len(), 2);
        assert_relative_eq!(ratios[&date(2020, 3)].metric, -0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_extrapolation_beyond_last_fiscal_year() {
        let per_share = BTreeMap::from([(date(2019, 12), 1.0), (date(2020, 12), 2.0)]);
        let quotes = QuoteHistory::from([(date(2021, 2), 30.0)]);

        assert!(valuation_ratios(&quotes, &per_share, &ValuationParams::default())
            .unwrap()
            .is_empty());

        let params = ValuationParams {
            extrapolate: true,
            ..ValuationParams::default()
        };
        let ratios = valuation_ratios(&quotes, &per_share, &params).unwrap();
        assert_eq!(ratios[&date(2021, 2)].ratio, Some(15.0));
    }

    #[test]
    fn test_fiscal_year_end_mismatch() {
        let per_share = BTreeMap::from([(date(2018, 12), 1.0), (date(2019, 12), 1.0), (date(2020, 9), 1.0)]);
        assert_eq!(
            fiscal_year_end_month(&per_share),
            Err(AnalysisError::FiscalYearEndMismatch {
                first: date(2018, 12),
                expected: 12,
                found_at: date(2020, 9),
                found: 9,
            })
        );
        assert_eq!(fiscal_year_end_month(&BTreeMap::new()), Ok(None));
    }

    #[test]
    fn test_average_trims_twelve_each_side() {
        // 12 huge, 12 tiny, 12 tens
        let mut ratios = BTreeMap::new();
        let mut day = date(2000, 1);
        for value in std::iter::repeat(1000.0)
            .take(12)
            .chain(std::iter::repeat(0.001).take(12))
            .chain(std::iter::repeat(10.0).take(12))
        {
            ratios.insert(day, ratio(value));
            day = day.checked_add_months(chrono::Months::new(1)).unwrap();
        }
        let average = average_price_multiple(&ratios, &ValuationParams::default());
        assert_eq!(
            average,
            AverageMultiple::Average {
                value: 10.0,
                sample_size: 12,
                trimmed: 12
            }
        );
    }

    #[test]
    fn test_average_insufficient_data() {
        let ratios: BTreeMap<_, _> = (1..=12).map(|m| (date(2020, m), ratio(5.0))).collect();
        let average = average_price_multiple(&ratios, &ValuationParams::default());
        assert_eq!(
            average,
            AverageMultiple::InsufficientData {
                available: 12,
                required: 36
            }
        );
        assert_eq!(average.value(), None);
    }

    #[test]
    fn test_average_without_trim_for_small_minimum() {
        let params = ValuationParams {
            min_ratios: 3,
            ..ValuationParams::default()
        };
        let ratios = BTreeMap::from([(date(2020, 1), ratio(1.0)), (date(2020, 2), ratio(2.0)), (date(2020, 3), ratio(6.0))]);
        assert_eq!(average_price_multiple(&ratios, &params).value(), Some(3.0));
    }

    #[test]
    fn test_trim_starts_above_twice_the_trim() {
        let params = ValuationParams {
            min_ratios: 24,
            ..ValuationParams::default()
        };
        let monthly = |count: u32| -> BTreeMap<NaiveDate, ValuationRatio> {
            (0..count)
                .map(|i| (date(2020 + (i / 12) as i32, i % 12 + 1), ratio(f64::from(i + 1))))
                .collect()
        };

        assert_eq!(
            average_price_multiple(&monthly(24), &params),
            AverageMultiple::Average {
                value: 12.5,
                sample_size: 24,
                trimmed: 0
            }
        );
        // 1..=25 keeps only the median
        assert_eq!(
            average_price_multiple(&monthly(25), &params),
            AverageMultiple::Average {
                value: 13.0,
                sample_size: 1,
                trimmed: 12
            }
        );
    }

    #[test]
    fn test_normal_prices_floor_and_override() {
        let historical = BTreeMap::from([(date(2019, 12), 2.0), (date(2020, 12), -1.0), (date(2021, 12), 3.0)]);
        let estimated = BTreeMap::from([(date(2021, 12), 4.0), (date(2022, 12), 5.0)]);
        let prices = normal_price_series(10.0, &historical, Some(&estimated));
        assert_eq!(
            prices,
            BTreeMap::from([
                (date(2019, 12), 20.0),
                (date(2020, 12), 0.0),
                (date(2021, 12), 40.0),
                (date(2022, 12), 50.0),
            ])
        );
        assert!(prices.values().all(|p| *p >= 0.0));
    }
}
