use std::collections::BTreeMap;

use analysis_core::{AnnualStatements, QuoteHistory, TTM_MARKER};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;

/// Annualized return in percent (two decimals) from buying at the latest
/// quote and selling at the latest non-zero normal price, plus `dividend_yield`
/// (a fraction). `None` unless that normal price lies after the quote.
pub fn estimated_return(
    quotes: &QuoteHistory,
    normal_prices: &BTreeMap<NaiveDate, f64>,
    dividend_yield: f64,
) -> Option<f64> {
    let (quote_date, quote) = quotes.iter().next_back()?;
    let (normal_date, normal) = normal_prices.iter().rev().find(|(_, p)| **p != 0.0)?;

    let years = (*normal_date - *quote_date).num_days() as f64 / 365.0;
    if years <= 0.0 || *quote <= 0.0 {
        return None;
    }
    let price_return = (normal / quote).powf(1.0 / years) - 1.0;
    let total = (price_return + dividend_yield) * 100.0;
    Some((total * 100.0).round() / 100.0)
}

/// Date bounds for a valuation look-back of some number of years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValuationWindow {
    pub quotes_start: NaiveDate,
    /// One year before `quotes_start`; interpolation needs the prior fiscal year.
    pub financials_start: NaiveDate,
    pub end: NaiveDate,
}

pub fn valuation_window(today: NaiveDate, years: i32) -> Option<ValuationWindow> {
    let start_year = today.year() - years;
    Some(ValuationWindow {
        quotes_start: NaiveDate::from_ymd_opt(start_year, 1, 1)?,
        financials_start: NaiveDate::from_ymd_opt(start_year - 1, 1, 1)?,
        end: today,
    })
}

/// Number of reported fiscal years, excluding the TTM column.
pub fn reported_years(annuals: &AnnualStatements) -> usize {
    annuals
        .fiscal_years
        .iter()
        .filter(|year| year.trim() != TTM_MARKER)
        .count()
}

/// Look-back durations (in years) both histories can support, from
/// `min_years` up to one less than the shorter history or `max_years`.
pub fn valuation_durations(
    quotes: &QuoteHistory,
    fiscal_years: usize,
    min_years: usize,
    max_years: usize,
) -> Option<Vec<usize>> {
    let first = quotes.keys().next()?;
    let last = quotes.keys().next_back()?;
    let quote_years = usize::try_from(last.year() - first.year() + 1).ok()?;

    let longest = quote_years.min(fiscal_years).min(max_years).checked_sub(1)?;
    if longest < min_years {
        tracing::debug!("Only {} years of history, need {}", longest, min_years);
        return None;
    }
    Some((min_years.max(1)..=longest).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_estimated_return() {
        let quotes = QuoteHistory::from([(date(2019, 1, 1), 80.0), (date(2020, 1, 1), 100.0)]);
        // 730 days later, 2.0 years
        let normal = BTreeMap::from([(date(2021, 12, 31), 121.0), (date(2022, 12, 31), 0.0)]);
        let result = estimated_return(&quotes, &normal, 0.02).unwrap();
        assert_relative_eq!(result, 12.0, epsilon = 1e-9);
    }

    #[test]
    fn test_estimated_return_needs_future_price() {
        let quotes = QuoteHistory::from([(date(2020, 1, 1), 100.0)]);
        let past = BTreeMap::from([(date(2019, 12, 1), 120.0)]);
        assert_eq!(estimated_return(&quotes, &past, 0.0), None);

        let zeros = BTreeMap::from([(date(2022, 12, 1), 0.0)]);
        assert_eq!(estimated_return(&quotes, &zeros, 0.0), None);
        assert_eq!(estimated_return(&QuoteHistory::new(), &past, 0.0), None);
    }

    #[test]
    fn test_valuation_window() {
        let window = valuation_window(date(2024, 6, 15), 20).unwrap();
        assert_eq!(window.quotes_start, date(2004, 1, 1));
        assert_eq!(window.financials_start, date(2003, 1, 1));
        assert_eq!(window.end, date(2024, 6, 15));
    }

    #[test]
    fn test_valuation_durations() {
        let quotes: QuoteHistory = (2010..=2020).map(|y| (date(y, 1, 1), 1.0)).collect();
        // 11 quote years, 8 fiscal years: longest look-back is 7
        assert_eq!(valuation_durations(&quotes, 8, 3, 20), Some(vec![3, 4, 5, 6, 7]));
        assert_eq!(valuation_durations(&quotes, 30, 3, 5), Some(vec![3, 4]));
        assert_eq!(valuation_durations(&quotes, 3, 3, 20), None);
        assert_eq!(valuation_durations(&QuoteHistory::new(), 8, 3, 20), None);
    }

    #[test]
    fn test_reported_years_skips_ttm() {
        let annuals = AnnualStatements::new(vec!["2019-12".into(), "2020-12".into(), "TTM".into()]);
        assert_eq!(reported_years(&annuals), 2);
    }
}
