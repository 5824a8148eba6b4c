use crate::stats::index_slope;
use crate::MetricSeries;

/// Growth over a window of consecutive annual values.
///
/// Log scale: `exp(slope) - 1` of a log-linear fit when every value is
/// positive, the endpoint compound annual rate when only the endpoints are
/// positive, otherwise unavailable. Linear scale: the raw slope, a level
/// change per year.
pub fn window_growth(values: &[f64], log_scale: bool) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    if !log_scale {
        if values.iter().any(|v| !v.is_finite()) {
            return None;
        }
        return index_slope(values);
    }

    if values.iter().all(|&v| v > 0.0 && v.is_finite()) {
        let logs: Vec<f64> = values.iter().map(|v| v.ln()).collect();
        return index_slope(&logs).map(|slope| slope.exp() - 1.0);
    }

    let first = values[0];
    let last = values[values.len() - 1];
    if first > 0.0 && last > 0.0 && first.is_finite() && last.is_finite() {
        let years = (values.len() - 1) as f64;
        return Some((last / first).powf(1.0 / years) - 1.0);
    }
    None
}

impl MetricSeries {
    /// Trailing `years`-year growth rate over the last `years + 1` annual values.
    pub fn growth_rate(&self, years: usize, log_scale: bool) -> Option<f64> {
        let values = self.values();
        if years == 0 || values.len() < years + 1 {
            return None;
        }
        window_growth(&values[values.len() - years - 1..], log_scale)
    }

    /// Series of trailing growth rates, one per point. Early points use the
    /// shorter window that is available; the first point has no growth (NaN).
    pub fn growth_metric(&self, years: usize, log_scale: bool) -> MetricSeries {
        let values = self.values();
        let data = self
            .data
            .keys()
            .enumerate()
            .map(|(i, date)| {
                let start = i.saturating_sub(years);
                let growth = window_growth(&values[start..=i], log_scale).unwrap_or(f64::NAN);
                (*date, growth)
            })
            .collect();
        MetricSeries {
            name: format!("{}-Year {} Growth", years, self.name),
            data,
            ttm: self.growth_rate(years, log_scale),
            has_ttm: true,
            coerced: self.coerced,
            shares: None,
        }
    }
}
