use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

use crate::parse::{parse_or_default, parse_timestamp, CoercionPolicy, FISCAL_YEAR_FORMAT, TTM_MARKER};
use crate::{AnalysisError, AnalysisResult};

/// How raw timestamp/value columns are turned into a series.
#[derive(Debug, Clone)]
pub struct SeriesOptions {
    pub timestamp_format: String,
    /// Multiplier applied to every parsed value, including TTM.
    pub scale: f64,
    pub coercion: CoercionPolicy,
}

impl Default for SeriesOptions {
    fn default() -> Self {
        Self {
            timestamp_format: FISCAL_YEAR_FORMAT.to_string(),
            scale: 1.0,
            coercion: CoercionPolicy::default(),
        }
    }
}

impl SeriesOptions {
    pub fn with_format(mut self, format: &str) -> Self {
        self.timestamp_format = format.to_string();
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_coercion(mut self, coercion: CoercionPolicy) -> Self {
        self.coercion = coercion;
        self
    }
}

/// A named annual series plus its separately tracked trailing-twelve-month value.
///
/// Built once per analysis from a payload slice and not mutated afterwards;
/// derived series (sums, ratios, growth) are new values with their own name and TTM.
#[derive(Debug, Clone, Serialize)]
pub struct MetricSeries {
    pub(crate) name: String,
    pub(crate) data: BTreeMap<NaiveDate, f64>,
    pub(crate) ttm: Option<f64>,
    /// The source carried a TTM column, even if its value is unavailable.
    #[serde(skip)]
    pub(crate) has_ttm: bool,
    #[serde(skip)]
    pub(crate) coerced: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) shares: Option<Vec<f64>>,
}

impl MetricSeries {
    /// Build a series from parallel timestamp strings and raw values. Only
    /// points strictly after `start_date` are kept; the `TTM` marker sets the
    /// trailing value instead of a data point.
    pub fn from_raw(
        name: &str,
        timestamps: &[String],
        values: &[Value],
        start_date: NaiveDate,
        options: &SeriesOptions,
    ) -> AnalysisResult<Self> {
        if timestamps.len() != values.len() {
            return Err(AnalysisError::LengthMismatch {
                name: name.to_string(),
                timestamps: timestamps.len(),
                values: values.len(),
            });
        }

        let mut data = BTreeMap::new();
        let mut ttm = None;
        let mut has_ttm = false;
        let mut coerced = 0;
        for (timestamp, raw) in timestamps.iter().zip(values) {
            let parsed = parse_or_default(name, raw, &options.coercion)?;
            if parsed.was_defaulted() {
                coerced += 1;
            }
            let value = parsed.value() * options.scale;
            if timestamp.trim() == TTM_MARKER {
                ttm = Some(value);
                has_ttm = true;
                continue;
            }
            let date = parse_timestamp(timestamp, &options.timestamp_format)?;
            if date > start_date {
                data.insert(date, value);
            }
        }

        Ok(Self {
            name: name.to_string(),
            data,
            ttm,
            has_ttm,
            coerced,
            shares: None,
        })
    }

    /// Build a series from already parsed points.
    pub fn from_points<I>(name: &str, points: I, ttm: Option<f64>, start_date: Option<NaiveDate>) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, f64)>,
    {
        let data = points
            .into_iter()
            .filter(|(date, _)| start_date.map_or(true, |start| *date > start))
            .collect();
        Self {
            name: name.to_string(),
            data,
            ttm,
            has_ttm: ttm.is_some(),
            coerced: 0,
            shares: None,
        }
    }

    /// A series of zeros over `timestamps`, used for fields an issuer type never reports.
    pub fn zero_filled(
        name: &str,
        timestamps: &[String],
        start_date: NaiveDate,
        options: &SeriesOptions,
    ) -> AnalysisResult<Self> {
        let zeros = vec![Value::from(0.0); timestamps.len()];
        Self::from_raw(name, timestamps, &zeros, start_date, options)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &BTreeMap<NaiveDate, f64> {
        &self.data
    }

    pub fn ttm(&self) -> Option<f64> {
        self.ttm
    }

    pub fn timestamps(&self) -> Vec<NaiveDate> {
        self.data.keys().copied().collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.data.values().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of raw values replaced by the coercion default.
    pub fn coerced_points(&self) -> usize {
        self.coerced
    }

    pub fn latest(&self) -> Option<(NaiveDate, f64)> {
        self.data.iter().next_back().map(|(d, v)| (*d, *v))
    }

    /// The value ratings compare against history: the TTM when the source
    /// has a TTM column, else the last point. `None` when that value is
    /// unavailable (missing or non-finite); an unavailable TTM never falls
    /// back to an older annual value.
    pub fn latest_value(&self) -> Option<f64> {
        let value = if self.has_ttm {
            self.ttm
        } else {
            self.latest().map(|(_, v)| v)
        };
        value.filter(|v| v.is_finite())
    }

    pub fn renamed(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Copy with every value (and the TTM) multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> MetricSeries {
        MetricSeries {
            name: self.name.clone(),
            data: self.data.iter().map(|(d, v)| (*d, v * factor)).collect(),
            ttm: self.ttm.map(|v| v * factor),
            has_ttm: self.has_ttm,
            coerced: self.coerced,
            shares: self.shares.clone(),
        }
    }

    fn ensure_same_timestamps(&self, other: &MetricSeries) -> AnalysisResult<()> {
        if self.data.len() != other.data.len() || !self.data.keys().eq(other.data.keys()) {
            return Err(AnalysisError::TimestampMismatch {
                left: self.name.clone(),
                right: other.name.clone(),
            });
        }
        Ok(())
    }
}

/// Point-wise sum of two series over an identical timestamp set.
pub fn sum_series(left: &MetricSeries, right: &MetricSeries) -> AnalysisResult<MetricSeries> {
    left.ensure_same_timestamps(right)?;
    let data = left
        .data
        .iter()
        .zip(right.data.values())
        .map(|((date, a), b)| (*date, a + b))
        .collect();
    let ttm = match (left.ttm, right.ttm) {
        (Some(a), Some(b)) => Some(a + b),
        _ => None,
    };
    Ok(MetricSeries {
        name: format!("({} + {})", left.name, right.name),
        data,
        ttm,
        has_ttm: left.has_ttm || right.has_ttm,
        coerced: left.coerced + right.coerced,
        shares: None,
    })
}

/// Point-wise quotient of two series over an identical timestamp set.
///
/// A zero denominator makes the result unavailable: NaN for data points,
/// `None` for the TTM.
pub fn divide_series(numerator: &MetricSeries, denominator: &MetricSeries) -> AnalysisResult<MetricSeries> {
    numerator.ensure_same_timestamps(denominator)?;
    let data = numerator
        .data
        .iter()
        .zip(denominator.data.values())
        .map(|((date, a), b)| (*date, if *b == 0.0 { f64::NAN } else { a / b }))
        .collect();
    let ttm = match (numerator.ttm, denominator.ttm) {
        (Some(a), Some(b)) if b != 0.0 => Some(a / b),
        _ => None,
    };
    Ok(MetricSeries {
        name: format!("{} / {}", numerator.name, denominator.name),
        data,
        ttm,
        has_ttm: numerator.has_ttm || denominator.has_ttm,
        coerced: numerator.coerced + denominator.coerced,
        shares: None,
    })
}
