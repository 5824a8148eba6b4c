use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{AnalysisError, AnalysisResult};

/// Format of the `Fiscal Year` column in financial statements.
pub const FISCAL_YEAR_FORMAT: &str = "%Y-%m";

/// Format of analyst estimate periods.
pub const ESTIMATE_PERIOD_FORMAT: &str = "%Y%m";

/// Timestamp marker carrying the trailing-twelve-month value.
pub const TTM_MARKER: &str = "TTM";

/// What to do with raw values that are not numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoercionPolicy {
    /// Substitute for unparseable values. `None` rejects them instead.
    pub default: Option<f64>,
    /// Emit a warning for every substituted value.
    pub log_failures: bool,
}

impl Default for CoercionPolicy {
    fn default() -> Self {
        Self {
            default: Some(0.0),
            log_failures: true,
        }
    }
}

impl CoercionPolicy {
    /// Reject non-numeric values with an error.
    pub fn strict() -> Self {
        Self {
            default: None,
            log_failures: true,
        }
    }

    pub fn with_default(default: f64) -> Self {
        Self {
            default: Some(default),
            log_failures: true,
        }
    }

    pub fn quiet(mut self) -> Self {
        self.log_failures = false;
        self
    }
}

/// Outcome of coercing one raw value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coerced {
    Parsed(f64),
    Defaulted(f64),
}

impl Coerced {
    pub fn value(self) -> f64 {
        match self {
            Coerced::Parsed(v) | Coerced::Defaulted(v) => v,
        }
    }

    pub fn was_defaulted(self) -> bool {
        matches!(self, Coerced::Defaulted(_))
    }
}

fn numeric(raw: &Value) -> Option<f64> {
    let parsed = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Coerce a raw payload value to a float following `policy`.
pub fn parse_or_default(name: &str, raw: &Value, policy: &CoercionPolicy) -> AnalysisResult<Coerced> {
    if let Some(v) = numeric(raw) {
        return Ok(Coerced::Parsed(v));
    }
    match policy.default {
        Some(default) => {
            if policy.log_failures {
                tracing::warn!("Non-numeric value {} for {}, using {}", raw, name, default);
            }
            Ok(Coerced::Defaulted(default))
        }
        None => Err(AnalysisError::NonNumeric {
            name: name.to_string(),
            raw: raw.to_string(),
        }),
    }
}

/// Parse a timestamp string. Formats without a day component (`%Y-%m`,
/// `%Y%m`) resolve to the first day of the month.
pub fn parse_timestamp(value: &str, format: &str) -> AnalysisResult<NaiveDate> {
    let trimmed = value.trim();
    NaiveDate::parse_from_str(trimmed, format)
        .or_else(|_| NaiveDate::parse_from_str(&format!("{trimmed}-01"), &format!("{format}-%d")))
        .map_err(|_| AnalysisError::InvalidTimestamp {
            value: value.to_string(),
            format: format.to_string(),
        })
}

pub fn format_timestamp(date: NaiveDate, format: &str) -> String {
    date.format(format).to_string()
}
