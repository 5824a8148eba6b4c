use analysis_core::{
    AnalysisError, AnalysisResult, CoercionPolicy, MetricSeries, RatingParams, RatingWeights, ValueKind,
};
use chrono::NaiveDate;

use crate::derive::{self, StatementReader};

pub const FINANCIAL_STRENGTH: &str = "Financial Strength";
pub const BUSINESS_GROWTH: &str = "Business Growth";
pub const PROFITABILITY: &str = "Profitability";
pub const STOCK_VALUATION: &str = "Stock Valuation";
pub const DIVIDEND_GROWTH: &str = "Dividend Growth";

/// Builds a metric out of several base series.
pub type DeriveFn = fn(&str, &StatementReader<'_>) -> AnalysisResult<MetricSeries>;

/// Where a metric's series comes from.
#[derive(Clone)]
pub enum MetricSource {
    Field { section: String, field: String },
    Derived(DeriveFn),
}

impl std::fmt::Debug for MetricSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricSource::Field { section, field } => write!(f, "Field({section}/{field})"),
            MetricSource::Derived(_) => f.write_str("Derived"),
        }
    }
}

/// Replace a series by its trailing growth rates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowthTransform {
    pub years: usize,
    pub log_scale: bool,
}

/// One row of a category table.
#[derive(Debug, Clone)]
pub struct MetricSpec {
    pub name: String,
    pub source: MetricSource,
    pub growth: Option<GrowthTransform>,
    /// Lower values are better.
    pub reverse: bool,
    pub benchmark: Option<f64>,
    pub scale: f64,
    pub kind: ValueKind,
}

impl MetricSpec {
    /// A metric read directly from `section`, under its own name.
    pub fn field(name: &str, section: &str) -> Self {
        Self {
            name: name.to_string(),
            source: MetricSource::Field {
                section: section.to_string(),
                field: name.to_string(),
            },
            growth: None,
            reverse: false,
            benchmark: None,
            scale: 1.0,
            kind: ValueKind::Ratio,
        }
    }

    pub fn derived(name: &str, derive: DeriveFn) -> Self {
        Self {
            source: MetricSource::Derived(derive),
            ..Self::field(name, "")
        }
    }

    /// `years`-year log-scale growth of `section/field`, reported in percent.
    pub fn growth_of(field: &str, section: &str, years: usize) -> Self {
        Self {
            name: format!("{years}-Year {field} Growth"),
            source: MetricSource::Field {
                section: section.to_string(),
                field: field.to_string(),
            },
            growth: Some(GrowthTransform { years, log_scale: true }),
            reverse: false,
            benchmark: None,
            scale: 100.0,
            kind: ValueKind::Percentage,
        }
    }

    pub fn reversed(mut self) -> Self {
        self.reverse = true;
        self
    }

    pub fn with_benchmark(mut self, benchmark: f64) -> Self {
        self.benchmark = Some(benchmark);
        self
    }

    pub fn with_kind(mut self, kind: ValueKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }
}

#[derive(Debug, Clone)]
pub struct CategoryConfig {
    pub name: String,
    pub metrics: Vec<MetricSpec>,
}

impl CategoryConfig {
    pub fn new(name: &str, metrics: Vec<MetricSpec>) -> Self {
        Self {
            name: name.to_string(),
            metrics,
        }
    }
}

/// Per-category metric tables handed to the aggregator.
#[derive(Debug, Clone)]
pub struct IndicatorConfig {
    pub categories: Vec<CategoryConfig>,
    /// Fields some issuer types never report (insurers have no operating
    /// income, non-payers no dividends). Missing ones are read as zeros.
    pub zero_fill_fields: Vec<String>,
}

impl IndicatorConfig {
    pub fn standard() -> Self {
        let financial_strength = CategoryConfig::new(
            FINANCIAL_STRENGTH,
            vec![
                MetricSpec::derived("Debt-to-Cash", derive::debt_to_cash).reversed(),
                MetricSpec::field("Equity-to-Asset", "common_size_ratios"),
                MetricSpec::field("Debt-to-Equity", "common_size_ratios")
                    .reversed()
                    .with_benchmark(1.5),
                MetricSpec::derived("Debt-to-EBITDA", derive::debt_to_ebitda).reversed(),
                MetricSpec::field("Interest Coverage", "valuation_and_quality"),
                MetricSpec::field("Altman Z-Score", "valuation_and_quality").with_kind(ValueKind::Score),
            ],
        );

        let mut growth_metrics = Vec::new();
        for (field, section) in [
            ("Revenue", "income_statement"),
            ("Operating Income", "income_statement"),
            ("Net Income", "income_statement"),
            ("Cash Flow from Operations", "cashflow_statement"),
        ] {
            for years in [3, 5] {
                growth_metrics.push(MetricSpec::growth_of(field, section, years));
            }
        }
        let business_growth = CategoryConfig::new(BUSINESS_GROWTH, growth_metrics);

        let profitability = CategoryConfig::new(
            PROFITABILITY,
            [
                ("Gross Margin %", 38.32),
                ("Operating Margin %", 14.56),
                ("Net Margin %", 10.46),
                ("FCF Margin %", 18.75),
                ("ROE %", 16.35),
            ]
            .into_iter()
            .map(|(name, benchmark)| {
                MetricSpec::field(name, "common_size_ratios")
                    .with_benchmark(benchmark)
                    .with_kind(ValueKind::Percentage)
            })
            .collect(),
        );

        let stock_valuation = CategoryConfig::new(
            STOCK_VALUATION,
            ["PE Ratio", "PB Ratio", "PS Ratio", "Price-to-Free-Cash-Flow", "EV-to-EBITDA"]
                .into_iter()
                .map(|name| MetricSpec::field(name, "valuation_ratios").reversed())
                .collect(),
        );

        let dividend_growth = CategoryConfig::new(
            DIVIDEND_GROWTH,
            vec![
                MetricSpec::field("Dividend Yield %", "valuation_ratios").with_kind(ValueKind::Percentage),
                MetricSpec::field("Dividend Payout Ratio", "valuation_and_quality").reversed(),
                MetricSpec::growth_of("Dividends per Share", "per_share_data_array", 3),
                MetricSpec::growth_of("Dividends per Share", "per_share_data_array", 5),
            ],
        );

        Self {
            categories: vec![financial_strength, business_growth, profitability, stock_valuation, dividend_growth],
            zero_fill_fields: [
                "Operating Income",
                "Gross Profit",
                "Gross Margin %",
                "Operating Margin %",
                "Dividend Yield %",
                "Dividend Payout Ratio",
                "Dividends per Share",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }

    pub fn category(&self, name: &str) -> Option<&CategoryConfig> {
        self.categories.iter().find(|c| c.name == name)
    }

    pub fn validate(&self) -> AnalysisResult<()> {
        for category in &self.categories {
            let mut seen = std::collections::HashSet::new();
            for spec in &category.metrics {
                if !seen.insert(spec.name.as_str()) {
                    return Err(AnalysisError::InvalidConfig(format!(
                        "duplicate metric '{}' in {}",
                        spec.name, category.name
                    )));
                }
                if !spec.scale.is_finite() || spec.scale == 0.0 {
                    return Err(AnalysisError::InvalidConfig(format!("invalid scale for '{}'", spec.name)));
                }
                if spec.growth.map_or(false, |g| g.years == 0) {
                    return Err(AnalysisError::InvalidConfig(format!("zero growth window for '{}'", spec.name)));
                }
            }
        }
        Ok(())
    }
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self::standard()
    }
}

/// Tuning of the average price multiple.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuationParams {
    /// Fewer qualifying monthly ratios than this means insufficient data.
    pub min_ratios: usize,
    /// Ratios dropped from each end before averaging.
    pub trim_per_side: usize,
    /// Keep months whose interpolated metric is zero or negative.
    pub keep_non_positive: bool,
    /// Carry the latest annual value into months after the last fiscal year.
    pub extrapolate: bool,
}

impl Default for ValuationParams {
    fn default() -> Self {
        Self {
            min_ratios: 36,
            trim_per_side: 12,
            keep_non_positive: false,
            extrapolate: false,
        }
    }
}

pub const SHARES_SECTION: &str = "income_statement";
pub const SHARES_FIELD: &str = "Shares Outstanding (Diluted Average)";

/// A metric normal prices can be based on, and the analyst estimate that projects it.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuationMetric {
    pub name: String,
    pub section: String,
    pub estimate_field: String,
    /// The estimate is already per share (EPS) rather than a company total.
    pub estimate_per_share: bool,
}

impl ValuationMetric {
    pub fn standard(name: &str) -> Option<Self> {
        let (section, estimate_field, estimate_per_share) = match name {
            "EBIT" => ("income_statement", "ebit_estimate", false),
            "EBITDA" => ("income_statement", "ebitda_estimate", false),
            "Net Income" => ("income_statement", "per_share_eps_estimate", true),
            _ => return None,
        };
        Some(Self {
            name: name.to_string(),
            section: section.to_string(),
            estimate_field: estimate_field.to_string(),
            estimate_per_share,
        })
    }
}

/// Everything one analysis run needs besides the payloads.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Only fiscal years after this date are considered.
    pub start_date: NaiveDate,
    pub coercion: CoercionPolicy,
    pub rating: RatingParams,
    /// Report full rating breakdowns instead of bare scores.
    pub debug_ratings: bool,
    pub valuation: ValuationParams,
    pub valuation_metric: ValuationMetric,
    pub indicators: IndicatorConfig,
}

fn earliest_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN)
}

fn default_valuation_metric() -> ValuationMetric {
    ValuationMetric {
        name: "EBITDA".to_string(),
        section: "income_statement".to_string(),
        estimate_field: "ebitda_estimate".to_string(),
        estimate_per_share: false,
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            start_date: earliest_start(),
            coercion: CoercionPolicy::default(),
            rating: RatingParams::default(),
            debug_ratings: false,
            valuation: ValuationParams::default(),
            valuation_metric: default_valuation_metric(),
            indicators: IndicatorConfig::standard(),
        }
    }
}

fn parse_or_warn<T: std::str::FromStr>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {}={}", key, value);
            default
        }),
        None => default,
    }
}

/// `none`, `all` or `off` disable an optional setting.
fn optional<T: std::str::FromStr>(key: &str, raw: Option<String>, default: Option<T>) -> Option<T> {
    match raw {
        Some(value) if matches!(value.trim().to_lowercase().as_str(), "none" | "all" | "off") => None,
        Some(value) => match value.trim().parse() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                tracing::warn!("Ignoring invalid {}={}", key, value);
                default
            }
        },
        None => default,
    }
}

impl AnalysisConfig {
    /// Defaults overridden by `FUNDAMENTALS_*` environment variables (a `.env` file is honoured).
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());

        let start_date = match var("FUNDAMENTALS_START_DATE") {
            Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").unwrap_or_else(|_| {
                tracing::warn!("Ignoring invalid FUNDAMENTALS_START_DATE={}", raw);
                defaults.start_date
            }),
            None => defaults.start_date,
        };

        let coercion = CoercionPolicy {
            default: optional(
                "FUNDAMENTALS_COERCION_DEFAULT",
                var("FUNDAMENTALS_COERCION_DEFAULT").map(|v| if v.trim() == "reject" { "none".to_string() } else { v }),
                defaults.coercion.default,
            ),
            log_failures: parse_or_warn(
                "FUNDAMENTALS_LOG_COERCION",
                var("FUNDAMENTALS_LOG_COERCION"),
                defaults.coercion.log_failures,
            ),
        };

        let rating = RatingParams {
            lookback_years: optional(
                "FUNDAMENTALS_LOOKBACK_YEARS",
                var("FUNDAMENTALS_LOOKBACK_YEARS"),
                defaults.rating.lookback_years,
            ),
            trend_window: parse_or_warn(
                "FUNDAMENTALS_TREND_WINDOW",
                var("FUNDAMENTALS_TREND_WINDOW"),
                defaults.rating.trend_window,
            ),
            trend_threshold: optional(
                "FUNDAMENTALS_TREND_THRESHOLD",
                var("FUNDAMENTALS_TREND_THRESHOLD"),
                defaults.rating.trend_threshold,
            ),
            weights: RatingWeights {
                percentile: parse_or_warn(
                    "FUNDAMENTALS_WEIGHT_PERCENTILE",
                    var("FUNDAMENTALS_WEIGHT_PERCENTILE"),
                    defaults.rating.weights.percentile,
                ),
                trend: parse_or_warn(
                    "FUNDAMENTALS_WEIGHT_TREND",
                    var("FUNDAMENTALS_WEIGHT_TREND"),
                    defaults.rating.weights.trend,
                ),
                benchmark: parse_or_warn(
                    "FUNDAMENTALS_WEIGHT_BENCHMARK",
                    var("FUNDAMENTALS_WEIGHT_BENCHMARK"),
                    defaults.rating.weights.benchmark,
                ),
            },
            disregarded: defaults.rating.disregarded.clone(),
        };

        let valuation = ValuationParams {
            min_ratios: parse_or_warn(
                "FUNDAMENTALS_MIN_MONTHLY_RATIOS",
                var("FUNDAMENTALS_MIN_MONTHLY_RATIOS"),
                defaults.valuation.min_ratios,
            ),
            trim_per_side: parse_or_warn(
                "FUNDAMENTALS_TRIM_PER_SIDE",
                var("FUNDAMENTALS_TRIM_PER_SIDE"),
                defaults.valuation.trim_per_side,
            ),
            keep_non_positive: parse_or_warn(
                "FUNDAMENTALS_KEEP_NON_POSITIVE",
                var("FUNDAMENTALS_KEEP_NON_POSITIVE"),
                defaults.valuation.keep_non_positive,
            ),
            extrapolate: parse_or_warn(
                "FUNDAMENTALS_EXTRAPOLATE",
                var("FUNDAMENTALS_EXTRAPOLATE"),
                defaults.valuation.extrapolate,
            ),
        };

        let valuation_metric = match var("FUNDAMENTALS_VALUATION_METRIC") {
            Some(name) => ValuationMetric::standard(name.trim()).unwrap_or_else(|| {
                tracing::warn!("Unknown valuation metric {}, using {}", name, defaults.valuation_metric.name);
                defaults.valuation_metric.clone()
            }),
            None => defaults.valuation_metric.clone(),
        };

        Self {
            start_date,
            coercion,
            rating,
            debug_ratings: parse_or_warn(
                "FUNDAMENTALS_DEBUG_RATINGS",
                var("FUNDAMENTALS_DEBUG_RATINGS"),
                defaults.debug_ratings,
            ),
            valuation,
            valuation_metric,
            indicators: defaults.indicators,
        }
    }

    pub fn validate(&self) -> AnalysisResult<()> {
        self.rating.weights.validate()?;
        if self.rating.trend_window == 0 {
            return Err(AnalysisError::InvalidConfig("trend window must be at least one year".to_string()));
        }
        self.indicators.validate()
    }
}
