use analysis_core::{AnalysisError, AnalysisResult, FinancialsPayload, MetricSeries, RatingBreakdown, ValueKind};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::config::{AnalysisConfig, CategoryConfig, MetricSource, MetricSpec};
use crate::derive::StatementReader;

/// A bare 0-1 score, or every component behind it when debugging.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Rating {
    Score(f64),
    Breakdown(RatingBreakdown),
}

impl Rating {
    pub fn score(&self) -> Option<f64> {
        match self {
            Rating::Score(score) => Some(*score),
            Rating::Breakdown(breakdown) => breakdown.score,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IndicatorRecord {
    #[serde(rename = "Series")]
    pub series: MetricSeries,
    #[serde(rename = "Current")]
    pub current: Option<f64>,
    #[serde(rename = "Type")]
    pub kind: ValueKind,
    #[serde(rename = "Rating")]
    pub rating: Option<Rating>,
    #[serde(rename = "Zero Filled", skip_serializing_if = "std::ops::Not::not")]
    pub zero_filled: bool,
}

impl IndicatorRecord {
    pub fn score(&self) -> Option<f64> {
        self.rating.as_ref().and_then(Rating::score)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryReport {
    pub name: String,
    /// In configuration order.
    pub indicators: Vec<(String, IndicatorRecord)>,
    pub average_rating: Option<f64>,
}

impl CategoryReport {
    pub fn indicator(&self, name: &str) -> Option<&IndicatorRecord> {
        self.indicators.iter().find(|(n, _)| n == name).map(|(_, r)| r)
    }
}

/// Indicators of one issuer across every configured category.
#[derive(Debug, Clone, Serialize)]
pub struct FundamentalIndicators {
    pub categories: Vec<CategoryReport>,
}

impl FundamentalIndicators {
    pub fn category(&self, name: &str) -> Option<&CategoryReport> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// `category -> metric -> {Series, Current, Type, Rating}` plus each
    /// category's `Average Rating`.
    pub fn to_json(&self) -> AnalysisResult<Value> {
        let mut root = Map::new();
        for category in &self.categories {
            let mut entries = Map::new();
            for (name, record) in &category.indicators {
                let value = serde_json::to_value(record).map_err(|e| AnalysisError::InvalidData(e.to_string()))?;
                entries.insert(name.clone(), value);
            }
            entries.insert("Average Rating".to_string(), json!(category.average_rating));
            root.insert(category.name.clone(), Value::Object(entries));
        }
        Ok(Value::Object(root))
    }
}

pub struct IndicatorAggregator<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> IndicatorAggregator<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn analyze(&self, payload: &FinancialsPayload) -> AnalysisResult<FundamentalIndicators> {
        let reader = StatementReader::new(
            payload.annuals(),
            self.config.start_date,
            self.config.coercion.clone(),
            &self.config.indicators.zero_fill_fields,
        );

        let categories = self
            .config
            .indicators
            .categories
            .iter()
            .map(|category| self.analyze_category(category, &reader))
            .collect::<AnalysisResult<Vec<_>>>()?;

        Ok(FundamentalIndicators { categories })
    }

    fn analyze_category(&self, category: &CategoryConfig, reader: &StatementReader<'_>) -> AnalysisResult<CategoryReport> {
        let mut indicators = Vec::with_capacity(category.metrics.len());
        for spec in &category.metrics {
            let record = self.build_record(spec, reader)?;
            indicators.push((spec.name.clone(), record));
        }

        let scores: Vec<f64> = indicators.iter().filter_map(|(_, r)| r.score()).collect();
        let average_rating = if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        };
        tracing::debug!(
            "{}: {} indicators, {} rated",
            category.name,
            indicators.len(),
            scores.len()
        );

        Ok(CategoryReport {
            name: category.name.clone(),
            indicators,
            average_rating,
        })
    }

    fn build_record(&self, spec: &MetricSpec, reader: &StatementReader<'_>) -> AnalysisResult<IndicatorRecord> {
        let (base, zero_filled) = match &spec.source {
            MetricSource::Field { section, field } => {
                let zero_filled = reader.is_zero_filled(section, field);
                (reader.metric(section, field)?, zero_filled)
            }
            MetricSource::Derived(derive) => (derive(&spec.name, reader)?, false),
        };

        let (series, current) = match spec.growth {
            Some(growth) => {
                let series = base
                    .growth_metric(growth.years, growth.log_scale)
                    .scaled(spec.scale)
                    .renamed(&spec.name);
                let current = series.ttm().filter(|v| v.is_finite());
                (series, current)
            }
            None => {
                let series = if spec.scale == 1.0 { base } else { base.scaled(spec.scale) };
                let current = series.latest_value();
                (series, current)
            }
        };

        let rating = if zero_filled {
            None
        } else if self.config.debug_ratings {
            Some(Rating::Breakdown(series.rating_breakdown(
                spec.benchmark,
                spec.reverse,
                &self.config.rating,
            )))
        } else {
            series
                .rating(spec.benchmark, spec.reverse, &self.config.rating)
                .map(Rating::Score)
        };

        Ok(IndicatorRecord {
            series,
            current,
            kind: spec.kind,
            rating,
            zero_filled,
        })
    }
}

/// Indicators of one issuer with the given configuration.
pub fn fundamental_indicators(payload: &FinancialsPayload, config: &AnalysisConfig) -> AnalysisResult<FundamentalIndicators> {
    IndicatorAggregator::new(config).analyze(payload)
}
