use analysis_core::{
    divide_series, sum_series, AnalysisError, AnalysisResult, AnnualStatements, CoercionPolicy, MetricSeries,
    SeriesOptions,
};
use chrono::NaiveDate;

const BALANCE_SHEET: &str = "balance_sheet";
const INCOME_STATEMENT: &str = "income_statement";

const SHORT_TERM_DEBT: &str = "Short-Term Debt & Capital Lease Obligation";
const LONG_TERM_DEBT: &str = "Long-Term Debt & Capital Lease Obligation";
const CASH: &str = "Cash, Cash Equivalents, Marketable Securities";
const EBITDA: &str = "EBITDA";

/// Reads series out of one issuer's annual statements.
pub struct StatementReader<'a> {
    annuals: &'a AnnualStatements,
    start_date: NaiveDate,
    options: SeriesOptions,
    zero_fill: &'a [String],
}

impl<'a> StatementReader<'a> {
    pub fn new(
        annuals: &'a AnnualStatements,
        start_date: NaiveDate,
        coercion: CoercionPolicy,
        zero_fill: &'a [String],
    ) -> Self {
        Self {
            annuals,
            start_date,
            options: SeriesOptions::default().with_coercion(coercion),
            zero_fill,
        }
    }

    pub fn fiscal_years(&self) -> &[String] {
        &self.annuals.fiscal_years
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    /// True when `section/field` is absent and will be read as zeros.
    pub fn is_zero_filled(&self, section: &str, field: &str) -> bool {
        !self.annuals.has_field(section, field) && self.zero_fill.iter().any(|f| f == field)
    }

    /// The series of `section/field`. Absent fields on the zero-fill list
    /// come back as zeros over every fiscal year.
    pub fn metric(&self, section: &str, field: &str) -> AnalysisResult<MetricSeries> {
        self.metric_scaled(section, field, 1.0)
    }

    pub fn metric_scaled(&self, section: &str, field: &str, scale: f64) -> AnalysisResult<MetricSeries> {
        let options = self.options.clone().with_scale(scale);
        match self.annuals.field(section, field) {
            Ok(values) => MetricSeries::from_raw(field, self.fiscal_years(), values, self.start_date, &options),
            Err(AnalysisError::MissingField { .. }) | Err(AnalysisError::MissingSection(_))
                if self.zero_fill.iter().any(|f| f == field) =>
            {
                tracing::debug!("{}/{} not reported, zero-filling", section, field);
                MetricSeries::zero_filled(field, self.fiscal_years(), self.start_date, &options)
            }
            Err(e) => Err(e),
        }
    }
}

fn total_debt(reader: &StatementReader<'_>) -> AnalysisResult<MetricSeries> {
    let short = reader.metric(BALANCE_SHEET, SHORT_TERM_DEBT)?;
    let long = reader.metric(BALANCE_SHEET, LONG_TERM_DEBT)?;
    sum_series(&short, &long)
}

/// (short-term debt + long-term debt) / cash
pub fn debt_to_cash(name: &str, reader: &StatementReader<'_>) -> AnalysisResult<MetricSeries> {
    let debt = total_debt(reader)?;
    let cash = reader.metric(BALANCE_SHEET, CASH)?;
    Ok(divide_series(&debt, &cash)?.renamed(name))
}

/// (short-term debt + long-term debt) / EBITDA
pub fn debt_to_ebitda(name: &str, reader: &StatementReader<'_>) -> AnalysisResult<MetricSeries> {
    let debt = total_debt(reader)?;
    let ebitda = reader.metric(INCOME_STATEMENT, EBITDA)?;
    Ok(divide_series(&debt, &ebitda)?.renamed(name))
}
