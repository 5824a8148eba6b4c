use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum AnalysisError {
    #[error("Length mismatch for {name}: {timestamps} timestamps vs {values} values")]
    LengthMismatch {
        name: String,
        timestamps: usize,
        values: usize,
    },

    #[error("Timestamp sets differ between '{left}' and '{right}'")]
    TimestampMismatch { left: String, right: String },

    #[error("Invalid timestamp '{value}' for format '{format}'")]
    InvalidTimestamp { value: String, format: String },

    #[error("Non-numeric value for {name}: {raw}")]
    NonNumeric { name: String, raw: String },

    #[error("Missing field '{field}' in section '{section}'")]
    MissingField { section: String, field: String },

    #[error("Missing section: {0}")]
    MissingSection(String),

    #[error("Fiscal year end month changes: {first} has month {expected}, {found_at} has month {found}")]
    FiscalYearEndMismatch {
        first: NaiveDate,
        expected: u32,
        found_at: NaiveDate,
        found: u32,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;
