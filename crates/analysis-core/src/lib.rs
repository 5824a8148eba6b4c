pub mod error;
pub mod growth;
pub mod parse;
pub mod per_share;
pub mod range;
pub mod rating;
pub mod series;
pub mod stats;
pub mod types;

pub use error::*;
pub use growth::window_growth;
pub use parse::{
    format_timestamp, parse_or_default, parse_timestamp, CoercionPolicy, Coerced, ESTIMATE_PERIOD_FORMAT,
    FISCAL_YEAR_FORMAT, TTM_MARKER,
};
pub use range::RangeInfo;
pub use rating::{RatingBreakdown, RatingParams, RatingWeights};
pub use series::{divide_series, sum_series, MetricSeries, SeriesOptions};
pub use types::*;
