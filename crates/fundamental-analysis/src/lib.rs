pub mod batch;
pub mod config;
pub mod derive;
pub mod indicators;
pub mod returns;
pub mod valuation;

pub use batch::{analyze_batch, analyze_issuer, IssuerData, IssuerOutcome, IssuerReport};
pub use config::{
    AnalysisConfig, CategoryConfig, GrowthTransform, IndicatorConfig, MetricSource, MetricSpec, ValuationMetric,
    ValuationParams, BUSINESS_GROWTH, DIVIDEND_GROWTH, FINANCIAL_STRENGTH, PROFITABILITY, STOCK_VALUATION,
};
pub use derive::{debt_to_cash, debt_to_ebitda, StatementReader};
pub use indicators::{
    fundamental_indicators, CategoryReport, FundamentalIndicators, IndicatorAggregator, IndicatorRecord, Rating,
};
pub use returns::{estimated_return, reported_years, valuation_durations, valuation_window, ValuationWindow};
pub use valuation::{
    average_price_multiple, fiscal_year_end_month, normal_price, normal_price_series, valuation_ratios,
    AverageMultiple, NormalPriceEstimate, ValuationRatio,
};
