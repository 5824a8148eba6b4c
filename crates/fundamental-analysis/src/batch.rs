use analysis_core::{AnalysisError, AnalysisResult, AnalystEstimates, FinancialsPayload, QuoteHistory};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{AnalysisConfig, DIVIDEND_GROWTH};
use crate::indicators::{FundamentalIndicators, IndicatorAggregator};
use crate::returns::estimated_return;
use crate::valuation::{normal_price, NormalPriceEstimate};

const DIVIDEND_YIELD: &str = "Dividend Yield %";

/// Everything known about one issuer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssuerData {
    pub symbol: String,
    pub financials: FinancialsPayload,
    /// Monthly closes; without them no valuation is attempted.
    #[serde(default)]
    pub quotes: Option<QuoteHistory>,
    #[serde(default)]
    pub estimates: Option<AnalystEstimates>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuerReport {
    pub symbol: String,
    pub indicators: FundamentalIndicators,
    pub valuation: Option<NormalPriceEstimate>,
    /// Why the valuation failed; the indicators are still reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valuation_error: Option<AnalysisError>,
    /// Percent per year, dividends included.
    pub estimated_return: Option<f64>,
}

#[derive(Debug)]
pub struct IssuerOutcome {
    pub symbol: String,
    pub result: AnalysisResult<IssuerReport>,
}

pub fn analyze_issuer(issuer: &IssuerData, config: &AnalysisConfig) -> AnalysisResult<IssuerReport> {
    let indicators = IndicatorAggregator::new(config).analyze(&issuer.financials)?;

    let mut report = IssuerReport {
        symbol: issuer.symbol.clone(),
        indicators,
        valuation: None,
        valuation_error: None,
        estimated_return: None,
    };
    let Some(quotes) = &issuer.quotes else {
        return Ok(report);
    };

    match normal_price(
        &issuer.financials,
        quotes,
        issuer.estimates.as_ref(),
        &config.valuation_metric,
        config,
    ) {
        Ok(valuation) => {
            let dividend_yield = report
                .indicators
                .category(DIVIDEND_GROWTH)
                .and_then(|c| c.indicator(DIVIDEND_YIELD))
                .and_then(|r| r.current)
                .map_or(0.0, |pct| pct / 100.0);
            report.estimated_return = estimated_return(quotes, &valuation.normal_prices, dividend_yield);
            report.valuation = Some(valuation);
        }
        Err(e) => {
            tracing::warn!("Valuation failed for {}: {}", issuer.symbol, e);
            report.valuation_error = Some(e);
        }
    }
    Ok(report)
}

/// Analyzes issuers in parallel. Outcomes keep the input order; a failing
/// issuer is logged and reported without affecting the rest.
pub fn analyze_batch(issuers: &[IssuerData], config: &AnalysisConfig) -> Vec<IssuerOutcome> {
    tracing::info!("Analyzing {} issuers", issuers.len());
    issuers
        .par_iter()
        .map(|issuer| {
            let result = analyze_issuer(issuer, config);
            if let Err(e) = &result {
                tracing::warn!("Analysis failed for {}: {}", issuer.symbol, e);
            }
            IssuerOutcome {
                symbol: issuer.symbol.clone(),
                result,
            }
        })
        .collect()
}
