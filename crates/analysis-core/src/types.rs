use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{AnalysisError, AnalysisResult};

/// Monthly closing prices keyed by month.
pub type QuoteHistory = BTreeMap<NaiveDate, f64>;

/// Annual statements: `section -> metric -> values`, each list aligned with
/// `fiscal_years` (the last entry is usually the `TTM` marker).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnnualStatements {
    #[serde(rename = "Fiscal Year")]
    pub fiscal_years: Vec<String>,
    #[serde(flatten)]
    pub sections: BTreeMap<String, Value>,
}

impl AnnualStatements {
    pub fn new(fiscal_years: Vec<String>) -> Self {
        Self {
            fiscal_years,
            sections: BTreeMap::new(),
        }
    }

    /// Builder used by fixtures and adapters: sets `section/field` to `values`.
    pub fn with_field(mut self, section: &str, field: &str, values: Vec<Value>) -> Self {
        let entry = self
            .sections
            .entry(section.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        if let Value::Object(map) = entry {
            map.insert(field.to_string(), Value::Array(values));
        }
        self
    }

    pub fn has_field(&self, section: &str, field: &str) -> bool {
        self.field(section, field).is_ok()
    }

    /// Raw values of `section/field`.
    pub fn field(&self, section: &str, field: &str) -> AnalysisResult<&[Value]> {
        let section_map = self
            .sections
            .get(section)
            .and_then(Value::as_object)
            .ok_or_else(|| AnalysisError::MissingSection(section.to_string()))?;
        let values = section_map.get(field).ok_or_else(|| AnalysisError::MissingField {
            section: section.to_string(),
            field: field.to_string(),
        })?;
        values
            .as_array()
            .map(Vec::as_slice)
            .ok_or_else(|| AnalysisError::InvalidData(format!("{section}/{field} is not a list")))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinancialsBody {
    pub annuals: AnnualStatements,
}

/// Financial statement history as delivered by the data collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinancialsPayload {
    pub financials: FinancialsBody,
}

impl FinancialsPayload {
    pub fn from_annuals(annuals: AnnualStatements) -> Self {
        Self {
            financials: FinancialsBody { annuals },
        }
    }

    pub fn annuals(&self) -> &AnnualStatements {
        &self.financials.annuals
    }
}

/// Forward estimates: `field -> values`, aligned with `date` (`%Y%m`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EstimateTable {
    pub date: Vec<String>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl EstimateTable {
    pub fn field(&self, name: &str) -> AnalysisResult<&[Value]> {
        let values = self.fields.get(name).ok_or_else(|| AnalysisError::MissingField {
            section: "annual".to_string(),
            field: name.to_string(),
        })?;
        values
            .as_array()
            .map(Vec::as_slice)
            .ok_or_else(|| AnalysisError::InvalidData(format!("estimate field {name} is not a list")))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalystEstimates {
    pub annual: EstimateTable,
}

/// How an indicator's value should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    Ratio,
    Percentage,
    Score,
    PerShare,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_financials_payload() {
        let payload: FinancialsPayload = serde_json::from_value(json!({
            "financials": {
                "annuals": {
                    "Fiscal Year": ["2019-12", "2020-12", "TTM"],
                    "income_statement": { "Revenue": ["10", "12", "13"] },
                    "Preliminary": [0, 0, 1]
                }
            }
        }))
        .unwrap();
        let annuals = payload.annuals();
        assert_eq!(annuals.fiscal_years.len(), 3);
        assert_eq!(annuals.field("income_statement", "Revenue").unwrap().len(), 3);
        assert!(matches!(
            annuals.field("income_statement", "EBITDA"),
            Err(AnalysisError::MissingField { .. })
        ));
        assert!(matches!(
            annuals.field("balance_sheet", "Cash"),
            Err(AnalysisError::MissingSection(_))
        ));
        assert!(matches!(annuals.field("Preliminary", "x"), Err(AnalysisError::MissingSection(_))));
    }

    #[test]
    fn test_deserialize_estimates() {
        let estimates: AnalystEstimates = serde_json::from_value(json!({
            "annual": { "date": ["202112", "202212"], "per_share_eps_estimate": [5.1, 5.6] }
        }))
        .unwrap();
        assert_eq!(estimates.annual.field("per_share_eps_estimate").unwrap().len(), 2);
        assert!(estimates.annual.field("ebit_estimate").is_err());
    }

    #[test]
    fn test_with_field_builder() {
        let annuals = AnnualStatements::new(vec!["2020-12".into()])
            .with_field("balance_sheet", "Cash", vec![json!(1)])
            .with_field("balance_sheet", "Debt", vec![json!(2)]);
        assert!(annuals.has_field("balance_sheet", "Cash"));
        assert!(annuals.has_field("balance_sheet", "Debt"));
    }
}
