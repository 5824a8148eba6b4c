use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::{AnalysisError, AnalysisResult, MetricSeries};

impl MetricSeries {
    /// Attach shares outstanding, enabling per-share projection. `shares`
    /// must have one entry per data point, or a single entry broadcast to all.
    pub fn with_shares(mut self, shares: Vec<f64>) -> AnalysisResult<Self> {
        if shares.len() != 1 && shares.len() != self.data.len() {
            return Err(AnalysisError::LengthMismatch {
                name: format!("{} shares outstanding", self.name),
                timestamps: self.data.len(),
                values: shares.len(),
            });
        }
        self.shares = Some(shares);
        Ok(self)
    }

    pub fn has_per_share(&self) -> bool {
        self.shares.is_some()
    }

    pub fn shares_outstanding(&self) -> Option<&[f64]> {
        self.shares.as_deref()
    }

    /// `value / shares` per data point; `None` without shares attached.
    /// Points with a zero share count have no per-share value and are left out.
    pub fn per_share_data(&self) -> Option<BTreeMap<NaiveDate, f64>> {
        let shares = self.shares.as_ref()?;
        let per_share = self
            .data
            .iter()
            .enumerate()
            .filter_map(|(i, (date, value))| {
                let count = if shares.len() == 1 { shares[0] } else { shares[i] };
                if count == 0.0 || !count.is_finite() {
                    tracing::debug!("No share count for {} at {}, skipping", self.name, date);
                    None
                } else {
                    Some((*date, value / count))
                }
            })
            .collect();
        Some(per_share)
    }
}
