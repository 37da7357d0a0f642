//! Hotspot risk prediction
//!
//! Global invariants enforced:
//! - Risk score lies in [0, 1) for non-negative concentrations
//! - Monotonic in every concentration
//! - Unknown metals contribute a zero contamination factor
//! - Rows without numeric coordinates yield no prediction

use crate::indices::round_to;
use crate::ingest::SampleRecord;
use crate::sample::{Concentrations, Sample};
use crate::standards::Standards;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Risk band boundaries
pub const RISK_MODERATE: f64 = 0.33;
pub const RISK_HIGH: f64 = 0.66;

/// Largest score representable after rounding to three decimals
const MAX_RISK_SCORE: f64 = 0.999;

/// Risk band classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskCategory {
    #[serde(rename = "Low risk")]
    Low, // < 0.33
    #[serde(rename = "Moderate risk")]
    Moderate, // 0.33-0.66
    #[serde(rename = "High risk")]
    High, // >= 0.66
}

impl RiskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskCategory::Low => "Low risk",
            RiskCategory::Moderate => "Moderate risk",
            RiskCategory::High => "High risk",
        }
    }

    pub fn from_score(score: f64) -> Self {
        if score < RISK_MODERATE {
            RiskCategory::Low
        } else if score < RISK_HIGH {
            RiskCategory::Moderate
        } else {
            RiskCategory::High
        }
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Predicted risk for one location
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub latitude: f64,
    pub longitude: f64,
    pub risk_score: f64,
    pub risk_category: RiskCategory,
}

/// Risk predictor bound to a set of reference tables
#[derive(Debug, Clone, Copy)]
pub struct RiskPredictor<'a> {
    standards: &'a Standards,
}

impl<'a> RiskPredictor<'a> {
    pub fn new(standards: &'a Standards) -> Self {
        RiskPredictor { standards }
    }

    /// Linear risk = Σ w_i · CF_i, with CF_i = 0 for unknown metals
    pub fn linear_risk(&self, concentrations: &Concentrations) -> f64 {
        self.standards
            .risk_weights
            .iter()
            .map(|(metal, weight)| {
                let cf = concentrations
                    .get(metal)
                    .map_or(0.0, |c| c / self.standards.permissible.get(metal));
                weight * cf
            })
            .sum()
    }

    /// Score = 1 - 1 / (1 + linear risk), rounded to 3 decimals
    pub fn score(&self, concentrations: &Concentrations) -> (f64, RiskCategory) {
        // Negative readings are not physical; they must not push the score below zero.
        let linear = self.linear_risk(concentrations).max(0.0);
        let score = 1.0 - 1.0 / (1.0 + linear);
        let rounded = round_to(score, 3).min(MAX_RISK_SCORE);
        (rounded, RiskCategory::from_score(score))
    }

    pub fn predict(&self, sample: &Sample) -> PredictionResult {
        let (risk_score, risk_category) = self.score(&sample.concentrations);
        PredictionResult {
            latitude: sample.latitude,
            longitude: sample.longitude,
            risk_score,
            risk_category,
        }
    }

    /// Lazily predict a batch, skipping rows whose coordinates are not numeric
    pub fn predict_records(
        self,
        records: &'a [SampleRecord],
    ) -> impl Iterator<Item = PredictionResult> + 'a {
        records.iter().filter_map(move |record| match record.to_sample() {
            Some(sample) => Some(self.predict(&sample)),
            None => {
                tracing::debug!(row = record.row, "skipping row without numeric coordinates");
                None
            }
        })
    }
}

impl Default for RiskPredictor<'static> {
    fn default() -> Self {
        RiskPredictor::new(Standards::global())
    }
}

/// Predict risk with the standard tables
pub fn predict_risk(sample: &Sample) -> (f64, RiskCategory) {
    RiskPredictor::default().score(&sample.concentrations)
}
