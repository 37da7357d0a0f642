//! Aggregation views over stored results
//!
//! Global invariants enforced:
//! - Aggregates are strictly derived (never stored, always computed)
//! - Deterministic ordering (category maps are sorted by label)

use crate::indices::round_to;
use crate::report::StoredSample;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Dataset-wide summary of computed indices
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct IndexSummary {
    pub count: usize,
    pub avg_hpi: f64,
    pub avg_cd: f64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub hpi_categories: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub cd_categories: BTreeMap<String, usize>,
}

/// Compute the summary for a set of stored samples
///
/// Averages cover every stored result (including "No Data" rows, whose HPI
/// is stored as 0.0) and are rounded to 2 decimals.
pub fn compute_summary(samples: &[StoredSample]) -> IndexSummary {
    if samples.is_empty() {
        return IndexSummary::default();
    }

    let mut sum_hpi = 0.0;
    let mut sum_cd = 0.0;
    let mut hpi_categories: BTreeMap<String, usize> = BTreeMap::new();
    let mut cd_categories: BTreeMap<String, usize> = BTreeMap::new();

    for stored in samples {
        sum_hpi += stored.result.hpi_value;
        sum_cd += stored.result.cd_value;
        *hpi_categories
            .entry(stored.result.hpi_category.as_str().to_string())
            .or_insert(0) += 1;
        *cd_categories
            .entry(stored.result.cd_category.as_str().to_string())
            .or_insert(0) += 1;
    }

    let count = samples.len();
    IndexSummary {
        count,
        avg_hpi: round_to(sum_hpi / count as f64, 2),
        avg_cd: round_to(sum_cd / count as f64, 2),
        hpi_categories,
        cd_categories,
    }
}
