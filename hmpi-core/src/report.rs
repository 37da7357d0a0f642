//! Result records and output rendering
//!
//! Global invariants enforced:
//! - Output order equals input order (stored samples: id ascending)
//! - Byte-for-byte identical output across runs

use crate::aggregates::IndexSummary;
use crate::alerts::AlertDispatch;
use crate::indices::IndexResult;
use crate::prediction::PredictionResult;
use crate::sample::{Metal, Sample};
use serde::{Deserialize, Serialize};

/// A sample together with its computed indices
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssessedSample {
    #[serde(flatten)]
    pub sample: Sample,
    pub result: IndexResult,
}

/// A persisted sample with its database id
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoredSample {
    pub id: i64,
    #[serde(flatten)]
    pub sample: Sample,
    pub result: IndexResult,
}

/// Render stored samples as a text table
pub fn render_samples_text(samples: &[StoredSample]) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "{:<6} {:<10} {:<10} {:<8} {:<8} {:<8} {:<8} {:<9} {:<20} {:<7} {}\n",
        "ID", "LAT", "LON", "AS", "CD", "PB", "ZN", "HPI", "HPI CATEGORY", "CD", "CD CATEGORY"
    ));

    for stored in samples {
        let c = &stored.sample.concentrations;
        output.push_str(&format!(
            "{:<6} {:<10.4} {:<10.4} {:<8} {:<8} {:<8} {:<8} {:<9.2} {:<20} {:<7.2} {}\n",
            stored.id,
            stored.sample.latitude,
            stored.sample.longitude,
            format_concentration(c.get(Metal::Arsenic)),
            format_concentration(c.get(Metal::Cadmium)),
            format_concentration(c.get(Metal::Lead)),
            format_concentration(c.get(Metal::Zinc)),
            stored.result.hpi_value,
            truncate_or_pad(stored.result.hpi_category.as_str(), 20),
            stored.result.cd_value,
            stored.result.cd_category,
        ));
    }

    output
}

/// Render predictions as a text table
pub fn render_predictions_text(predictions: &[PredictionResult]) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "{:<10} {:<10} {:<6} {}\n",
        "LAT", "LON", "RISK", "CATEGORY"
    ));
    for p in predictions {
        output.push_str(&format!(
            "{:<10.4} {:<10.4} {:<6.3} {}\n",
            p.latitude, p.longitude, p.risk_score, p.risk_category
        ));
    }
    output
}

/// Render an index summary
pub fn render_summary_text(summary: &IndexSummary) -> String {
    let mut output = String::new();
    output.push_str(&format!("Count:   {}\n", summary.count));
    output.push_str(&format!("Avg HPI: {:.2}\n", summary.avg_hpi));
    output.push_str(&format!("Avg Cd:  {:.2}\n", summary.avg_cd));

    if !summary.hpi_categories.is_empty() {
        output.push_str("\nHPI categories:\n");
        for (category, count) in &summary.hpi_categories {
            output.push_str(&format!("  {:<34} {}\n", category, count));
        }
    }
    if !summary.cd_categories.is_empty() {
        output.push_str("\nCd categories:\n");
        for (category, count) in &summary.cd_categories {
            output.push_str(&format!("  {:<34} {}\n", category, count));
        }
    }
    output
}

/// Render the outcome of an alert dispatch
pub fn render_dispatch_text(dispatch: &AlertDispatch) -> String {
    format!(
        "{} via {}, recipients: {}, hotspots: {}\n",
        dispatch.status, dispatch.channel, dispatch.to, dispatch.count
    )
}

/// Render any serializable value as pretty JSON
pub fn render_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string())
}

fn format_concentration(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{}", v))
}

/// Truncate or pad string to fixed width
fn truncate_or_pad(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let kept: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        format!("{:<width$}", s, width = width)
    }
}
