//! hmpi core library - heavy metal pollution indices and hotspot risk for water samples

// Global invariants enforced in this crate:
// - Index and risk calculations are pure, per-sample functions
// - No global mutable state (reference tables are immutable once built)
// - Batch results keep input order, even when computed in parallel
// - Identical input yields byte-for-byte identical output

pub mod aggregates;
pub mod alerts;
pub mod config;
pub mod indices;
pub mod ingest;
pub mod prediction;
pub mod report;
pub mod sample;
pub mod standards;
pub mod store;

pub use aggregates::{compute_summary, IndexSummary};
pub use alerts::{dispatch, AlertConfig, AlertDispatch, Channel, LogNotifier, Notifier};
pub use config::ResolvedConfig;
pub use indices::{calculate_indices, CdCategory, HpiCategory, IndexResult};
pub use ingest::{IngestError, SourceFormat};
pub use prediction::{PredictionResult, RiskCategory, RiskPredictor};
pub use report::{render_json, AssessedSample, StoredSample};
pub use sample::{Concentrations, Metal, Sample};
pub use standards::Standards;
pub use store::Store;

use anyhow::{Context, Result};
use indices::IndexCalculator;
use rayon::prelude::*;

/// Compute HPI and Cd for one sample with the standard tables
pub fn assess(sample: &Sample) -> AssessedSample {
    AssessedSample {
        sample: *sample,
        result: IndexCalculator::default().evaluate(sample),
    }
}

/// Assess a batch in parallel; output order equals input order
pub fn assess_samples(samples: &[Sample]) -> Vec<AssessedSample> {
    samples.par_iter().map(assess).collect()
}

/// Parse an upload, compute indices for every row and persist the batch
///
/// Any ingestion failure (format, schema, coordinates) rejects the whole
/// upload before anything is written.
pub fn upload_and_calculate(
    store: &mut Store,
    bytes: &[u8],
    format: SourceFormat,
) -> Result<Vec<StoredSample>> {
    upload_and_calculate_with(store, bytes, format, assess_samples)
}

/// [`upload_and_calculate`] with a caller-supplied batch assessor
///
/// `assess_batch` must return one result per sample, in input order.
pub fn upload_and_calculate_with<F>(
    store: &mut Store,
    bytes: &[u8],
    format: SourceFormat,
    assess_batch: F,
) -> Result<Vec<StoredSample>>
where
    F: FnOnce(&[Sample]) -> Vec<AssessedSample>,
{
    let samples = ingest::read_samples(bytes, format)?;
    let assessed = assess_batch(&samples);
    anyhow::ensure!(
        assessed.len() == samples.len(),
        "assessed {} of {} samples",
        assessed.len(),
        samples.len()
    );
    let stored = store
        .insert_assessed(&assessed)
        .context("failed to store assessed samples")?;
    tracing::info!(format = %format, count = stored.len(), "uploaded samples");
    Ok(stored)
}

/// Predict hotspot risk for an upload without persisting anything
///
/// Rows without numeric coordinates are skipped.
pub fn predict_hotspots(bytes: &[u8], format: SourceFormat) -> Result<Vec<PredictionResult>> {
    let records = ingest::read_records(bytes, format)?;
    let predictions: Vec<PredictionResult> =
        RiskPredictor::default().predict_records(&records).collect();
    let skipped = records.len() - predictions.len();
    if skipped > 0 {
        tracing::warn!(skipped, "skipped rows without numeric coordinates");
    }
    tracing::info!(format = %format, count = predictions.len(), "predicted hotspot risk");
    Ok(predictions)
}
