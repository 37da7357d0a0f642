//! End-to-end tests: upload, list, summarize, predict and alert

use hmpi_core::alerts::{DispatchStatus, Notifier};
use hmpi_core::{
    assess_samples, compute_summary, dispatch, predict_hotspots, render_json, upload_and_calculate,
    upload_and_calculate_with, AlertConfig, Channel, IngestError, RiskCategory, SourceFormat, Store,
};
use std::cell::Cell;
use tempfile::TempDir;

const CSV: &str = "latitude,longitude,arsenic,cadmium,lead,zinc\n\
                   28.7,77.1,15.0,4.0,12.0,5500\n\
                   19.0,72.8,5.0,1.0,4.0,2000";

const JSON: &str = r#"
[
    {
        "latitude": 28.7, "longitude": 77.1,
        "arsenic": 15.0, "cadmium": 4.0, "lead": 12.0, "zinc": 5500
    }
]
"#;

#[derive(Default)]
struct CountingNotifier {
    calls: Cell<usize>,
}

impl Notifier for CountingNotifier {
    fn deliver(&self, _: Channel, _: &[String], _: &str) -> anyhow::Result<()> {
        self.calls.set(self.calls.get() + 1);
        Ok(())
    }
}

#[test]
fn test_upload_csv_success() {
    let mut store = Store::open_in_memory().unwrap();
    let stored = upload_and_calculate(&mut store, CSV.as_bytes(), SourceFormat::Csv).unwrap();

    let data: serde_json::Value = serde_json::from_str(&render_json(&stored)).unwrap();
    assert_eq!(data.as_array().unwrap().len(), 2);
    assert_eq!(data[0]["latitude"], 28.7);
    assert_eq!(data[0]["result"]["heavy_metal_pollution_index"], 133.95);
    assert_eq!(data[0]["result"]["hpi_category"], "Moderate pollution");
    assert_eq!(data[1]["result"]["hpi_category"], "Low pollution");
    assert_eq!(
        data[1]["result"]["cd_category"],
        "Moderate degree of contamination"
    );
}

#[test]
fn test_upload_json_success() {
    let mut store = Store::open_in_memory().unwrap();
    let stored = upload_and_calculate(&mut store, JSON.as_bytes(), SourceFormat::Json).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].result.hpi_category.as_str(), "Moderate pollution");
    assert_eq!(stored[0].result.cd_category.as_str(), "High degree of contamination");
}

#[test]
fn test_upload_missing_column_error() {
    let mut store = Store::open_in_memory().unwrap();
    let csv = "latitude,longitude,arsenic,cadmium,lead\n28.7,77.1,15.0,4.0,12.0";
    let err = upload_and_calculate(&mut store, csv.as_bytes(), SourceFormat::Csv).unwrap_err();
    assert!(err.to_string().contains("Missing required columns"));
    assert!(store.list_samples().unwrap().is_empty());
}

#[test]
fn test_upload_unsupported_file_type() {
    let err = SourceFormat::from_content_type("text/plain").unwrap_err();
    assert!(matches!(err, IngestError::UnsupportedFormat(_)));
    assert!(err.to_string().contains("Unsupported file type"));
}

#[test]
fn test_upload_rejects_batch_with_bad_coordinates() {
    let mut store = Store::open_in_memory().unwrap();
    let csv = "latitude,longitude,arsenic,cadmium,lead,zinc\n\
               28.7,77.1,15.0,4.0,12.0,5500\n\
               ,72.8,5.0,1.0,4.0,2000";
    let err = upload_and_calculate(&mut store, csv.as_bytes(), SourceFormat::Csv).unwrap_err();
    let ingest = err.downcast_ref::<IngestError>().unwrap();
    assert!(matches!(ingest, IngestError::InvalidCoordinates { row: 1 }));
    assert!(store.list_samples().unwrap().is_empty());
}

#[test]
fn test_datasets_and_summary_after_uploads() {
    let temp = TempDir::new().unwrap();
    let db = temp.path().join("water_quality.db");

    {
        let mut store = Store::open(&db).unwrap();
        upload_and_calculate(&mut store, CSV.as_bytes(), SourceFormat::Csv).unwrap();
    }
    let mut store = Store::open(&db).unwrap();
    upload_and_calculate(&mut store, JSON.as_bytes(), SourceFormat::Json).unwrap();

    let samples = store.list_samples().unwrap();
    assert_eq!(samples.iter().map(|s| s.id).collect::<Vec<_>>(), vec![1, 2, 3]);

    let summary = compute_summary(&samples);
    assert_eq!(summary.count, 3);
    // (133.95 + 37.71 + 133.95) / 3
    assert!((summary.avg_hpi - 101.87).abs() < 1e-9);
    assert_eq!(summary.hpi_categories.get("Moderate pollution"), Some(&2));
}

#[test]
fn test_predict_hotspots_skips_malformed_rows() {
    let csv = "latitude,longitude,arsenic,cadmium,lead,zinc\n\
               28.7,77.1,15.0,4.0,12.0,5500\n\
               unknown,72.8,5.0,1.0,4.0,2000\n\
               19.0,72.8,0,0,0,0";
    let predictions = predict_hotspots(csv.as_bytes(), SourceFormat::Csv).unwrap();
    assert_eq!(predictions.len(), 2);
    assert_eq!(predictions[0].risk_score, 0.571);
    assert_eq!(predictions[0].risk_category, RiskCategory::Moderate);
    assert_eq!(predictions[1].risk_score, 0.0);
    assert_eq!(predictions[1].risk_category, RiskCategory::Low);
}

/// `rows` data rows of the moderate sample, with one row replaced
fn long_csv(rows: usize, at: usize, line: &str) -> String {
    let mut csv = String::from("latitude,longitude,arsenic,cadmium,lead,zinc\n");
    for row in 0..rows {
        if row == at {
            csv.push_str(line);
        } else {
            csv.push_str(&format!("{},77,15,4,12,5500", row));
        }
        csv.push('\n');
    }
    csv
}

#[test]
fn test_predict_hotspots_skips_bad_coordinate_late_in_file() {
    let csv = long_csv(200, 150, "north,77,15,4,12,5500");
    let predictions = predict_hotspots(csv.as_bytes(), SourceFormat::Csv).unwrap();
    assert_eq!(predictions.len(), 199);
    assert_eq!(predictions[149].latitude, 149.0);
    assert_eq!(predictions[150].latitude, 151.0);
}

#[test]
fn test_predict_hotspots_mixed_int_and_float_column() {
    let csv = long_csv(200, 150, "150,77,15,4,12,2000.5");
    let predictions = predict_hotspots(csv.as_bytes(), SourceFormat::Csv).unwrap();
    assert_eq!(predictions.len(), 200);
    assert!(predictions.iter().all(|p| p.risk_score > 0.0));
}

#[test]
fn test_upload_mixed_int_and_float_column() {
    let mut store = Store::open_in_memory().unwrap();
    let csv = long_csv(200, 150, "150,77,15,4,12,2000.5");
    let stored = upload_and_calculate(&mut store, csv.as_bytes(), SourceFormat::Csv).unwrap();
    assert_eq!(stored.len(), 200);
    assert_eq!(stored[150].sample.concentrations.zinc, Some(2000.5));
}

#[test]
fn test_upload_with_custom_assessor() {
    let mut store = Store::open_in_memory().unwrap();
    let seen = Cell::new(0);
    let stored = upload_and_calculate_with(&mut store, CSV.as_bytes(), SourceFormat::Csv, |samples| {
        seen.set(samples.len());
        assess_samples(samples)
    })
    .unwrap();
    assert_eq!(seen.get(), 2);
    assert_eq!(stored.len(), 2);
    assert_eq!(store.list_samples().unwrap(), stored);
}

#[test]
fn test_upload_rejects_assessor_dropping_samples() {
    let mut store = Store::open_in_memory().unwrap();
    let result = upload_and_calculate_with(&mut store, CSV.as_bytes(), SourceFormat::Csv, |samples| {
        assess_samples(&samples[..1])
    });
    assert!(result.is_err());
    assert!(store.list_samples().unwrap().is_empty());
}

#[test]
fn test_predict_hotspots_missing_column() {
    let csv = "latitude,longitude,arsenic\n28.7,77.1,15.0";
    let err = predict_hotspots(csv.as_bytes(), SourceFormat::Csv).unwrap_err();
    assert!(err.to_string().contains("cadmium, lead, zinc"));
}

#[test]
fn test_alert_flow_with_saved_config() {
    let mut store = Store::open_in_memory().unwrap();
    upload_and_calculate(&mut store, CSV.as_bytes(), SourceFormat::Csv).unwrap();

    let config = AlertConfig {
        email_recipients: vec!["ops@example.org".into()],
        ..AlertConfig::default()
    };
    store.save_alert_config(&config).unwrap();
    let config = store.alert_config(&AlertConfig::default()).unwrap();

    let notifier = CountingNotifier::default();
    let samples = store.list_samples().unwrap();

    let email = dispatch(&config, Channel::Email, "Water quality alert", &samples, &notifier).unwrap();
    assert_eq!(email.status, DispatchStatus::Sent);
    assert_eq!(email.to, "ops@example.org");
    assert_eq!(email.count, 1);

    let sms = dispatch(&config, Channel::Sms, "Water quality alert", &samples, &notifier).unwrap();
    assert_eq!(sms.status, DispatchStatus::NoRecipients);

    assert_eq!(notifier.calls.get(), 1);
}
