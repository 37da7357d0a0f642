//! Tabular sample ingestion (CSV and JSON)
//!
//! Uploaded bytes are parsed into a DataFrame, the required column set is
//! validated, and every row becomes a [`SampleRecord`]. Schema problems
//! reject the whole file; individual unparsable cells become unknown values.

use crate::sample::{Concentrations, Sample};
use polars::io::SerReader;
use polars::prelude::*;
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;

/// Columns every upload must contain
pub const REQUIRED_COLUMNS: [&str; 6] = ["latitude", "longitude", "arsenic", "cadmium", "lead", "zinc"];

/// Batch-level ingestion failures
#[derive(Debug, Error)]
pub enum IngestError {
    /// File type other than CSV or JSON
    #[error("Unsupported file type: {0}. Please upload a CSV or JSON file.")]
    UnsupportedFormat(String),

    /// The file could not be parsed as the declared format
    #[error("Error processing {format} file: {message}")]
    Parse {
        format: SourceFormat,
        message: String,
    },

    /// One or more required columns are absent
    #[error("Missing required columns: {}. Data must contain: {}", .0.join(", "), REQUIRED_COLUMNS.join(", "))]
    MissingColumns(Vec<String>),

    /// A row has no numeric latitude/longitude
    #[error("Row {row} has a missing or non-numeric latitude/longitude")]
    InvalidCoordinates { row: usize },
}

/// Supported upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Json,
}

impl SourceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Csv => "CSV",
            SourceFormat::Json => "JSON",
        }
    }

    /// Detect from a MIME content type
    pub fn from_content_type(content_type: &str) -> Result<Self, IngestError> {
        let essence = content_type.split(';').next().unwrap_or("").trim();
        match essence.to_ascii_lowercase().as_str() {
            "text/csv" => Ok(SourceFormat::Csv),
            "application/json" => Ok(SourceFormat::Json),
            _ => Err(IngestError::UnsupportedFormat(content_type.to_string())),
        }
    }

    /// Detect from a file extension
    pub fn from_path(path: &Path) -> Result<Self, IngestError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("csv") => Ok(SourceFormat::Csv),
            Some("json") => Ok(SourceFormat::Json),
            _ => Err(IngestError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One parsed input row, before coordinates are validated
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleRecord {
    /// Zero-based data row index in the source file
    pub row: usize,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub concentrations: Concentrations,
}

impl SampleRecord {
    pub fn new(
        row: usize,
        latitude: Option<f64>,
        longitude: Option<f64>,
        concentrations: Concentrations,
    ) -> Self {
        SampleRecord {
            row,
            latitude: latitude.filter(|v| v.is_finite()),
            longitude: longitude.filter(|v| v.is_finite()),
            concentrations,
        }
    }

    /// The sample, if both coordinates are numeric
    pub fn to_sample(&self) -> Option<Sample> {
        Some(Sample::new(self.latitude?, self.longitude?, self.concentrations))
    }
}

/// Parse `bytes` in `format` into ordered sample records
pub fn read_records(bytes: &[u8], format: SourceFormat) -> Result<Vec<SampleRecord>, IngestError> {
    let df = read_frame(bytes, format)?;
    records_from_frame(&df, format)
}

/// Parse and require numeric coordinates on every row
pub fn read_samples(bytes: &[u8], format: SourceFormat) -> Result<Vec<Sample>, IngestError> {
    read_records(bytes, format)?
        .into_iter()
        .map(|record| {
            record
                .to_sample()
                .ok_or(IngestError::InvalidCoordinates { row: record.row })
        })
        .collect()
}

fn read_frame(bytes: &[u8], format: SourceFormat) -> Result<DataFrame, IngestError> {
    let parse_error = |e: PolarsError| IngestError::Parse {
        format,
        message: e.to_string(),
    };
    match format {
        // All columns as text; cells are cast to f64 one by one in numeric_column
        SourceFormat::Csv => CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()
            .map_err(parse_error),
        SourceFormat::Json => polars::io::json::JsonReader::new(Cursor::new(bytes))
            .finish()
            .map_err(parse_error),
    }
}

fn records_from_frame(df: &DataFrame, format: SourceFormat) -> Result<Vec<SampleRecord>, IngestError> {
    // Header names may carry stray whitespace (common in exported sheets)
    let headers: Vec<(String, String)> = df
        .get_column_names()
        .into_iter()
        .map(|name| (name.trim().to_string(), name.to_string()))
        .collect();

    let mut missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|required| !headers.iter().any(|(trimmed, _)| trimmed == *required))
        .map(|s| s.to_string())
        .collect();
    if !missing.is_empty() {
        missing.sort();
        return Err(IngestError::MissingColumns(missing));
    }

    let column = |name: &str| -> Result<Vec<Option<f64>>, IngestError> {
        let original = headers
            .iter()
            .find(|(trimmed, _)| trimmed == name)
            .map(|(_, original)| original.as_str())
            .unwrap_or(name);
        numeric_column(df, original).map_err(|e| IngestError::Parse {
            format,
            message: format!("column {:?}: {}", name, e),
        })
    };

    let latitude = column("latitude")?;
    let longitude = column("longitude")?;
    let arsenic = column("arsenic")?;
    let cadmium = column("cadmium")?;
    let lead = column("lead")?;
    let zinc = column("zinc")?;

    Ok((0..df.height())
        .map(|row| {
            SampleRecord::new(
                row,
                latitude[row],
                longitude[row],
                Concentrations::new(arsenic[row], cadmium[row], lead[row], zinc[row]),
            )
        })
        .collect())
}

/// Cast a column to `f64`; cells that do not parse become `None`
fn numeric_column(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    let column = df.column(name)?;
    let column = if column.dtype() != &DataType::Float64 {
        column.cast(&DataType::Float64)?
    } else {
        column.clone()
    };
    let values = column.as_materialized_series().f64()?;
    Ok(values.into_iter().collect())
}
