pub mod reports;
pub mod sqlite;

use crate::domain::model::{Record, TransformResult};
use crate::utils::error::Result;
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use zip::write::{SimpleFileOptions, ZipWriter};

/// Run summary written alongside the data inside the output bundle.
#[derive(Debug, Serialize)]
pub struct LoadMetadata {
    pub record_count: usize,
    pub column_count: usize,
    pub degraded: bool,
    pub generated_at: String,
}

impl LoadMetadata {
    pub fn for_result(result: &TransformResult) -> Self {
        Self {
            record_count: result.records.len(),
            column_count: result.columns.len(),
            degraded: result.degraded,
            generated_at: chrono::Local::now()
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
        }
    }
}

fn render_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Render records as CSV over a fixed column schema. Missing fields and
/// nulls become empty cells.
pub fn records_to_csv(records: &[Record], columns: &[String]) -> Result<Vec<u8>> {
    if columns.is_empty() {
        return Ok(Vec::new());
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(columns)?;

    for record in records {
        let row: Vec<String> = columns
            .iter()
            .map(|column| render_cell(record.data.get(column)))
            .collect();
        writer.write_record(&row)?;
    }

    writer
        .into_inner()
        .map_err(|e| crate::utils::error::EtlError::ProcessingError {
            message: format!("CSV buffer flush failed: {e}"),
        })
}

/// Pretty-printed JSON array with deterministic key order per object.
pub fn records_to_json(records: &[Record], columns: &[String]) -> Result<Vec<u8>> {
    let objects: Vec<serde_json::Map<String, Value>> = records
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|column| {
                    let value = record.data.get(column).cloned().unwrap_or(Value::Null);
                    (column.clone(), value)
                })
                .collect()
        })
        .collect();

    Ok(serde_json::to_vec_pretty(&objects)?)
}

/// Bundle CSV, JSON and run metadata into a single in-memory ZIP archive.
pub fn build_zip_bundle(result: &TransformResult) -> Result<Vec<u8>> {
    let csv_data = records_to_csv(&result.records, &result.columns)?;
    let json_data = records_to_json(&result.records, &result.columns)?;
    let metadata = serde_json::to_vec_pretty(&LoadMetadata::for_result(result))?;

    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    zip.start_file("processed.csv", options)?;
    zip.write_all(&csv_data)?;

    zip.start_file("processed.json", options)?;
    zip.write_all(&json_data)?;

    zip.start_file("metadata.json", options)?;
    zip.write_all(&metadata)?;

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}
