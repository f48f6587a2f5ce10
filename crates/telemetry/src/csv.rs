//! CSV import/export for telemetry files.
//!
//! Column layout matches the plant export:
//! `Timestamp, Water_Pressure_psi, Pump_Vibration_mms, Weather_Context,
//! Network_Latency_ms, Ground_Truth_State`. Columns without a dedicated
//! record field are kept as `extra` entries under their snake_case name.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, StringArray};
use arrow::csv::reader::Format;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use tracing::{debug, info};

use glassbox_core::{format_timestamp, parse_timestamp, DetectionRule, TelemetryRecord};

use crate::store::{StoreError, TelemetryStore};

pub const COL_TIMESTAMP: &str = "Timestamp";
pub const COL_PRESSURE: &str = "Water_Pressure_psi";
pub const COL_VIBRATION: &str = "Pump_Vibration_mms";
pub const COL_CONTEXT: &str = "Weather_Context";
pub const COL_LATENCY: &str = "Network_Latency_ms";

/// Header aliases used by the older dashboard export.
const ALIASES: &[(&str, &str)] = &[
    ("Time", COL_TIMESTAMP),
    ("Pump_Vibration_mm_s", COL_VIBRATION),
    ("External_Context", COL_CONTEXT),
];

fn canonical(name: &str) -> &str {
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map_or(name, |(_, canon)| canon)
}

/// `Ground_Truth_State` → `ground_truth_state`.
fn extra_key(column: &str) -> String {
    column.trim().to_ascii_lowercase().replace([' ', '-'], "_")
}

/// Inverse of [`extra_key`] for export.
fn extra_header(key: &str) -> String {
    key.split('_')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("_")
}

/// Read a telemetry CSV into records, in file order.
pub fn read_records(path: &Path) -> Result<Vec<TelemetryRecord>, CsvError> {
    let mut file = File::open(path)?;
    let (inferred, _) = Format::default().with_header(true).infer_schema(&mut file, Some(1))?;
    file.seek(SeekFrom::Start(0))?;

    // Every column is read as text and parsed here, so a blank latency
    // cell never trips arrow's type inference.
    let schema = Arc::new(Schema::new(
        inferred
            .fields()
            .iter()
            .map(|f| Field::new(f.name(), DataType::Utf8, true))
            .collect::<Vec<_>>(),
    ));

    let reader = ReaderBuilder::new(schema).with_header(true).build(file)?;

    let mut records = Vec::new();
    for batch in reader {
        let batch = batch?;
        let schema = batch.schema();
        let columns: Vec<(&str, &StringArray)> = schema
            .fields()
            .iter()
            .enumerate()
            .filter_map(|(i, field)| {
                batch
                    .column(i)
                    .as_any()
                    .downcast_ref::<StringArray>()
                    .map(|arr| (canonical(field.name()), arr))
            })
            .collect();

        for row in 0..batch.num_rows() {
            let line = records.len() + 1;
            records.push(parse_row(&columns, row, line)?);
        }
    }

    info!(path = %path.display(), records = records.len(), "imported telemetry CSV");
    Ok(records)
}

/// Read a CSV straight into a store.
pub fn load_store(path: &Path, rule: DetectionRule) -> Result<TelemetryStore, CsvError> {
    let records = read_records(path)?;
    Ok(TelemetryStore::new(records, rule)?)
}

fn cell<'a>(columns: &[(&str, &'a StringArray)], name: &str, row: usize) -> Option<&'a str> {
    columns
        .iter()
        .find(|(col, _)| *col == name)
        .and_then(|(_, arr)| (!arr.is_null(row)).then(|| arr.value(row).trim()))
        .filter(|v| !v.is_empty())
}

fn parse_row(
    columns: &[(&str, &StringArray)],
    row: usize,
    line: usize,
) -> Result<TelemetryRecord, CsvError> {
    let required = |name: &'static str| {
        cell(columns, name, row).ok_or(CsvError::MissingValue { row: line, column: name })
    };
    let number = |name: &'static str, raw: &str| {
        raw.parse::<f64>().map_err(|_| CsvError::InvalidValue {
            row: line,
            column: name,
            value: raw.to_string(),
        })
    };

    let raw_ts = required(COL_TIMESTAMP)?;
    let timestamp = parse_timestamp(raw_ts).map_err(|_| CsvError::InvalidValue {
        row: line,
        column: COL_TIMESTAMP,
        value: raw_ts.to_string(),
    })?;
    let pressure = number(COL_PRESSURE, required(COL_PRESSURE)?)?;
    let vibration = number(COL_VIBRATION, required(COL_VIBRATION)?)?;
    let context = cell(columns, COL_CONTEXT, row).unwrap_or_default();
    let latency = cell(columns, COL_LATENCY, row)
        .map(|raw| number(COL_LATENCY, raw))
        .transpose()?;

    let mut record = TelemetryRecord::new(timestamp, pressure, vibration, context, latency);
    for (name, arr) in columns {
        if matches!(
            *name,
            COL_TIMESTAMP | COL_PRESSURE | COL_VIBRATION | COL_CONTEXT | COL_LATENCY
        ) || arr.is_null(row)
        {
            continue;
        }
        record.extra.insert(extra_key(name), arr.value(row).trim().to_string());
    }
    Ok(record)
}

/// Write records in the canonical column layout.
pub fn write_records(path: &Path, records: &[TelemetryRecord]) -> Result<(), CsvError> {
    let extra_keys: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.extra.keys().map(String::as_str))
        .collect();

    let mut fields = vec![
        Field::new(COL_TIMESTAMP, DataType::Utf8, false),
        Field::new(COL_PRESSURE, DataType::Float64, false),
        Field::new(COL_VIBRATION, DataType::Float64, false),
        Field::new(COL_CONTEXT, DataType::Utf8, false),
        Field::new(COL_LATENCY, DataType::Float64, true),
    ];
    let mut arrays: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| format_timestamp(&r.timestamp)),
        )),
        Arc::new(Float64Array::from_iter_values(records.iter().map(|r| r.pressure_psi))),
        Arc::new(Float64Array::from_iter_values(records.iter().map(|r| r.vibration_mms))),
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.context.as_str()))),
        Arc::new(Float64Array::from(
            records.iter().map(|r| r.latency_ms).collect::<Vec<_>>(),
        )),
    ];
    for key in &extra_keys {
        fields.push(Field::new(extra_header(key), DataType::Utf8, true));
        arrays.push(Arc::new(StringArray::from(
            records
                .iter()
                .map(|r| r.extra.get(*key).map(String::as_str))
                .collect::<Vec<_>>(),
        )));
    }

    let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;
    let file = File::create(path)?;
    let mut writer = WriterBuilder::new().with_header(true).build(file);
    writer.write(&batch)?;

    debug!(path = %path.display(), records = records.len(), "wrote telemetry CSV");
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum CsvError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Arrow(#[from] ArrowError),
    #[error("row {row}: missing value for column '{column}'")]
    MissingValue { row: usize, column: &'static str },
    #[error("row {row}: invalid value '{value}' in column '{column}'")]
    InvalidValue {
        row: usize,
        column: &'static str,
        value: String,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extra_column_names_round_trip() {
        assert_eq!(extra_key("Ground_Truth_State"), "ground_truth_state");
        assert_eq!(extra_header("ground_truth_state"), "Ground_Truth_State");
    }

    #[test]
    fn dashboard_aliases_map_to_canonical_columns() {
        assert_eq!(canonical("Time"), COL_TIMESTAMP);
        assert_eq!(canonical("External_Context"), COL_CONTEXT);
        assert_eq!(canonical("Operator_Notes"), "Operator_Notes");
    }

    #[test]
    fn reads_handwritten_file_with_blank_latency() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plant.csv");
        std::fs::write(
            &path,
            "Timestamp,Water_Pressure_psi,Pump_Vibration_mms,Weather_Context,Network_Latency_ms,Ground_Truth_State\n\
             2026-03-01 00:00:00,50.1,2.0,Clear,,None\n\
             2026-03-01 00:15:00,28.4,6.7,Heavy Storm,210.5,Contextual (Storm)\n",
        )
        .unwrap();

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].latency_ms, None);
        assert_eq!(records[1].latency_ms, Some(210.5));
        assert_eq!(records[1].context, "Heavy Storm");
        assert_eq!(records[1].extra["ground_truth_state"], "Contextual (Storm)");
    }

    #[test]
    fn rejects_non_numeric_pressure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(
            &path,
            "Timestamp,Water_Pressure_psi,Pump_Vibration_mms,Weather_Context\n\
             2026-03-01 00:00:00,high,2.0,Clear\n",
        )
        .unwrap();

        let err = read_records(&path).unwrap_err();
        assert!(matches!(
            err,
            CsvError::InvalidValue { column: COL_PRESSURE, .. }
        ));
    }
}
