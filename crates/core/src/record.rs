use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::GlassboxError;

/// Canonical timestamp rendering used in prompts, CSV files and CLI output.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Formats accepted when parsing user- or file-supplied timestamps.
const ACCEPTED_TIMESTAMP_FORMATS: &[&str] = &[
    TIMESTAMP_FORMAT,
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Parse a timestamp in any of the accepted layouts.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, GlassboxError> {
    let raw = raw.trim();
    ACCEPTED_TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| GlassboxError::InvalidTimestamp(raw.to_string()))
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// One telemetry sample from the water-treatment plant.
///
/// The anomaly flag is not stored; it is derived on demand from
/// `pressure_psi` and `vibration_mms` through a [`DetectionRule`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetryRecord {
    pub timestamp: NaiveDateTime,
    pub pressure_psi: f64,
    pub vibration_mms: f64,
    /// External context (weather, network conditions).
    pub context: String,
    pub latency_ms: Option<f64>,
    /// Columns without a dedicated field, keyed by snake_case name.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl TelemetryRecord {
    pub fn new(
        timestamp: NaiveDateTime,
        pressure_psi: f64,
        vibration_mms: f64,
        context: impl Into<String>,
        latency_ms: Option<f64>,
    ) -> Self {
        Self {
            timestamp,
            pressure_psi,
            vibration_mms,
            context: context.into(),
            latency_ms,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Stand-in threshold detector: low pressure or high vibration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DetectionRule {
    pub pressure_min_psi: f64,
    pub vibration_max_mms: f64,
}

impl Default for DetectionRule {
    fn default() -> Self {
        Self {
            pressure_min_psi: 40.0,
            vibration_max_mms: 4.0,
        }
    }
}

impl DetectionRule {
    pub fn is_anomalous(&self, record: &TelemetryRecord) -> bool {
        record.pressure_psi < self.pressure_min_psi || record.vibration_mms > self.vibration_max_mms
    }
}

/// Typed field value used when a record is flattened for prompt rendering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Timestamp(NaiveDateTime),
    Null,
}

impl FieldValue {
    /// Extract as string, returning None for non-text values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }
}

impl From<Option<f64>> for FieldValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(FieldValue::Null, FieldValue::Float)
    }
}
