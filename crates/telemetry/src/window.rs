use std::fmt;

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use glassbox_core::{format_timestamp, FieldValue, TelemetryRecord};

use crate::store::TelemetryStore;

/// How the rows of an anomaly window are chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    /// Rows `[start, end)` by position.
    Range { start: usize, end: usize },
    /// The single row with exactly this timestamp.
    Timestamp(NaiveDateTime),
    /// The row at `timestamp` padded with neighbours, clipped to the series.
    Around {
        timestamp: NaiveDateTime,
        before: usize,
        after: usize,
    },
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Range { start, end } => write!(f, "rows {start}..{end}"),
            Selection::Timestamp(ts) => write!(f, "timestamp {}", format_timestamp(ts)),
            Selection::Around {
                timestamp,
                before,
                after,
            } => write!(
                f,
                "timestamp {} (-{before}/+{after} rows)",
                format_timestamp(timestamp)
            ),
        }
    }
}

/// One selected row: a snapshot of the record plus its position and flag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowRow {
    pub index: usize,
    pub record: TelemetryRecord,
    pub anomaly_flag: bool,
}

impl WindowRow {
    /// Flatten to an ordered field map: fixed fields first, then extras by name.
    pub fn fields(&self) -> IndexMap<String, FieldValue> {
        let r = &self.record;
        let mut fields = IndexMap::new();
        fields.insert("index".to_string(), FieldValue::Integer(self.index as i64));
        fields.insert("timestamp".to_string(), FieldValue::Timestamp(r.timestamp));
        fields.insert("pressure_psi".to_string(), FieldValue::Float(r.pressure_psi));
        fields.insert("vibration_mms".to_string(), FieldValue::Float(r.vibration_mms));
        fields.insert("context".to_string(), FieldValue::Text(r.context.clone()));
        fields.insert("latency_ms".to_string(), FieldValue::from(r.latency_ms));
        fields.insert("anomaly_flag".to_string(), FieldValue::Boolean(self.anomaly_flag));
        // BTreeMap iteration is already sorted by key.
        for (key, value) in &r.extra {
            let mut key = key.clone();
            while fields.contains_key(&key) {
                key = format!("extra_{key}");
            }
            fields.insert(key, FieldValue::Text(value.clone()));
        }
        fields
    }
}

/// Telemetry slice handed to the prompt builder. Rows are snapshots, so a
/// window never borrows from the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyWindow {
    pub selection: Selection,
    pub rows: Vec<WindowRow>,
}

impl AnomalyWindow {
    /// Resolve a selection against the store. Never touches the store's state.
    pub fn select(store: &TelemetryStore, selection: Selection) -> Result<Self, WindowError> {
        let (start, end) = match &selection {
            Selection::Range { start, end } => {
                if start >= end {
                    return Err(WindowError::EmptyRange {
                        start: *start,
                        end: *end,
                    });
                }
                if *end > store.len() {
                    return Err(WindowError::NotFound(format!(
                        "rows {start}..{end} exceed series of {} records",
                        store.len()
                    )));
                }
                (*start, *end)
            }
            Selection::Timestamp(ts) => {
                let i = locate(store, ts)?;
                (i, i + 1)
            }
            Selection::Around {
                timestamp,
                before,
                after,
            } => {
                let i = locate(store, timestamp)?;
                (
                    i.saturating_sub(*before),
                    (i + 1).saturating_add(*after).min(store.len()),
                )
            }
        };

        let rows = (start..end)
            .filter_map(|index| {
                store.get(index).map(|record| WindowRow {
                    index,
                    record: record.clone(),
                    anomaly_flag: store.is_anomalous(record),
                })
            })
            .collect::<Vec<_>>();

        debug!(%selection, rows = rows.len(), "anomaly window selected");
        Ok(Self { selection, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Field maps of every row, in row order.
    pub fn fields(&self) -> Vec<IndexMap<String, FieldValue>> {
        self.rows.iter().map(WindowRow::fields).collect()
    }

    pub fn anomalous_rows(&self) -> usize {
        self.rows.iter().filter(|r| r.anomaly_flag).count()
    }
}

fn locate(store: &TelemetryStore, ts: &NaiveDateTime) -> Result<usize, WindowError> {
    store
        .position_of(ts)
        .ok_or_else(|| WindowError::NotFound(format!("no record at {}", format_timestamp(ts))))
}

#[derive(Debug, thiserror::Error)]
pub enum WindowError {
    #[error("telemetry not found: {0}")]
    NotFound(String),
    #[error("empty range {start}..{end}")]
    EmptyRange { start: usize, end: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{generate, Preset, DEFAULT_SEED};
    use chrono::Duration;
    use glassbox_core::DetectionRule;

    fn store() -> TelemetryStore {
        TelemetryStore::new(generate(Preset::Dataset, DEFAULT_SEED), DetectionRule::default())
            .unwrap()
    }

    #[test]
    fn every_anomaly_timestamp_selects_one_row() {
        let store = store();
        let timestamps = store.anomaly_timestamps();
        assert!(!timestamps.is_empty());
        for ts in timestamps {
            let window = AnomalyWindow::select(&store, Selection::Timestamp(ts)).unwrap();
            assert_eq!(window.len(), 1);
            assert!(window.rows[0].anomaly_flag);
            assert_eq!(window.rows[0].record.timestamp, ts);
        }
    }

    #[test]
    fn unknown_timestamp_is_not_found() {
        let store = store();
        let ts = store.records()[0].timestamp + Duration::minutes(1);
        let err = AnomalyWindow::select(&store, Selection::Timestamp(ts)).unwrap_err();
        assert!(matches!(err, WindowError::NotFound(_)));
    }

    #[test]
    fn range_selection_is_half_open() {
        let store = store();
        let window =
            AnomalyWindow::select(&store, Selection::Range { start: 148, end: 155 }).unwrap();
        let indices: Vec<usize> = window.rows.iter().map(|r| r.index).collect();
        assert_eq!(indices, (148..155).collect::<Vec<_>>());
        assert!(window.anomalous_rows() >= 1);
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        let store = store();
        assert!(matches!(
            AnomalyWindow::select(&store, Selection::Range { start: 5, end: 5 }),
            Err(WindowError::EmptyRange { .. })
        ));
        assert!(matches!(
            AnomalyWindow::select(&store, Selection::Range { start: 990, end: 1001 }),
            Err(WindowError::NotFound(_))
        ));
    }

    #[test]
    fn around_clips_to_series_bounds() {
        let store = store();
        let first = store.records()[0].timestamp;
        let window = AnomalyWindow::select(
            &store,
            Selection::Around {
                timestamp: first,
                before: 3,
                after: 2,
            },
        )
        .unwrap();
        assert_eq!(window.len(), 3);
        assert_eq!(window.rows[0].index, 0);
    }

    #[test]
    fn colliding_extras_are_all_kept() {
        let store = store();
        let record = store.records()[0]
            .clone()
            .with_extra("index", "from file")
            .with_extra("extra_index", "also from file");
        let row = WindowRow {
            index: 0,
            record,
            anomaly_flag: false,
        };

        let fields = row.fields();
        assert_eq!(fields.get("index"), Some(&FieldValue::Integer(0)));
        assert_eq!(
            fields.get("extra_index"),
            Some(&FieldValue::Text("also from file".into()))
        );
        assert_eq!(
            fields.get("extra_extra_index"),
            Some(&FieldValue::Text("from file".into()))
        );
        // 7 fixed fields, ground_truth_state and both colliding extras
        assert_eq!(fields.len(), 10);
    }

    #[test]
    fn field_order_is_fixed_then_extras() {
        let store = store();
        let window = AnomalyWindow::select(&store, Selection::Range { start: 0, end: 1 }).unwrap();
        let keys: Vec<String> = window.fields()[0].keys().cloned().collect();
        assert_eq!(
            keys,
            vec![
                "index",
                "timestamp",
                "pressure_psi",
                "vibration_mms",
                "context",
                "latency_ms",
                "anomaly_flag",
                "ground_truth_state",
            ]
        );
    }
}
