use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::info;

use glassbox_core::{format_timestamp, DetectionRule, TelemetryRecord};

/// Ordered, read-only series of telemetry records plus the rule that flags them.
///
/// Flags are never cached: every query re-evaluates the current rule, so
/// swapping the rule with [`TelemetryStore::with_rule`] is always consistent.
#[derive(Debug, Clone)]
pub struct TelemetryStore {
    records: Vec<TelemetryRecord>,
    rule: DetectionRule,
}

/// A maximal run of consecutive anomalous records, `[start, end)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyEvent {
    pub start: usize,
    pub end: usize,
    pub first_timestamp: NaiveDateTime,
    pub last_timestamp: NaiveDateTime,
}

impl AnomalyEvent {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

impl TelemetryStore {
    /// Build a store, rejecting series whose timestamps are not strictly increasing.
    pub fn new(records: Vec<TelemetryRecord>, rule: DetectionRule) -> Result<Self, StoreError> {
        for (index, pair) in records.windows(2).enumerate() {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(StoreError::NonIncreasingTimestamp {
                    index: index + 1,
                    previous: format_timestamp(&pair[0].timestamp),
                    current: format_timestamp(&pair[1].timestamp),
                });
            }
        }
        let store = Self { records, rule };
        info!(
            records = store.len(),
            anomalies = store.anomaly_count(),
            "telemetry store ready"
        );
        Ok(store)
    }

    pub fn with_rule(mut self, rule: DetectionRule) -> Self {
        self.rule = rule;
        self
    }

    pub fn rule(&self) -> &DetectionRule {
        &self.rule
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[TelemetryRecord] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&TelemetryRecord> {
        self.records.get(index)
    }

    /// Anomaly flag for a record under the store's current rule.
    pub fn is_anomalous(&self, record: &TelemetryRecord) -> bool {
        self.rule.is_anomalous(record)
    }

    /// Position of the record with exactly this timestamp.
    pub fn position_of(&self, timestamp: &NaiveDateTime) -> Option<usize> {
        self.records
            .binary_search_by(|r| r.timestamp.cmp(timestamp))
            .ok()
    }

    pub fn find(&self, timestamp: &NaiveDateTime) -> Option<&TelemetryRecord> {
        self.position_of(timestamp).map(|i| &self.records[i])
    }

    /// All rows flagged anomalous, in series order.
    pub fn anomalies(&self) -> Vec<(usize, &TelemetryRecord)> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| self.rule.is_anomalous(r))
            .collect()
    }

    pub fn anomaly_count(&self) -> usize {
        self.records.iter().filter(|r| self.rule.is_anomalous(r)).count()
    }

    /// Timestamps a caller may offer for selection.
    pub fn anomaly_timestamps(&self) -> Vec<NaiveDateTime> {
        self.anomalies().into_iter().map(|(_, r)| r.timestamp).collect()
    }

    /// Group consecutive anomalous rows into events.
    pub fn anomaly_events(&self) -> Vec<AnomalyEvent> {
        let mut events = Vec::new();
        let mut open: Option<usize> = None;

        for (i, record) in self.records.iter().enumerate() {
            match (self.rule.is_anomalous(record), open) {
                (true, None) => open = Some(i),
                (false, Some(start)) => {
                    events.push(self.event(start, i));
                    open = None;
                }
                _ => {}
            }
        }
        if let Some(start) = open {
            events.push(self.event(start, self.records.len()));
        }
        events
    }

    fn event(&self, start: usize, end: usize) -> AnomalyEvent {
        AnomalyEvent {
            start,
            end,
            first_timestamp: self.records[start].timestamp,
            last_timestamp: self.records[end - 1].timestamp,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("timestamps must be strictly increasing: row {index} ({current}) does not follow {previous}")]
    NonIncreasingTimestamp {
        index: usize,
        previous: String,
        current: String,
    },
}
