//! Deterministic prompt rendering for anomaly windows.
//!
//! Numbers are always printed with two decimals so prompts stay comparable
//! across runs; every field of the window is rendered in window order.

use glassbox_core::{format_timestamp, FieldValue};
use glassbox_telemetry::AnomalyWindow;

use crate::role::AgentRole;

/// Opening message used when the initiator only relays the data.
pub const ANALYSIS_REQUEST: &str =
    "Analyze this recent anomaly data and provide the explanations:";

const FIELD_SEPARATOR: &str = "; ";

pub fn render_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Text(s) => s.replace(['\r', '\n'], " "),
        FieldValue::Integer(i) => i.to_string(),
        FieldValue::Float(f) => format!("{f:.2}"),
        FieldValue::Boolean(b) => b.to_string(),
        FieldValue::Timestamp(ts) => format_timestamp(ts),
        FieldValue::Null => "n/a".to_string(),
    }
}

/// Render the window: a header line, then one line per record.
pub fn render_window(window: &AnomalyWindow) -> String {
    let mut out = format!(
        "Anomaly window ({}, {} record(s), {} flagged anomalous):",
        window.selection,
        window.len(),
        window.anomalous_rows()
    );
    for fields in window.fields() {
        let line = fields
            .iter()
            .map(|(name, value)| format!("{name}: {}", render_value(value)))
            .collect::<Vec<_>>()
            .join(FIELD_SEPARATOR);
        out.push_str("\n- ");
        out.push_str(&line);
    }
    out
}

/// Role instruction verbatim, a blank line, then the rendered window.
pub fn build_prompt(role: &AgentRole, window: &AnomalyWindow) -> String {
    format!("{}\n\n{}", role.instruction, render_window(window))
}

/// Fixed relay request embedding the window.
pub fn analysis_request(window: &AnomalyWindow) -> String {
    format!("{ANALYSIS_REQUEST}\n\n{}", render_window(window))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use glassbox_core::{DetectionRule, TelemetryRecord};
    use glassbox_telemetry::{Selection, TelemetryStore};

    fn storm_window() -> AnomalyWindow {
        let t0 = NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let t1 = t0 + chrono::Duration::minutes(15);
        let store = TelemetryStore::new(
            vec![
                TelemetryRecord::new(t0, 50.0, 2.0, "Clear", Some(20.0)),
                TelemetryRecord::new(t1, 28.4, 6.7, "Heavy Storm", Some(210.5))
                    .with_extra("ground_truth_state", "Contextual (Storm)"),
            ],
            DetectionRule::default(),
        )
        .unwrap();
        AnomalyWindow::select(&store, Selection::Timestamp(t1)).unwrap()
    }

    #[test]
    fn storm_record_renders_every_field() {
        let rendered = render_window(&storm_window());
        assert!(rendered.contains("28.40"));
        assert!(rendered.contains("6.70"));
        assert!(rendered.contains("210.50"));
        assert!(rendered.contains("Heavy Storm"));
        assert!(rendered.contains("anomaly_flag: true"));
        assert!(rendered.contains("ground_truth_state: Contextual (Storm)"));
        assert_eq!(
            rendered.lines().nth(1).unwrap(),
            "- index: 1; timestamp: 2026-03-01 10:15:00; pressure_psi: 28.40; \
             vibration_mms: 6.70; context: Heavy Storm; latency_ms: 210.50; \
             anomaly_flag: true; ground_truth_state: Contextual (Storm)"
        );
    }

    #[test]
    fn rendering_is_deterministic() {
        let window = storm_window();
        assert_eq!(render_window(&window), render_window(&window));
        let role = AgentRole::explainer(0.2);
        assert_eq!(build_prompt(&role, &window), build_prompt(&role, &window));
    }

    #[test]
    fn prompt_keeps_instruction_verbatim() {
        let role = AgentRole::monitor(0.2);
        let prompt = build_prompt(&role, &storm_window());
        assert!(prompt.starts_with(&format!("{}\n\n", role.instruction)));
        assert!(prompt.ends_with("ground_truth_state: Contextual (Storm)"));
    }

    #[test]
    fn relay_request_embeds_window() {
        let request = analysis_request(&storm_window());
        assert!(request.starts_with(ANALYSIS_REQUEST));
        assert!(request.contains("timestamp 2026-03-01 10:15:00"));
    }

    #[test]
    fn missing_values_render_as_na() {
        assert_eq!(render_value(&FieldValue::Null), "n/a");
        assert_eq!(render_value(&FieldValue::Float(2.0)), "2.00");
        assert_eq!(render_value(&FieldValue::Text("a\nb".into())), "a b");
    }
}
