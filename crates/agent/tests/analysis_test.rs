/// Integration tests for the analysis pipeline against a scripted provider.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use glassbox_agent::splitter::MISSING_CONTEXTUAL_PLACEHOLDER;
use glassbox_agent::{
    AnalysisError, AnalysisSettings, InitiatorMode, ResponseFormat, RoleSet, XaiAnalyzer,
};
use glassbox_core::{DetectionRule, TelemetryRecord};
use glassbox_llm::MockLlmProvider;
use glassbox_telemetry::{Selection, TelemetryStore, WindowError};

// ============================================================================
// Test Helpers
// ============================================================================

fn at(minutes: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 3, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + chrono::Duration::minutes(minutes)
}

/// Six rows every 15 minutes; rows 2 (storm) and 4 (mechanical) are anomalous.
fn plant_store() -> TelemetryStore {
    let records = vec![
        TelemetryRecord::new(at(0), 50.1, 2.0, "Clear", Some(19.0)),
        TelemetryRecord::new(at(15), 49.6, 2.1, "Clear", Some(21.0)),
        TelemetryRecord::new(at(30), 28.4, 6.7, "Heavy Storm", Some(210.5)),
        TelemetryRecord::new(at(45), 50.3, 1.9, "Clear", Some(18.5)),
        TelemetryRecord::new(at(60), 24.8, 8.2, "Clear", Some(20.2)),
        TelemetryRecord::new(at(75), 50.0, 2.0, "Clear", Some(20.0)),
    ];
    TelemetryStore::new(records, DetectionRule::default()).unwrap()
}

fn analyzer(mock: &Arc<MockLlmProvider>, settings: AnalysisSettings) -> XaiAnalyzer {
    XaiAnalyzer::new(mock.clone(), RoleSet::canonical(0.2), settings)
}

const COMPLIANT_REPLY: &str = "**Anomaly Analysis:** Pressure dropped to 28.40 psi.\n\n\
**Diagnosis:** Pump cavitation.\n\n===SPLIT===\n\n\
**Anomaly Analysis:** Pressure dropped to 28.40 psi.\n\n\
**Contextual Diagnosis:** Heavy Storm inflow overloaded the pump.";

// ============================================================================
// Integration Tests
// ============================================================================

#[tokio::test]
async fn relay_analysis_produces_both_explanations() {
    let mock = Arc::new(MockLlmProvider::new());
    mock.queue_text(COMPLIANT_REPLY);
    let store = plant_store();

    let report = analyzer(&mock, AnalysisSettings::default())
        .analyze(&store, Selection::Timestamp(at(30)))
        .await
        .unwrap();

    assert_eq!(mock.calls(), 1);
    assert_eq!(report.format, ResponseFormat::Compliant);
    assert_eq!(report.rows, 1);
    assert_eq!(report.anomalous_rows, 1);
    assert!(report.explanations.agnostic.ends_with("Pump cavitation."));
    assert!(report
        .explanations
        .contextual
        .ends_with("Heavy Storm inflow overloaded the pump."));

    // The relay's request reaches the explainer with the window embedded.
    let (messages, _) = &mock.requests()[0];
    assert!(messages[1].content.contains("Analyze this recent anomaly data"));
    assert!(messages[1].content.contains("context: Heavy Storm"));
}

#[tokio::test]
async fn unknown_timestamp_never_reaches_the_model() {
    let mock = Arc::new(MockLlmProvider::new());
    let store = plant_store();

    let err = analyzer(&mock, AnalysisSettings::default())
        .analyze(&store, Selection::Timestamp(at(7)))
        .await
        .unwrap_err();

    assert!(matches!(err, AnalysisError::NotFound(WindowError::NotFound(_))));
    assert!(!err.is_model_unavailable());
    assert_eq!(mock.calls(), 0);
}

#[tokio::test]
async fn every_listed_anomaly_is_selectable() {
    let mock = Arc::new(MockLlmProvider::new());
    let store = plant_store();
    let analyzer = analyzer(&mock, AnalysisSettings::default());

    for ts in store.anomaly_timestamps() {
        let report = analyzer.analyze(&store, Selection::Timestamp(ts)).await.unwrap();
        assert_eq!(report.rows, 1);
    }
    assert_eq!(mock.calls(), 2);
}

#[tokio::test]
async fn provider_failure_yields_no_explanations() {
    let mock = Arc::new(MockLlmProvider::new());
    mock.queue_error(500, "internal error");
    let store = plant_store();

    let err = analyzer(&mock, AnalysisSettings::default())
        .analyze(&store, Selection::Timestamp(at(30)))
        .await
        .unwrap_err();

    assert!(err.is_model_unavailable());
    assert!(matches!(err, AnalysisError::ModelUnavailable(_)));
}

#[tokio::test]
async fn slow_model_times_out_as_unavailable() {
    let mock = Arc::new(MockLlmProvider::new().with_delay(Duration::from_millis(500)));
    let store = plant_store();
    let settings = AnalysisSettings {
        timeout: Duration::from_millis(20),
        ..AnalysisSettings::default()
    };

    let err = analyzer(&mock, settings)
        .analyze(&store, Selection::Timestamp(at(30)))
        .await
        .unwrap_err();

    assert!(matches!(err, AnalysisError::Timeout(_)));
    assert!(err.is_model_unavailable());
}

#[tokio::test]
async fn reply_without_delimiter_gets_placeholder() {
    let mock = Arc::new(MockLlmProvider::new());
    mock.queue_text("  Pressure is low because the pump is failing.  ");
    let store = plant_store();

    let report = analyzer(&mock, AnalysisSettings::default())
        .analyze(&store, Selection::Timestamp(at(60)))
        .await
        .unwrap();

    assert_eq!(report.format, ResponseFormat::MissingDelimiter);
    assert_eq!(
        report.explanations.agnostic,
        "Pressure is low because the pump is failing."
    );
    assert_eq!(report.explanations.contextual, MISSING_CONTEXTUAL_PLACEHOLDER);
}

#[tokio::test]
async fn active_monitor_opens_with_its_own_prompt() {
    let mock = Arc::new(MockLlmProvider::new());
    mock.queue_text("first draft ===SPLIT=== first context");
    mock.queue_text("Vibration sensor is above 4.0 mm/s, revise.");
    mock.queue_text(COMPLIANT_REPLY);
    let store = plant_store();
    let settings = AnalysisSettings {
        mode: InitiatorMode::Active,
        max_turns: 3,
        ..AnalysisSettings::default()
    };

    let report = analyzer(&mock, settings)
        .analyze(&store, Selection::Range { start: 1, end: 4 })
        .await
        .unwrap();

    assert_eq!(mock.calls(), 3);
    assert_eq!(report.turns, 3);
    assert_eq!(report.rows, 3);
    assert!(report.explanations.contextual.contains("Heavy Storm inflow"));

    let (messages, _) = &mock.requests()[0];
    assert!(messages[1].content.starts_with("You are an IoT sensor monitor."));
}

#[tokio::test]
async fn concurrent_requests_are_independent() {
    let mock = Arc::new(MockLlmProvider::new().with_delay(Duration::from_millis(10)));
    let store = plant_store();
    let analyzer = analyzer(&mock, AnalysisSettings::default());

    let results = analyzer
        .analyze_many(
            &store,
            vec![
                Selection::Timestamp(at(30)),
                Selection::Timestamp(at(7)),
                Selection::Timestamp(at(60)),
            ],
        )
        .await;

    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(AnalysisError::NotFound(_))));
    assert!(results[2].is_ok());
    assert_eq!(mock.calls(), 2);
    assert_ne!(
        results[0].as_ref().unwrap().id,
        results[2].as_ref().unwrap().id
    );
}
