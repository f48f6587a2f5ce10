//! End-to-end analysis of one anomaly: window, conversation, split.

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use glassbox_core::Config;
use glassbox_llm::{create_provider, LlmError, LlmProvider};
use glassbox_telemetry::{AnomalyWindow, Selection, TelemetryStore, WindowError};

use crate::orchestrator::{Orchestrator, OrchestratorError};
use crate::prompt::{analysis_request, build_prompt};
use crate::role::{Participation, RoleConfigError, RoleSet};
use crate::splitter::{classify, split, ExplanationPair, ResponseFormat};

/// How the monitor takes part in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InitiatorMode {
    /// Forwards a fixed analysis request and never calls the model.
    Relay,
    /// Opens with its own prompt and critiques the explainer's answers.
    Active,
}

impl FromStr for InitiatorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "relay" => Ok(InitiatorMode::Relay),
            "active" => Ok(InitiatorMode::Active),
            other => Err(format!("unknown analysis mode: '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub mode: InitiatorMode,
    pub max_turns: u32,
    pub max_tokens: u32,
    /// Deadline for the whole conversation.
    pub timeout: Duration,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            mode: InitiatorMode::Relay,
            max_turns: 1,
            max_tokens: 1024,
            timeout: Duration::from_secs(180),
        }
    }
}

/// Result of one successful analysis.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub id: Uuid,
    pub selection: Selection,
    pub rows: usize,
    pub anomalous_rows: usize,
    pub explanations: ExplanationPair,
    pub format: ResponseFormat,
    pub turns: u32,
    pub elapsed_ms: u64,
    /// Final responder message before splitting.
    pub raw_response: String,
}

/// Runs analyses against a shared model provider.
///
/// Holds only immutable state, so one analyzer can serve many concurrent
/// requests over the same read-only store.
pub struct XaiAnalyzer {
    orchestrator: Orchestrator,
    roles: RoleSet,
    settings: AnalysisSettings,
}

impl XaiAnalyzer {
    pub fn new(provider: Arc<dyn LlmProvider>, roles: RoleSet, settings: AnalysisSettings) -> Self {
        Self {
            orchestrator: Orchestrator::new(provider, settings.max_tokens),
            roles,
            settings,
        }
    }

    /// Build the provider, roles and settings from configuration.
    pub fn from_config(config: &Config) -> Result<Self, AnalysisError> {
        let mode = config
            .analysis
            .mode
            .parse::<InitiatorMode>()
            .map_err(AnalysisError::Config)?;
        let provider: Arc<dyn LlmProvider> =
            Arc::from(create_provider(&config.llm).map_err(AnalysisError::Provider)?);

        let temperature = config.llm.temperature;
        let roles = match &config.analysis.roles_dir {
            Some(dir) => RoleSet::load(dir, temperature)?,
            None => RoleSet::canonical(temperature),
        };

        let defaults = AnalysisSettings::default();
        let timeout = if config.analysis.timeout_secs == 0 {
            warn!(
                default = ?defaults.timeout,
                "ANALYSIS_TIMEOUT_SECS is 0; using the default deadline"
            );
            defaults.timeout
        } else {
            Duration::from_secs(config.analysis.timeout_secs)
        };

        let settings = AnalysisSettings {
            mode,
            max_turns: config.analysis.max_turns,
            max_tokens: config.llm.max_tokens,
            timeout,
        };
        Ok(Self::new(provider, roles, settings))
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    pub fn roles(&self) -> &RoleSet {
        &self.roles
    }

    /// Analyze the rows chosen by `selection`.
    ///
    /// Selection errors abort before any model call. Provider failures and
    /// an elapsed deadline both surface as model unavailability; a malformed
    /// reply is only logged and still yields a complete pair.
    pub async fn analyze(
        &self,
        store: &TelemetryStore,
        selection: Selection,
    ) -> Result<AnalysisReport, AnalysisError> {
        let start = Instant::now();
        let id = Uuid::new_v4();
        let window = AnomalyWindow::select(store, selection)?;

        let (initiator, opening) = match self.settings.mode {
            InitiatorMode::Relay => (
                self.roles
                    .monitor
                    .clone()
                    .with_participation(Participation::Relay),
                analysis_request(&window),
            ),
            InitiatorMode::Active => (
                self.roles.monitor.clone(),
                build_prompt(&self.roles.monitor, &window),
            ),
        };

        info!(
            %id,
            selection = %window.selection,
            rows = window.len(),
            mode = ?self.settings.mode,
            "analysis started"
        );

        let outcome = tokio::time::timeout(
            self.settings.timeout,
            self.orchestrator.run_detailed(
                &initiator,
                &self.roles.explainer,
                opening,
                self.settings.max_turns,
            ),
        )
        .await
        .map_err(|_| {
            warn!(%id, timeout = ?self.settings.timeout, "analysis timed out");
            AnalysisError::Timeout(self.settings.timeout)
        })??;

        let format = classify(&outcome.final_message);
        if format != ResponseFormat::Compliant {
            warn!(%id, ?format, "explainer reply did not follow the split format");
        }
        let explanations = split(&outcome.final_message);

        let elapsed_ms = start.elapsed().as_millis() as u64;
        info!(%id, turns = outcome.turns, ?format, elapsed_ms, "analysis complete");

        Ok(AnalysisReport {
            id,
            rows: window.len(),
            anomalous_rows: window.anomalous_rows(),
            selection: window.selection,
            explanations,
            format,
            turns: outcome.turns,
            elapsed_ms,
            raw_response: outcome.final_message,
        })
    }

    /// Run independent analyses concurrently; results keep input order.
    pub async fn analyze_many(
        &self,
        store: &TelemetryStore,
        selections: Vec<Selection>,
    ) -> Vec<Result<AnalysisReport, AnalysisError>> {
        join_all(
            selections
                .into_iter()
                .map(|selection| self.analyze(store, selection)),
        )
        .await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    NotFound(#[from] WindowError),
    #[error(transparent)]
    ModelUnavailable(#[from] OrchestratorError),
    #[error("model unavailable: no answer within {0:?}")]
    Timeout(Duration),
    #[error("invalid analysis configuration: {0}")]
    Config(String),
    #[error("role configuration error: {0}")]
    Roles(#[from] RoleConfigError),
    #[error("could not create model provider: {0}")]
    Provider(#[source] LlmError),
}

impl AnalysisError {
    /// Provider failure or elapsed deadline; the caller may retry the request.
    pub fn is_model_unavailable(&self) -> bool {
        matches!(self, Self::ModelUnavailable(_) | Self::Timeout(_))
    }
}
