use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::record::DetectionRule;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_parse<T: std::str::FromStr>(profile: &str, key: &str, default: T) -> T {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub llm: LlmConfig,
    pub telemetry: TelemetryConfig,
    pub detection: DetectionRule,
    pub analysis: AnalysisConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `GLASSBOX_PROFILE`. When set (e.g. `LAB`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("GLASSBOX_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            llm: LlmConfig::from_env_profiled(p),
            telemetry: TelemetryConfig::from_env_profiled(p),
            detection: detection_from_env_profiled(p),
            analysis: AnalysisConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  llm:        provider={}, base_url={}, model={}",
            self.llm.provider,
            self.llm.base_url,
            self.llm.model
        );
        tracing::info!(
            "  telemetry:  source={}, seed={}",
            self.telemetry.source_label(),
            self.telemetry.seed
        );
        tracing::info!(
            "  detection:  pressure<{} psi, vibration>{} mm/s",
            self.detection.pressure_min_psi,
            self.detection.vibration_max_mms
        );
        tracing::info!(
            "  analysis:   mode={}, max_turns={}, timeout={}s",
            self.analysis.mode,
            self.analysis.max_turns,
            self.analysis.timeout_secs
        );
    }

    /// Return a redacted view safe for display (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "llm": {
                "provider": self.llm.provider,
                "base_url": self.llm.base_url,
                "model": self.llm.model,
                "temperature": self.llm.temperature,
                "api_key_set": self.llm.api_key.is_some(),
                "configured": self.llm.is_configured(),
            },
            "telemetry": {
                "source": self.telemetry.source_label(),
                "seed": self.telemetry.seed,
            },
            "detection": {
                "pressure_min_psi": self.detection.pressure_min_psi,
                "vibration_max_mms": self.detection.vibration_max_mms,
            },
            "analysis": {
                "mode": self.analysis.mode,
                "max_turns": self.analysis.max_turns,
                "timeout_secs": self.analysis.timeout_secs,
                "roles_dir": self.analysis.roles_dir,
            },
        })
    }
}

// ── LLM endpoint ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "openai" (any OpenAI-compatible endpoint) or "ollama" (native API)
    pub provider: String,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Per-request HTTP timeout.
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            base_url: "http://127.0.0.1:11434".to_string(),
            model: "llama3.2".to_string(),
            api_key: Some("ollama".to_string()),
            temperature: 0.2,
            max_tokens: 1024,
            request_timeout_secs: 120,
        }
    }
}

impl LlmConfig {
    fn from_env_profiled(p: &str) -> Self {
        let defaults = Self::default();
        Self {
            provider: profiled_env_or(p, "LLM_PROVIDER", &defaults.provider),
            base_url: profiled_env_or(p, "LLM_BASE_URL", &defaults.base_url),
            model: profiled_env_or(p, "LLM_MODEL", &defaults.model),
            api_key: profiled_env_opt(p, "LLM_API_KEY").or(defaults.api_key),
            temperature: profiled_env_parse(p, "LLM_TEMPERATURE", defaults.temperature),
            max_tokens: profiled_env_parse(p, "LLM_MAX_TOKENS", defaults.max_tokens),
            request_timeout_secs: profiled_env_parse(
                p,
                "LLM_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            ),
        }
    }

    pub fn is_configured(&self) -> bool {
        match self.provider.as_str() {
            "openai" => self.api_key.is_some() && !self.base_url.is_empty(),
            "ollama" => !self.base_url.is_empty(),
            _ => false,
        }
    }
}

// ── Telemetry source ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Load from this CSV file instead of generating.
    pub csv_path: Option<PathBuf>,
    /// Generator preset: "dashboard" or "dataset".
    pub preset: String,
    pub seed: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            csv_path: None,
            preset: "dataset".to_string(),
            seed: 42,
        }
    }
}

impl TelemetryConfig {
    fn from_env_profiled(p: &str) -> Self {
        let defaults = Self::default();
        Self {
            csv_path: profiled_env_opt(p, "TELEMETRY_CSV").map(PathBuf::from),
            preset: profiled_env_or(p, "TELEMETRY_PRESET", &defaults.preset),
            seed: profiled_env_parse(p, "TELEMETRY_SEED", defaults.seed),
        }
    }

    pub fn source_label(&self) -> String {
        match &self.csv_path {
            Some(path) => format!("csv:{}", path.display()),
            None => format!("generated:{}", self.preset),
        }
    }
}

// ── Detection rule ────────────────────────────────────────────

fn detection_from_env_profiled(p: &str) -> DetectionRule {
    let defaults = DetectionRule::default();
    DetectionRule {
        pressure_min_psi: profiled_env_parse(p, "DETECT_PRESSURE_MIN_PSI", defaults.pressure_min_psi),
        vibration_max_mms: profiled_env_parse(
            p,
            "DETECT_VIBRATION_MAX_MMS",
            defaults.vibration_max_mms,
        ),
    }
}

// ── Analysis ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// "relay" (monitor only forwards the request) or "active" (monitor analyzes too)
    pub mode: String,
    pub max_turns: u32,
    /// Deadline for a whole analysis request.
    pub timeout_secs: u64,
    /// Optional directory of role overrides (`*.md` with frontmatter).
    pub roles_dir: Option<PathBuf>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            mode: "relay".to_string(),
            max_turns: 1,
            timeout_secs: 180,
            roles_dir: None,
        }
    }
}

impl AnalysisConfig {
    fn from_env_profiled(p: &str) -> Self {
        let defaults = Self::default();
        Self {
            mode: profiled_env_or(p, "ANALYSIS_MODE", &defaults.mode),
            max_turns: profiled_env_parse(p, "ANALYSIS_MAX_TURNS", defaults.max_turns),
            timeout_secs: profiled_env_parse(p, "ANALYSIS_TIMEOUT_SECS", defaults.timeout_secs),
            roles_dir: profiled_env_opt(p, "AGENT_ROLES_DIR").map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_key(key: Option<&str>) -> Config {
        Config {
            profile: String::new(),
            llm: LlmConfig {
                api_key: key.map(String::from),
                ..LlmConfig::default()
            },
            telemetry: TelemetryConfig::default(),
            detection: DetectionRule::default(),
            analysis: AnalysisConfig::default(),
        }
    }

    #[test]
    fn defaults_point_at_local_endpoint() {
        let llm = LlmConfig::default();
        assert_eq!(llm.provider, "openai");
        assert_eq!(llm.model, "llama3.2");
        assert!((llm.temperature - 0.2).abs() < f32::EPSILON);
        assert!(llm.is_configured());
    }

    #[test]
    fn unknown_provider_is_not_configured() {
        let llm = LlmConfig {
            provider: "carrier-pigeon".into(),
            ..LlmConfig::default()
        };
        assert!(!llm.is_configured());
    }

    #[test]
    fn redacted_summary_hides_api_key() {
        let config = config_with_key(Some("sk-very-secret"));
        let summary = config.redacted_summary().to_string();
        assert!(!summary.contains("sk-very-secret"));
        assert_eq!(config.redacted_summary()["llm"]["api_key_set"], true);
        assert_eq!(config.redacted_summary()["profile"], "default");
    }

    #[test]
    fn source_label_prefers_csv() {
        let mut telemetry = TelemetryConfig::default();
        assert_eq!(telemetry.source_label(), "generated:dataset");
        telemetry.csv_path = Some(PathBuf::from("data/telemetry.csv"));
        assert_eq!(telemetry.source_label(), "csv:data/telemetry.csv");
    }
}
