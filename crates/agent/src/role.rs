//! Role-scoped agents as plain configuration records.
//!
//! Both conversation participants share the same mechanics and differ only
//! in data, so a role is just `{name, instruction, temperature,
//! participation}`. The two canonical roles are built in; either can be
//! overridden from a directory of `.md` files whose YAML frontmatter names
//! the slot (plus optional temperature and participation) and whose body is
//! the instruction.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const MONITOR_NAME: &str = "CPS_Monitor";
pub const EXPLAINER_NAME: &str = "XAI_Explainer";

const MONITOR_INSTRUCTION: &str = "You are an IoT sensor monitor. Review the data and state \
strictly what internal sensors failed. Do not look at external context.";

const EXPLAINER_INSTRUCTION: &str = "You are an Explainable AI system for a Cyber-Physical System.
You must provide two explanations for the anomaly.

Strictly format your response exactly like this:

**Anomaly Analysis:**
[Brief 1-sentence summary of the sensor data]

**Diagnosis:**
[Context-agnostic explanation using ONLY internal sensor data]

===SPLIT===

**Anomaly Analysis:**
[Brief 1-sentence summary of the sensor data]

**Contextual Diagnosis:**
[Context-aware explanation linking internal sensor failures to the External Context]";

/// Whether a participant generates messages or only delivers the opening one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Participation {
    Active,
    /// Never calls the model; its only contribution is the opening message.
    Relay,
}

/// Immutable per-role configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentRole {
    pub name: String,
    pub instruction: String,
    pub temperature: f32,
    pub participation: Participation,
}

impl AgentRole {
    pub fn new(name: impl Into<String>, instruction: impl Into<String>, temperature: f32) -> Self {
        Self {
            name: name.into(),
            instruction: instruction.into(),
            temperature,
            participation: Participation::Active,
        }
    }

    /// Internal-sensor-only monitor.
    pub fn monitor(temperature: f32) -> Self {
        Self::new(MONITOR_NAME, MONITOR_INSTRUCTION, temperature)
    }

    /// Dual-mode explainer emitting both explanations around the split delimiter.
    pub fn explainer(temperature: f32) -> Self {
        Self::new(EXPLAINER_NAME, EXPLAINER_INSTRUCTION, temperature)
    }

    pub fn with_participation(mut self, participation: Participation) -> Self {
        self.participation = participation;
        self
    }

    pub fn is_relay(&self) -> bool {
        self.participation == Participation::Relay
    }
}

/// Which canonical role a role file replaces.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoleSlot {
    Monitor,
    Explainer,
}

#[derive(Debug, Deserialize)]
struct RoleFrontmatter {
    name: String,
    slot: RoleSlot,
    temperature: Option<f32>,
    #[serde(default)]
    participation: Option<Participation>,
}

/// The two participants of an analysis conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleSet {
    pub monitor: AgentRole,
    pub explainer: AgentRole,
}

impl RoleSet {
    pub fn canonical(temperature: f32) -> Self {
        Self {
            monitor: AgentRole::monitor(temperature),
            explainer: AgentRole::explainer(temperature),
        }
    }

    /// Canonical roles with any overrides found in `dir`.
    ///
    /// Unreadable or malformed files are skipped with a warning; a missing
    /// directory is an error.
    pub fn load(dir: &Path, default_temperature: f32) -> Result<Self, RoleConfigError> {
        if !dir.exists() {
            return Err(RoleConfigError::DirNotFound(dir.to_path_buf()));
        }

        let mut roles = Self::canonical(default_temperature);
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(|e| RoleConfigError::IoError(dir.to_path_buf(), e))?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|e| e == "md"))
            .collect();
        // Later files win; sort so that "later" is well defined.
        paths.sort();

        for path in paths {
            match load_role_file(&path, default_temperature) {
                Ok((slot, role)) => {
                    info!(role = %role.name, ?slot, path = %path.display(), "loaded role override");
                    match slot {
                        RoleSlot::Monitor => roles.monitor = role,
                        RoleSlot::Explainer => roles.explainer = role,
                    }
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping role file");
                }
            }
        }

        Ok(roles)
    }
}

/// Load a single role from a .md file.
fn load_role_file(
    path: &Path,
    default_temperature: f32,
) -> Result<(RoleSlot, AgentRole), RoleConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| RoleConfigError::IoError(path.to_path_buf(), e))?;
    let (frontmatter, body) = split_frontmatter(&content)
        .ok_or_else(|| RoleConfigError::NoFrontmatter(path.to_path_buf()))?;

    let meta: RoleFrontmatter = serde_yaml::from_str(frontmatter)
        .map_err(|e| RoleConfigError::Parse(path.to_path_buf(), e))?;
    if body.is_empty() {
        return Err(RoleConfigError::EmptyInstruction(path.to_path_buf()));
    }

    let role = AgentRole::new(
        meta.name,
        body,
        meta.temperature.unwrap_or(default_temperature),
    )
    .with_participation(meta.participation.unwrap_or(Participation::Active));
    Ok((meta.slot, role))
}

/// Split `---\n<yaml>\n---\n<body>` into its two parts (body trimmed).
fn split_frontmatter(content: &str) -> Option<(&str, &str)> {
    let after_first = content.trim_start().strip_prefix("---")?;
    let end = after_first.find("\n---")?;
    let frontmatter = &after_first[..end];
    let body = after_first[end + 4..].trim();
    Some((frontmatter, body))
}

#[derive(Debug, thiserror::Error)]
pub enum RoleConfigError {
    #[error("roles directory not found: {0}")]
    DirNotFound(PathBuf),
    #[error("I/O error reading {0}: {1}")]
    IoError(PathBuf, std::io::Error),
    #[error("no YAML frontmatter in {0}")]
    NoFrontmatter(PathBuf),
    #[error("invalid frontmatter in {0}: {1}")]
    Parse(PathBuf, serde_yaml::Error),
    #[error("role file {0} has no instruction body")]
    EmptyInstruction(PathBuf),
}
