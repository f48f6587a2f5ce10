//! The two-agent explanation pipeline: role configuration, prompt
//! rendering, the bounded conversation and splitting of the final reply.

pub mod analysis;
pub mod orchestrator;
pub mod prompt;
pub mod role;
pub mod splitter;
pub mod transcript;

pub use analysis::{AnalysisError, AnalysisReport, AnalysisSettings, InitiatorMode, XaiAnalyzer};
pub use orchestrator::{ConversationOutcome, Orchestrator, OrchestratorError, StopReason};
pub use prompt::{analysis_request, build_prompt, render_window, ANALYSIS_REQUEST};
pub use role::{AgentRole, Participation, RoleSet};
pub use splitter::{classify, split, ExplanationPair, ResponseFormat, SPLIT_DELIMITER};
pub use transcript::{ConversationTranscript, Side};
