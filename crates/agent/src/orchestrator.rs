//! Bounded two-party conversation driver.
//!
//! Idle → Sent(1) → … → Complete. Each turn is exactly one model call.
//! Turn 1 is always the responder answering the opening message; later
//! turns alternate initiator and responder. The exchange completes when
//! the turn cap is reached, when a message ends with [`TERMINATE_SIGNAL`],
//! or when the next speaker is a relay (relays never generate). Replies are
//! kept verbatim.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use glassbox_llm::{LlmError, LlmProvider};

use crate::role::AgentRole;
use crate::transcript::{ConversationTranscript, Side, TranscriptFull};

/// A message whose final word is this token ends the conversation early.
pub const TERMINATE_SIGNAL: &str = "TERMINATE";

/// True when the last word of `reply`, ignoring trailing punctuation, is
/// exactly [`TERMINATE_SIGNAL`].
pub fn is_terminal(reply: &str) -> bool {
    reply
        .split_whitespace()
        .last()
        .map(|word| word.trim_end_matches(['.', '!']))
        == Some(TERMINATE_SIGNAL)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    TurnLimit,
    TerminalSignal,
    RelayTurn,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationOutcome {
    /// The responder's most recent message, unmodified.
    pub final_message: String,
    pub turns: u32,
    pub stop: StopReason,
    pub transcript_len: usize,
    pub elapsed_ms: u64,
}

/// Drives conversations against one model capability. Holds no
/// per-conversation state, so one orchestrator can serve concurrent runs.
pub struct Orchestrator {
    provider: Arc<dyn LlmProvider>,
    max_tokens: u32,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn LlmProvider>, max_tokens: u32) -> Self {
        Self {
            provider,
            max_tokens,
        }
    }

    /// Run to completion and return the final responder message.
    pub async fn run(
        &self,
        initiator: &AgentRole,
        responder: &AgentRole,
        opening: String,
        max_turns: u32,
    ) -> Result<String, OrchestratorError> {
        self.run_detailed(initiator, responder, opening, max_turns)
            .await
            .map(|outcome| outcome.final_message)
    }

    pub async fn run_detailed(
        &self,
        initiator: &AgentRole,
        responder: &AgentRole,
        opening: String,
        max_turns: u32,
    ) -> Result<ConversationOutcome, OrchestratorError> {
        let start = Instant::now();
        let max_turns = max_turns.max(1);
        let mut transcript =
            ConversationTranscript::new((max_turns as usize).saturating_add(1));
        transcript.push(Side::Initiator, &initiator.name, opening)?;

        info!(
            initiator = %initiator.name,
            responder = %responder.name,
            max_turns,
            provider = self.provider.name(),
            "conversation started"
        );

        let mut side = Side::Responder;
        let mut last_reply = String::new();
        let mut turns = 0u32;

        let stop = loop {
            turns += 1;
            let speaker = match side {
                Side::Initiator => initiator,
                Side::Responder => responder,
            };
            let reply = self.generate(side, speaker, &transcript, turns).await?;
            let terminal = is_terminal(&reply);
            if side == Side::Responder {
                last_reply = reply.clone();
            }
            transcript.push(side, &speaker.name, reply)?;

            if terminal {
                break StopReason::TerminalSignal;
            }
            if turns >= max_turns {
                break StopReason::TurnLimit;
            }
            side = side.other();
            let next = match side {
                Side::Initiator => initiator,
                Side::Responder => responder,
            };
            if next.is_relay() {
                break StopReason::RelayTurn;
            }
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        info!(turns, ?stop, elapsed_ms, "conversation complete");

        Ok(ConversationOutcome {
            final_message: last_reply,
            turns,
            stop,
            transcript_len: transcript.len(),
            elapsed_ms,
        })
    }

    /// One model call on behalf of `speaker`.
    async fn generate(
        &self,
        side: Side,
        speaker: &AgentRole,
        transcript: &ConversationTranscript,
        turn: u32,
    ) -> Result<String, OrchestratorError> {
        debug!(turn, agent = %speaker.name, "requesting model turn");

        let reply = self
            .provider
            .complete(
                transcript.to_messages(side, &speaker.instruction),
                speaker.temperature,
                self.max_tokens,
            )
            .await
            .map_err(|e| {
                warn!(turn, agent = %speaker.name, error = %e, "model call failed");
                OrchestratorError::ModelUnavailable {
                    turn,
                    role: speaker.name.clone(),
                    cause: ModelFailure::Llm(e),
                }
            })?;

        if reply.trim().is_empty() {
            warn!(turn, agent = %speaker.name, "model returned an empty message");
            return Err(OrchestratorError::ModelUnavailable {
                turn,
                role: speaker.name.clone(),
                cause: ModelFailure::EmptyResponse,
            });
        }
        Ok(reply)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ModelFailure {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("empty response")]
    EmptyResponse,
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("model unavailable on turn {turn} ({role}): {cause}")]
    ModelUnavailable {
        turn: u32,
        role: String,
        #[source]
        cause: ModelFailure,
    },
    #[error(transparent)]
    Transcript(#[from] TranscriptFull),
}
