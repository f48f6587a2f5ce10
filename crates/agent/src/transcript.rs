use serde::Serialize;

use glassbox_llm::Message;

/// Which side of the conversation produced an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Initiator,
    Responder,
}

impl Side {
    pub fn other(self) -> Self {
        match self {
            Side::Initiator => Side::Responder,
            Side::Responder => Side::Initiator,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptEntry {
    pub side: Side,
    /// Display name of the role that spoke.
    pub speaker: String,
    pub text: String,
}

/// Append-only, capacity-bounded record of one conversation.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationTranscript {
    entries: Vec<TranscriptEntry>,
    capacity: usize,
}

impl ConversationTranscript {
    /// `capacity` bounds the number of entries; storage grows on demand.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity,
        }
    }

    pub fn push(&mut self, side: Side, speaker: &str, text: String) -> Result<(), TranscriptFull> {
        if self.entries.len() >= self.capacity {
            return Err(TranscriptFull(self.capacity));
        }
        self.entries.push(TranscriptEntry {
            side,
            speaker: speaker.to_string(),
            text,
        });
        Ok(())
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&TranscriptEntry> {
        self.entries.last()
    }

    /// Chat messages as seen from `side`: `instruction` as the system
    /// message, that side's entries as assistant turns, the other side's as
    /// user turns. Perspective follows the side, never the role name.
    pub fn to_messages(&self, side: Side, instruction: &str) -> Vec<Message> {
        std::iter::once(Message::system(instruction))
            .chain(self.entries.iter().map(|entry| {
                if entry.side == side {
                    Message::assistant(entry.text.clone())
                } else {
                    Message::user(entry.text.clone())
                }
            }))
            .collect()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("transcript capacity of {0} entries exceeded")]
pub struct TranscriptFull(pub usize);
