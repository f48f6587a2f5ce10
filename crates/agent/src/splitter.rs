use serde::Serialize;

/// Marker the explainer places between its two explanations.
pub const SPLIT_DELIMITER: &str = "===SPLIT===";

pub const MISSING_CONTEXTUAL_PLACEHOLDER: &str =
    "[No context-aware explanation was returned. Please run the analysis again.]";
pub const MISSING_AGNOSTIC_PLACEHOLDER: &str =
    "[No context-agnostic explanation was returned. Please run the analysis again.]";

/// The two explanations shown side by side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplanationPair {
    pub agnostic: String,
    pub contextual: String,
}

/// How well a response followed the split format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    Compliant,
    MissingDelimiter,
    DuplicateDelimiter,
}

pub fn classify(response: &str) -> ResponseFormat {
    match response.matches(SPLIT_DELIMITER).count() {
        0 => ResponseFormat::MissingDelimiter,
        1 => ResponseFormat::Compliant,
        _ => ResponseFormat::DuplicateDelimiter,
    }
}

/// Split a response at the first delimiter.
///
/// Everything after the first occurrence belongs to the contextual side,
/// later delimiters included. Segments are trimmed; a blank segment is
/// replaced by its placeholder. Never fails.
pub fn split(response: &str) -> ExplanationPair {
    let (agnostic, contextual) = match response.split_once(SPLIT_DELIMITER) {
        Some((before, after)) => (before.trim(), after.trim()),
        None => (response.trim(), ""),
    };

    ExplanationPair {
        agnostic: or_placeholder(agnostic, MISSING_AGNOSTIC_PLACEHOLDER),
        contextual: or_placeholder(contextual, MISSING_CONTEXTUAL_PLACEHOLDER),
    }
}

fn or_placeholder(segment: &str, placeholder: &str) -> String {
    if segment.is_empty() {
        placeholder.to_string()
    } else {
        segment.to_string()
    }
}
