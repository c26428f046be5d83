//! Tool result -> transcript text
//!
//! Output is bounded so a single chatty tool cannot flood the context window.

use super::ToolOutcome;
use serde_json::Value;

/// Default cap on the characters a tool result may contribute
pub const MAX_TOOL_OUTPUT_LENGTH: usize = 5000;

/// Canonical text for a value: strings verbatim, everything else as JSON
pub fn serialize_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_else(|_| other.to_string()),
    }
}

/// Cut `text` to `max_length` characters and append a notice with the true length
pub fn truncate_output(text: String, max_length: usize) -> String {
    let total = text.chars().count();
    if total <= max_length {
        return text;
    }

    let prefix: String = text.chars().take(max_length).collect();
    format!(
        "{}\n\n(Note: Result was truncated to {} characters out of {} total characters.)",
        prefix, max_length, total
    )
}

/// Text appended to the conversation for an outcome
pub fn render_outcome(outcome: &ToolOutcome, max_length: usize) -> String {
    let text = match outcome {
        Ok(value) => serialize_value(value),
        Err(err) => err.message().to_string(),
    };
    truncate_output(text, max_length)
}
