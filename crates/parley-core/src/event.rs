use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One decoded record from the response stream.
///
/// The wire format is a closed tagged union; servers may add tags over time,
/// so anything unrecognized deserializes to [`ChatEvent::Unknown`] instead of
/// failing the frame.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    Text { content: String },
    ToolUse { tool: String, input: Value },
    ToolResult { tool: String, output: Value },
    Error { message: String },
    #[serde(other)]
    Unknown,
}

impl ChatEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::ToolUse { .. } => "tool_use",
            Self::ToolResult { .. } => "tool_result",
            Self::Error { .. } => "error",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }
}
