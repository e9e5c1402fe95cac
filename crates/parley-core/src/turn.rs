use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::TurnId;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// A tool invocation surfaced mid-stream. `output: None` means the call is
/// still pending a matching result record.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub input: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
}

impl ToolCall {
    pub fn pending(name: impl Into<String>, input: Value) -> Self {
        Self {
            name: name.into(),
            input,
            output: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.output.is_none()
    }
}

/// One entry in the visible transcript. Content is append-only for the
/// turn's lifetime; tool calls keep the order of first mention.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: TurnId,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub tool_calls: Vec<ToolCall>,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: TurnId::new(),
            role: Role::User,
            content: text.into(),
            timestamp: Utc::now(),
            tool_calls: Vec::new(),
        }
    }

    /// An assistant turn starts empty and accumulates as the stream decodes.
    pub fn assistant() -> Self {
        Self {
            id: TurnId::new(),
            role: Role::Assistant,
            content: String::new(),
            timestamp: Utc::now(),
            tool_calls: Vec::new(),
        }
    }

    pub fn append_text(&mut self, delta: &str) {
        self.content.push_str(delta);
    }

    pub fn push_tool_call(&mut self, name: impl Into<String>, input: Value) {
        self.tool_calls.push(ToolCall::pending(name, input));
    }

    /// Resolve the oldest pending call with this name. Returns false when no
    /// call matches, in which case nothing is mutated.
    pub fn resolve_tool_call(&mut self, name: &str, output: Value) -> bool {
        match self
            .tool_calls
            .iter_mut()
            .find(|tc| tc.name == name && tc.is_pending())
        {
            Some(tc) => {
                tc.output = Some(output);
                true
            }
            None => false,
        }
    }

    pub fn pending_tool_calls(&self) -> usize {
        self.tool_calls.iter().filter(|tc| tc.is_pending()).count()
    }
}
