use serde::{Deserialize, Serialize};

use crate::ids::TurnId;

/// Notifications broadcast by the session controller while a send is in
/// flight. These mirror the state already visible through `SessionState`;
/// observers that only render snapshots can ignore them entirely.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SessionEvent {
    #[serde(rename = "turn_started")]
    TurnStarted { turn_id: TurnId },

    #[serde(rename = "text_delta")]
    TextDelta { turn_id: TurnId, delta: String },

    #[serde(rename = "tool_call_started")]
    ToolCallStarted { turn_id: TurnId, tool: String },

    #[serde(rename = "tool_call_resolved")]
    ToolCallResolved { turn_id: TurnId, tool: String },

    #[serde(rename = "turn_finished")]
    TurnFinished { turn_id: TurnId, cancelled: bool },

    #[serde(rename = "send_failed")]
    SendFailed { turn_id: TurnId, kind: String, message: String },

    #[serde(rename = "session_cleared")]
    SessionCleared,
}

impl SessionEvent {
    pub fn turn_id(&self) -> Option<&TurnId> {
        match self {
            Self::TurnStarted { turn_id }
            | Self::TextDelta { turn_id, .. }
            | Self::ToolCallStarted { turn_id, .. }
            | Self::ToolCallResolved { turn_id, .. }
            | Self::TurnFinished { turn_id, .. }
            | Self::SendFailed { turn_id, .. } => Some(turn_id),
            Self::SessionCleared => None,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TurnStarted { .. } => "turn_started",
            Self::TextDelta { .. } => "text_delta",
            Self::ToolCallStarted { .. } => "tool_call_started",
            Self::ToolCallResolved { .. } => "tool_call_resolved",
            Self::TurnFinished { .. } => "turn_finished",
            Self::SendFailed { .. } => "send_failed",
            Self::SessionCleared => "session_cleared",
        }
    }
}
