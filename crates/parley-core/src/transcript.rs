use serde::{Deserialize, Serialize};

use crate::event::ChatEvent;
use crate::ids::TurnId;
use crate::turn::ConversationTurn;

/// The ordered transcript plus the reducer that folds stream events into it.
///
/// Turns are addressed strictly by id, never by position. A stream whose
/// target turn has disappeared (superseded send, cleared transcript) applies
/// as a no-op, which is what makes the cancel/supersede race safe.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Transcript {
    turns: Vec<ConversationTurn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn get(&self, id: &TurnId) -> Option<&ConversationTurn> {
        self.turns.iter().find(|t| &t.id == id)
    }

    fn get_mut(&mut self, id: &TurnId) -> Option<&mut ConversationTurn> {
        self.turns.iter_mut().find(|t| &t.id == id)
    }

    /// Append a user turn with the given text; returns its id.
    pub fn push_user(&mut self, text: impl Into<String>) -> TurnId {
        let turn = ConversationTurn::user(text);
        let id = turn.id.clone();
        self.turns.push(turn);
        id
    }

    /// Append an empty assistant turn; returns the id all subsequent stream
    /// events for this send must be applied against.
    pub fn push_assistant(&mut self) -> TurnId {
        let turn = ConversationTurn::assistant();
        let id = turn.id.clone();
        self.turns.push(turn);
        id
    }

    /// Apply one decoded event to the turn owning `target`.
    ///
    /// Returns true when the event mutated the transcript. A missing target
    /// turn, an unmatched tool result, or an unknown event all return false.
    pub fn apply(&mut self, target: &TurnId, event: &ChatEvent) -> bool {
        let Some(turn) = self.get_mut(target) else {
            return false;
        };

        match event {
            ChatEvent::Text { content } => {
                turn.append_text(content);
                true
            }
            ChatEvent::ToolUse { tool, input } => {
                turn.push_tool_call(tool.clone(), input.clone());
                true
            }
            ChatEvent::ToolResult { tool, output } => {
                turn.resolve_tool_call(tool, output.clone())
            }
            ChatEvent::Error { message } => {
                turn.append_text(&error_annotation(message));
                true
            }
            ChatEvent::Unknown => false,
        }
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

/// Inline annotation appended to a turn's content when an error must stay
/// visible in the conversation. Accumulated text is preserved.
pub fn error_annotation(message: &str) -> String {
    format!("\n\n⚠️ Error: {message}")
}
