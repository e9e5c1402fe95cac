use serde::{Deserialize, Serialize};

use crate::errors::ChatError;
use crate::ids::{RequestId, SessionId};
use crate::transcript::Transcript;

/// The consumer-facing read model: the full visible transcript plus the
/// terminal status of the most recent operation. Rendering layers observe
/// this; only the controller mutates it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SessionState {
    /// Absent until the server assigns one or a session-start is requested.
    pub session_id: Option<SessionId>,
    pub transcript: Transcript,
    /// Ownership token of the single in-flight send, if any.
    pub pending: Option<RequestId>,
    /// Terminal error of the most recent failed operation. Cancellations
    /// never land here.
    #[serde(skip)]
    pub last_error: Option<ChatError>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_empty() {
        let state = SessionState::new();
        assert!(state.session_id.is_none());
        assert!(state.transcript.is_empty());
        assert!(!state.is_pending());
        assert!(state.last_error.is_none());
    }

    #[test]
    fn pending_tracks_ownership_token() {
        let mut state = SessionState::new();
        let token = RequestId::new();
        state.pending = Some(token.clone());
        assert!(state.is_pending());
        assert_eq!(state.pending, Some(token));
    }
}
