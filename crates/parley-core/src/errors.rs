/// Typed error hierarchy for chat client operations.
///
/// Decode-level problems (malformed frames, unparsable JSON) never surface
/// here: the decoder recovers by skipping the offending frame. Everything
/// that does reach a caller resolves to an updated session state, so no
/// variant is fatal to the process.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChatError {
    /// Network or connection failure before or during streaming.
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-2xx HTTP response, reported before any stream is consumed.
    #[error("remote error {status}: {body}")]
    Remote { status: u16, body: String },

    /// The request was superseded or explicitly aborted. Distinguished from
    /// failure: produces no visible error state.
    #[error("cancelled")]
    Cancelled,

    /// An operation that needs a session id was called without one.
    #[error("no active session")]
    SessionMissing,
}

impl ChatError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Remote { .. } => "remote",
            Self::Cancelled => "cancelled",
            Self::SessionMissing => "session_missing",
        }
    }

    /// Classify an HTTP status code into the remote-error variant.
    pub fn from_status(status: u16, body: String) -> Self {
        Self::Remote { status, body }
    }
}
