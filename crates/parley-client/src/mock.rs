use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, StreamExt};
use parking_lot::Mutex;

use parley_core::errors::ChatError;
use parley_core::event::ChatEvent;
use parley_core::ids::SessionId;

use crate::transport::{ByteStream, MessageStream, SessionInfo, Transport};

/// Pre-programmed replies for deterministic testing without a server.
pub enum MockReply {
    /// Encode each event as one `data:` frame, one chunk per frame.
    Events(Vec<ChatEvent>),
    /// Raw chunks handed to the decoder verbatim; lets a test control where
    /// chunk boundaries fall relative to frame boundaries.
    Chunks(Vec<String>),
    /// Fail the send itself, before any stream exists.
    Error(ChatError),
    /// Yield the events, then keep the stream open forever. Pair with
    /// cancellation in the test.
    Stall(Vec<ChatEvent>),
    /// Yield the events, then fail the byte stream mid-flight.
    ThenError(Vec<ChatEvent>, ChatError),
    /// Wait a duration, then resolve to the inner reply.
    Delay(Duration, Box<MockReply>),
}

impl MockReply {
    /// Convenience: a stream of plain text deltas.
    pub fn text(parts: &[&str]) -> Self {
        Self::Events(
            parts
                .iter()
                .map(|p| ChatEvent::Text { content: (*p).to_string() })
                .collect(),
        )
    }

    pub fn delayed(delay: Duration, inner: MockReply) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// Transport double that serves replies in sequence.
pub struct MockTransport {
    replies: Mutex<VecDeque<MockReply>>,
    header_session: Option<SessionId>,
    start_error: Mutex<Option<ChatError>>,
    calls: AtomicUsize,
    last_message: Mutex<Option<(String, Option<SessionId>)>>,
}

impl MockTransport {
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            header_session: None,
            start_error: Mutex::new(None),
            calls: AtomicUsize::new(0),
            last_message: Mutex::new(None),
        }
    }

    /// Attach this session id to every reply, as if the server sent the
    /// `X-Session-Id` header.
    pub fn with_header_session(mut self, id: SessionId) -> Self {
        self.header_session = Some(id);
        self
    }

    /// Make the next `start_session` call fail.
    pub fn with_start_error(self, error: ChatError) -> Self {
        *self.start_error.lock() = Some(error);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    /// The (message, session_id) pair of the most recent send.
    pub fn last_message(&self) -> Option<(String, Option<SessionId>)> {
        self.last_message.lock().clone()
    }
}

fn encode_frames(events: &[ChatEvent]) -> Vec<Bytes> {
    events
        .iter()
        .map(|event| {
            let json = serde_json::to_string(event).expect("chat event serializes");
            Bytes::from(format!("data: {json}\n"))
        })
        .collect()
}

fn finite(chunks: Vec<Bytes>) -> ByteStream {
    Box::pin(stream::iter(chunks.into_iter().map(Ok)))
}

async fn resolve(reply: MockReply) -> Result<ByteStream, ChatError> {
    let mut current = reply;
    loop {
        match current {
            MockReply::Events(events) => return Ok(finite(encode_frames(&events))),
            MockReply::Chunks(chunks) => {
                return Ok(finite(chunks.into_iter().map(Bytes::from).collect()))
            }
            MockReply::Error(error) => return Err(error),
            MockReply::Stall(events) => {
                let head = stream::iter(encode_frames(&events).into_iter().map(Ok));
                return Ok(Box::pin(head.chain(stream::pending())));
            }
            MockReply::ThenError(events, error) => {
                let mut items: Vec<Result<Bytes, ChatError>> =
                    encode_frames(&events).into_iter().map(Ok).collect();
                items.push(Err(error));
                return Ok(Box::pin(stream::iter(items)));
            }
            MockReply::Delay(duration, inner) => {
                tokio::time::sleep(duration).await;
                current = *inner;
            }
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn start_session(&self) -> Result<SessionInfo, ChatError> {
        if let Some(error) = self.start_error.lock().take() {
            return Err(error);
        }
        Ok(SessionInfo {
            session_id: SessionId::new(),
            message_count: 0,
        })
    }

    async fn send_message(
        &self,
        message: &str,
        session_id: Option<&SessionId>,
    ) -> Result<MessageStream, ChatError> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed);
        *self.last_message.lock() = Some((message.to_string(), session_id.cloned()));

        let reply = self.replies.lock().pop_front().ok_or_else(|| {
            ChatError::Transport(format!("MockTransport: no reply configured for call {call}"))
        })?;

        let bytes = resolve(reply).await?;
        Ok(MessageStream {
            session_id: self.header_session.clone(),
            bytes,
        })
    }

    async fn end_session(&self, _session_id: &SessionId) -> Result<(), ChatError> {
        Ok(())
    }

    async fn session_info(&self, session_id: &SessionId) -> Result<SessionInfo, ChatError> {
        Ok(SessionInfo {
            session_id: session_id.clone(),
            message_count: 0,
        })
    }
}
