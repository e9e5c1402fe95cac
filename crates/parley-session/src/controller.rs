use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use parley_client::{EventStream, SessionInfo, Transport, DEFAULT_IDLE_TIMEOUT};
use parley_core::errors::ChatError;
use parley_core::event::ChatEvent;
use parley_core::events::SessionEvent;
use parley_core::ids::{RequestId, SessionId, TurnId};
use parley_core::session::SessionState;

const DEFAULT_EVENT_BUFFER: usize = 256;

/// Controller tuning knobs.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Passed through to the event-stream adapter.
    pub idle_timeout: Duration,
    /// Capacity of the observer broadcast channel.
    pub event_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

/// Terminal status of one `send` call. Transport and remote failures are
/// also folded into `SessionState::last_error`; this is the caller-facing
/// echo of the same outcome.
#[derive(Clone, Debug, PartialEq)]
pub enum SendOutcome {
    Completed,
    Cancelled,
    Failed(ChatError),
    /// Empty or whitespace-only input.
    RejectedEmpty,
    /// Another send is already in flight; at most one per session.
    RejectedBusy,
}

enum StreamOutcome {
    Completed,
    Cancelled,
    Failed(ChatError),
}

/// The in-flight send's ownership token plus its cancellation handle.
struct Inflight {
    id: RequestId,
    token: CancellationToken,
}

/// Orchestrates one logical "send message" operation end to end: supersedes
/// stale requests, owns the turn targeted by the stream, folds errors back
/// into the visible conversation, and notifies observers.
///
/// All state mutation happens in short lock-guarded sections on the task
/// driving `send`; stream reads are the only suspension points, and the
/// cancellation token is checked at each of them.
pub struct ChatController {
    transport: Arc<dyn Transport>,
    state: Arc<Mutex<SessionState>>,
    inflight: Mutex<Option<Inflight>>,
    events: broadcast::Sender<SessionEvent>,
    config: SessionConfig,
}

impl ChatController {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_config(transport, SessionConfig::default())
    }

    pub fn with_config(transport: Arc<dyn Transport>, config: SessionConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_buffer);
        Self {
            transport,
            state: Arc::new(Mutex::new(SessionState::new())),
            inflight: Mutex::new(None),
            events,
            config,
        }
    }

    /// Current read model. Rendering layers poll this; they never mutate it.
    pub fn snapshot(&self) -> SessionState {
        self.state.lock().clone()
    }

    pub fn is_pending(&self) -> bool {
        self.state.lock().is_pending()
    }

    /// Live notifications mirroring the snapshot state.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Ask the server for a fresh session. On success the transcript resets
    /// and the new id is adopted; on failure the prior state stays untouched
    /// apart from `last_error`.
    #[instrument(skip(self))]
    pub async fn start_session(&self) -> Result<SessionId, ChatError> {
        match self.transport.start_session().await {
            Ok(info) => {
                {
                    let mut state = self.state.lock();
                    state.session_id = Some(info.session_id.clone());
                    state.transcript.clear();
                    state.last_error = None;
                }
                self.emit(SessionEvent::SessionCleared);
                tracing::info!(session_id = %info.session_id, "session started");
                Ok(info.session_id)
            }
            Err(error) => {
                tracing::warn!(error = %error, "failed to start session");
                self.state.lock().last_error = Some(error.clone());
                Err(error)
            }
        }
    }

    /// Dispatch a user message and drive its response stream to completion.
    ///
    /// Rejected (without creating turns) when the text is blank or a send is
    /// already pending; a second call is refused, not queued. The future
    /// resolves once the stream ends, errors, or is cancelled.
    #[instrument(skip(self, text), fields(len = text.len()))]
    pub async fn send(&self, text: &str) -> SendOutcome {
        if text.trim().is_empty() {
            return SendOutcome::RejectedEmpty;
        }

        let request_id = RequestId::new();
        let token = CancellationToken::new();
        let turn_id;
        {
            let mut state = self.state.lock();
            if state.is_pending() {
                tracing::debug!("send rejected, another request is in flight");
                return SendOutcome::RejectedBusy;
            }
            // Supersede any stale in-flight request before touching the turn
            // list, so its late events can only miss their target id.
            let stale = self.inflight.lock().replace(Inflight {
                id: request_id.clone(),
                token: token.clone(),
            });
            if let Some(stale) = stale {
                tracing::debug!(request_id = %stale.id, "superseding stale request");
                stale.token.cancel();
            }

            state.transcript.push_user(text);
            turn_id = state.transcript.push_assistant();
            state.pending = Some(request_id.clone());
            state.last_error = None;
        }
        self.emit(SessionEvent::TurnStarted { turn_id: turn_id.clone() });

        let outcome = self.run_stream(text, &turn_id, &token).await;

        {
            let mut state = self.state.lock();
            // Only the owner of record may touch terminal state; a newer
            // send could have replaced the pending token already.
            if state.pending.as_ref() == Some(&request_id) {
                state.pending = None;
                if let StreamOutcome::Failed(error) = &outcome {
                    state.last_error = Some(error.clone());
                    state
                        .transcript
                        .apply(&turn_id, &ChatEvent::Error { message: error.to_string() });
                }
            }
            let mut inflight = self.inflight.lock();
            if inflight.as_ref().is_some_and(|i| i.id == request_id) {
                *inflight = None;
            }
        }

        match outcome {
            StreamOutcome::Completed => {
                self.emit(SessionEvent::TurnFinished { turn_id, cancelled: false });
                SendOutcome::Completed
            }
            StreamOutcome::Cancelled => {
                tracing::debug!(request_id = %request_id, "send cancelled");
                self.emit(SessionEvent::TurnFinished { turn_id, cancelled: true });
                SendOutcome::Cancelled
            }
            StreamOutcome::Failed(error) => {
                tracing::warn!(error = %error, kind = error.error_kind(), "send failed");
                self.emit(SessionEvent::SendFailed {
                    turn_id: turn_id.clone(),
                    kind: error.error_kind().into(),
                    message: error.to_string(),
                });
                self.emit(SessionEvent::TurnFinished { turn_id, cancelled: false });
                SendOutcome::Failed(error)
            }
        }
    }

    async fn run_stream(
        &self,
        text: &str,
        turn_id: &TurnId,
        cancel: &CancellationToken,
    ) -> StreamOutcome {
        let session_id = self.state.lock().session_id.clone();

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return StreamOutcome::Cancelled,
            opened = self.transport.send_message(text, session_id.as_ref()) => opened,
        };
        let mut message = match opened {
            Ok(message) => message,
            Err(error) => return StreamOutcome::Failed(error),
        };

        // Adopt the server-assigned session id, but never replace one we
        // already hold.
        if let Some(sid) = message.session_id.take() {
            let mut state = self.state.lock();
            if state.session_id.is_none() {
                tracing::debug!(session_id = %sid, "adopted server session id");
                state.session_id = Some(sid);
            }
        }

        let mut events = EventStream::new(message.bytes, self.config.idle_timeout);
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return StreamOutcome::Cancelled,
                next = events.next() => next,
            };
            match next {
                Some(Ok(event)) => self.apply_event(turn_id, &event),
                Some(Err(error)) if error.is_cancelled() => return StreamOutcome::Cancelled,
                Some(Err(error)) => return StreamOutcome::Failed(error),
                None => return StreamOutcome::Completed,
            }
        }
    }

    fn apply_event(&self, turn_id: &TurnId, event: &ChatEvent) {
        let applied = self.state.lock().transcript.apply(turn_id, event);
        if !applied {
            tracing::debug!(
                target_turn = %turn_id,
                event = event.event_type(),
                "event not applied"
            );
            return;
        }
        match event {
            ChatEvent::Text { content } => self.emit(SessionEvent::TextDelta {
                turn_id: turn_id.clone(),
                delta: content.clone(),
            }),
            ChatEvent::ToolUse { tool, .. } => self.emit(SessionEvent::ToolCallStarted {
                turn_id: turn_id.clone(),
                tool: tool.clone(),
            }),
            ChatEvent::ToolResult { tool, .. } => self.emit(SessionEvent::ToolCallResolved {
                turn_id: turn_id.clone(),
                tool: tool.clone(),
            }),
            // Wire errors are visible through the transcript annotation.
            ChatEvent::Error { .. } | ChatEvent::Unknown => {}
        }
    }

    /// Abort the in-flight send, if any. Graceful: no error is surfaced and
    /// the partial turn keeps whatever already arrived.
    pub fn cancel(&self) {
        let inflight = self.inflight.lock();
        if let Some(inflight) = inflight.as_ref() {
            tracing::debug!(request_id = %inflight.id, "cancelling in-flight send");
            inflight.token.cancel();
        }
    }

    /// Reset the transcript and error state. No network effect: the session
    /// id survives, and an in-flight stream keeps running; its late events
    /// miss their target turn and die as no-ops.
    pub fn clear(&self) {
        {
            let mut state = self.state.lock();
            state.transcript.clear();
            state.last_error = None;
        }
        self.emit(SessionEvent::SessionCleared);
    }

    /// Tell the server to drop the session, then forget the local id. The
    /// transcript stays visible until an explicit `clear`.
    #[instrument(skip(self))]
    pub async fn end_session(&self) -> Result<(), ChatError> {
        let Some(session_id) = self.state.lock().session_id.clone() else {
            return Err(ChatError::SessionMissing);
        };
        match self.transport.end_session(&session_id).await {
            Ok(()) => {
                self.state.lock().session_id = None;
                tracing::info!(session_id = %session_id, "session ended");
                Ok(())
            }
            Err(error) => {
                self.state.lock().last_error = Some(error.clone());
                Err(error)
            }
        }
    }

    /// Server-side metadata for the current session.
    pub async fn session_info(&self) -> Result<SessionInfo, ChatError> {
        let Some(session_id) = self.state.lock().session_id.clone() else {
            return Err(ChatError::SessionMissing);
        };
        self.transport.session_info(&session_id).await
    }

    fn emit(&self, event: SessionEvent) {
        // Observers are optional; a send with no receivers is fine.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_client::mock::{MockReply, MockTransport};
    use parley_core::turn::Role;
    use serde_json::json;

    fn controller(replies: Vec<MockReply>) -> (Arc<ChatController>, Arc<MockTransport>) {
        let transport = Arc::new(MockTransport::new(replies));
        let controller = Arc::new(ChatController::new(transport.clone()));
        (controller, transport)
    }

    async fn wait_for(
        rx: &mut broadcast::Receiver<SessionEvent>,
        event_type: &str,
    ) -> SessionEvent {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let event = rx.recv().await.expect("event channel open");
                if event.event_type() == event_type {
                    return event;
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    #[tokio::test]
    async fn send_accumulates_streamed_text() {
        let (controller, _) = controller(vec![MockReply::text(&["Hel", "lo"])]);

        let outcome = controller.send("hi").await;
        assert_eq!(outcome, SendOutcome::Completed);

        let state = controller.snapshot();
        assert!(!state.is_pending());
        assert!(state.last_error.is_none());

        let turns = state.transcript.turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].content, "hi");
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[1].content, "Hello");
    }

    #[tokio::test]
    async fn send_resolves_tool_roundtrip() {
        let (controller, _) = controller(vec![MockReply::Events(vec![
            ChatEvent::ToolUse { tool: "search".into(), input: json!({"q": "x"}) },
            ChatEvent::ToolResult { tool: "search".into(), output: json!("42") },
        ])]);

        assert_eq!(controller.send("run tool").await, SendOutcome::Completed);

        let state = controller.snapshot();
        let assistant = &state.transcript.turns()[1];
        assert_eq!(assistant.tool_calls.len(), 1);
        let tc = &assistant.tool_calls[0];
        assert_eq!(tc.name, "search");
        assert_eq!(tc.input, json!({"q": "x"}));
        assert_eq!(tc.output, Some(json!("42")));
    }

    #[tokio::test]
    async fn remote_error_sets_last_error_and_annotates_turn() {
        let (controller, _) = controller(vec![MockReply::Error(ChatError::from_status(
            500,
            "internal".into(),
        ))]);

        let outcome = controller.send("hi").await;
        assert!(matches!(outcome, SendOutcome::Failed(ChatError::Remote { status: 500, .. })));

        let state = controller.snapshot();
        assert!(!state.is_pending());
        assert!(
            matches!(&state.last_error, Some(ChatError::Remote { status: 500, .. })),
            "got: {:?}",
            state.last_error
        );
        let assistant = &state.transcript.turns()[1];
        assert!(assistant.content.contains("⚠️ Error:"), "got: {}", assistant.content);
    }

    #[tokio::test]
    async fn transport_error_mid_stream_keeps_partial_text() {
        let (controller, _) = controller(vec![MockReply::ThenError(
            vec![ChatEvent::Text { content: "par".into() }],
            ChatError::Transport("connection reset".into()),
        )]);

        let outcome = controller.send("hi").await;
        assert!(matches!(outcome, SendOutcome::Failed(ChatError::Transport(_))));

        let state = controller.snapshot();
        let assistant = &state.transcript.turns()[1];
        assert!(assistant.content.starts_with("par"));
        assert!(assistant.content.contains("⚠️ Error:"));
        assert!(matches!(state.last_error, Some(ChatError::Transport(_))));
    }

    #[tokio::test]
    async fn blank_send_is_rejected_without_turns() {
        let (controller, transport) = controller(vec![]);

        assert_eq!(controller.send("").await, SendOutcome::RejectedEmpty);
        assert_eq!(controller.send("   \n\t").await, SendOutcome::RejectedEmpty);

        assert!(controller.snapshot().transcript.is_empty());
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn send_while_pending_is_rejected_not_queued() {
        let (controller, transport) =
            controller(vec![MockReply::Stall(vec![ChatEvent::Text { content: "a".into() }])]);

        let mut rx = controller.subscribe();
        let background = controller.clone();
        let first = tokio::spawn(async move { background.send("first").await });

        wait_for(&mut rx, "text_delta").await;
        assert!(controller.is_pending());

        assert_eq!(controller.send("second").await, SendOutcome::RejectedBusy);
        assert_eq!(controller.snapshot().transcript.len(), 2);
        assert_eq!(transport.call_count(), 1);

        controller.cancel();
        assert_eq!(first.await.unwrap(), SendOutcome::Cancelled);
    }

    #[tokio::test]
    async fn cancel_terminates_silently() {
        let (controller, _) =
            controller(vec![MockReply::Stall(vec![ChatEvent::Text { content: "par".into() }])]);

        let mut rx = controller.subscribe();
        let background = controller.clone();
        let task = tokio::spawn(async move { background.send("hi").await });

        wait_for(&mut rx, "text_delta").await;
        controller.cancel();
        assert_eq!(task.await.unwrap(), SendOutcome::Cancelled);

        let state = controller.snapshot();
        assert!(!state.is_pending());
        assert!(state.last_error.is_none());
        // The partial turn keeps what arrived, with no error annotation.
        let assistant = &state.transcript.turns()[1];
        assert_eq!(assistant.content, "par");
    }

    #[tokio::test]
    async fn send_works_again_after_cancel() {
        let (controller, _) = controller(vec![
            MockReply::Stall(vec![ChatEvent::Text { content: "a".into() }]),
            MockReply::text(&["fresh"]),
        ]);

        let mut rx = controller.subscribe();
        let background = controller.clone();
        let first = tokio::spawn(async move { background.send("one").await });
        wait_for(&mut rx, "text_delta").await;
        controller.cancel();
        first.await.unwrap();

        assert_eq!(controller.send("two").await, SendOutcome::Completed);

        let state = controller.snapshot();
        assert_eq!(state.transcript.len(), 4);
        assert_eq!(state.transcript.turns()[3].content, "fresh");
        assert!(state.last_error.is_none());
    }

    #[tokio::test]
    async fn clear_is_idempotent_and_keeps_session_id() {
        let sid = SessionId::from_raw("sess-keep");
        let transport = Arc::new(
            MockTransport::new(vec![MockReply::text(&["hi"])]).with_header_session(sid.clone()),
        );
        let controller = ChatController::new(transport);

        controller.send("hello").await;
        assert_eq!(controller.snapshot().transcript.len(), 2);

        controller.clear();
        controller.clear();

        let state = controller.snapshot();
        assert!(state.transcript.is_empty());
        assert!(state.last_error.is_none());
        assert_eq!(state.session_id, Some(sid));
    }

    #[tokio::test]
    async fn clear_mid_flight_orphans_late_events() {
        let (controller, _) =
            controller(vec![MockReply::Stall(vec![ChatEvent::Text { content: "a".into() }])]);

        let mut rx = controller.subscribe();
        let background = controller.clone();
        let task = tokio::spawn(async move { background.send("hi").await });
        wait_for(&mut rx, "text_delta").await;

        controller.clear();
        assert!(controller.snapshot().transcript.is_empty());

        controller.cancel();
        task.await.unwrap();

        // The stale stream's turn never reappears.
        let state = controller.snapshot();
        assert!(state.transcript.is_empty());
        assert!(!state.is_pending());
    }

    #[tokio::test]
    async fn adopts_header_session_id_only_when_absent() {
        let header = SessionId::from_raw("sess-from-header");
        let transport = Arc::new(
            MockTransport::new(vec![MockReply::text(&["a"]), MockReply::text(&["b"])])
                .with_header_session(header.clone()),
        );
        let controller = ChatController::new(transport.clone());

        controller.send("first").await;
        assert_eq!(controller.snapshot().session_id, Some(header.clone()));

        // Second send carries the adopted id back to the server.
        controller.send("second").await;
        let (_, sent_sid) = transport.last_message().unwrap();
        assert_eq!(sent_sid, Some(header));
    }

    #[tokio::test]
    async fn explicit_session_start_wins_over_header() {
        let transport = Arc::new(
            MockTransport::new(vec![MockReply::text(&["a"])])
                .with_header_session(SessionId::from_raw("sess-header")),
        );
        let controller = ChatController::new(transport);

        let started = controller.start_session().await.unwrap();
        controller.send("hi").await;

        assert_eq!(controller.snapshot().session_id, Some(started));
    }

    #[tokio::test]
    async fn start_session_resets_transcript_and_error() {
        let (controller, _) = controller(vec![
            MockReply::Error(ChatError::from_status(500, "boom".into())),
        ]);

        controller.send("hi").await;
        assert!(controller.snapshot().last_error.is_some());
        assert_eq!(controller.snapshot().transcript.len(), 2);

        controller.start_session().await.unwrap();

        let state = controller.snapshot();
        assert!(state.transcript.is_empty());
        assert!(state.last_error.is_none());
        assert!(state.session_id.is_some());
    }

    #[tokio::test]
    async fn start_session_failure_leaves_prior_state() {
        let transport = Arc::new(
            MockTransport::new(vec![MockReply::text(&["hi"])])
                .with_start_error(ChatError::Transport("down".into())),
        );
        let controller = ChatController::new(transport);

        controller.send("hello").await;
        let before = controller.snapshot();

        let err = controller.start_session().await.unwrap_err();
        assert!(matches!(err, ChatError::Transport(_)));

        let after = controller.snapshot();
        assert_eq!(after.transcript.len(), before.transcript.len());
        assert_eq!(after.session_id, before.session_id);
        assert!(matches!(after.last_error, Some(ChatError::Transport(_))));
    }

    #[tokio::test]
    async fn end_session_requires_a_session() {
        let (controller, _) = controller(vec![]);
        assert_eq!(controller.end_session().await, Err(ChatError::SessionMissing));
    }

    #[tokio::test]
    async fn end_session_forgets_local_id() {
        let transport = Arc::new(
            MockTransport::new(vec![MockReply::text(&["hi"])])
                .with_header_session(SessionId::from_raw("sess-1")),
        );
        let controller = ChatController::new(transport);

        controller.send("hello").await;
        assert!(controller.snapshot().session_id.is_some());

        controller.end_session().await.unwrap();
        assert!(controller.snapshot().session_id.is_none());
        // Transcript survives until an explicit clear.
        assert_eq!(controller.snapshot().transcript.len(), 2);
    }

    #[tokio::test]
    async fn observer_sees_lifecycle_in_order() {
        let (controller, _) = controller(vec![MockReply::Events(vec![
            ChatEvent::Text { content: "hi".into() },
            ChatEvent::ToolUse { tool: "search".into(), input: json!({}) },
            ChatEvent::ToolResult { tool: "search".into(), output: json!("ok") },
        ])]);

        let mut rx = controller.subscribe();
        controller.send("go").await;

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(event.event_type().to_string());
        }
        assert_eq!(
            seen,
            vec![
                "turn_started",
                "text_delta",
                "tool_call_started",
                "tool_call_resolved",
                "turn_finished",
            ]
        );
    }

    #[tokio::test]
    async fn unmatched_tool_result_emits_nothing() {
        let (controller, _) = controller(vec![MockReply::Events(vec![ChatEvent::ToolResult {
            tool: "search".into(),
            output: json!("orphan"),
        }])]);

        let mut rx = controller.subscribe();
        controller.send("go").await;

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push(event.event_type().to_string());
        }
        assert_eq!(seen, vec!["turn_started", "turn_finished"]);

        let state = controller.snapshot();
        assert!(state.transcript.turns()[1].tool_calls.is_empty());
    }

    // End-to-end against a real HTTP server speaking the wire protocol.
    mod end_to_end {
        use super::*;
        use axum::body::Body;
        use axum::http::StatusCode;
        use axum::response::IntoResponse;
        use axum::routing::post;
        use axum::{Json, Router};
        use parley_client::{ClientConfig, HttpTransport};

        async fn message_handler(Json(body): Json<serde_json::Value>) -> axum::response::Response {
            if body["message"] == "fail" {
                return (StatusCode::INTERNAL_SERVER_ERROR, "agent unavailable").into_response();
            }
            let frames = concat!(
                "data: {\"type\":\"text\",\"content\":\"Hel\"}\n",
                "data: {\"type\":\"text\",\"content\":\"lo\"}\n",
                "data: {\"type\":\"done\"}\n",
            );
            ([("x-session-id", "sess-e2e")], Body::from(frames)).into_response()
        }

        async fn spawn_server() -> String {
            let router = Router::new()
                .route(
                    "/sessions",
                    post(|| async { Json(serde_json::json!({"session_id": "sess-new", "message_count": 0})) }),
                )
                .route("/message", post(message_handler));
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, router).await.ok();
            });
            format!("http://{addr}")
        }

        fn http_controller(base_url: String) -> ChatController {
            let transport = Arc::new(HttpTransport::new(ClientConfig {
                base_url,
                ..Default::default()
            }));
            ChatController::new(transport)
        }

        #[tokio::test]
        async fn streams_a_full_reply_over_http() {
            let controller = http_controller(spawn_server().await);

            assert_eq!(controller.send("hi").await, SendOutcome::Completed);

            let state = controller.snapshot();
            assert_eq!(state.transcript.turns()[1].content, "Hello");
            assert_eq!(state.session_id, Some(SessionId::from_raw("sess-e2e")));
            assert!(!state.is_pending());
            assert!(state.last_error.is_none());
        }

        #[tokio::test]
        async fn http_500_folds_into_session_state() {
            let controller = http_controller(spawn_server().await);

            let outcome = controller.send("fail").await;
            assert!(matches!(
                outcome,
                SendOutcome::Failed(ChatError::Remote { status: 500, .. })
            ));

            let state = controller.snapshot();
            assert!(matches!(&state.last_error, Some(ChatError::Remote { status: 500, .. })));
            assert!(state.transcript.turns()[1].content.contains("⚠️ Error:"));
            assert!(!state.is_pending());
        }

        #[tokio::test]
        async fn explicit_start_session_adopts_server_id() {
            let controller = http_controller(spawn_server().await);

            let sid = controller.start_session().await.unwrap();
            assert_eq!(sid, SessionId::from_raw("sess-new"));
            assert_eq!(controller.snapshot().session_id, Some(sid));
        }
    }
}
