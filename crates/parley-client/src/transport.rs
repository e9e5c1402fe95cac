use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use serde::Deserialize;
use tracing::instrument;

use parley_core::errors::ChatError;
use parley_core::ids::SessionId;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

const SESSION_HEADER: &str = "x-session-id";

/// Configuration for the HTTP transport.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL of the chat API, e.g. `http://127.0.0.1:8000/api/chat`.
    pub base_url: String,
    pub connect_timeout: Duration,
    /// How long a response stream may go silent before it is treated as
    /// interrupted.
    pub idle_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/api/chat".into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// Session metadata returned by the session endpoints.
#[derive(Clone, Debug, Deserialize)]
pub struct SessionInfo {
    pub session_id: SessionId,
    #[serde(default)]
    pub message_count: u64,
}

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ChatError>> + Send>>;

/// An open response stream plus the session id the server attached to it,
/// recovered from the response headers before any body bytes are read.
pub struct MessageStream {
    pub session_id: Option<SessionId>,
    pub bytes: ByteStream,
}

impl std::fmt::Debug for MessageStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageStream")
            .field("session_id", &self.session_id)
            .field("bytes", &"<stream>")
            .finish()
    }
}

/// Seam between the session controller and the network. The HTTP
/// implementation below is the real one; tests substitute `MockTransport`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn start_session(&self) -> Result<SessionInfo, ChatError>;

    async fn send_message(
        &self,
        message: &str,
        session_id: Option<&SessionId>,
    ) -> Result<MessageStream, ChatError>;

    async fn end_session(&self, session_id: &SessionId) -> Result<(), ChatError>;

    async fn session_info(&self, session_id: &SessionId) -> Result<SessionInfo, ChatError>;
}

/// reqwest-backed transport speaking the chat API.
pub struct HttpTransport {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .connect_timeout(config.connect_timeout)
                .build()
                .expect("failed to build HTTP client"),
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Reject non-2xx responses before anything touches the body stream.
    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ChatError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Err(ChatError::from_status(status, body))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self))]
    async fn start_session(&self) -> Result<SessionInfo, ChatError> {
        let resp = self
            .client
            .post(self.url("/sessions"))
            .send()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;
        let resp = Self::check_status(resp).await?;
        resp.json::<SessionInfo>()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))
    }

    #[instrument(skip(self, message), fields(len = message.len()))]
    async fn send_message(
        &self,
        message: &str,
        session_id: Option<&SessionId>,
    ) -> Result<MessageStream, ChatError> {
        let body = serde_json::json!({
            "message": message,
            "session_id": session_id,
        });

        let resp = self
            .client
            .post(self.url("/message"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;
        let resp = Self::check_status(resp).await?;

        let session_id = resp
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(SessionId::from_raw);

        let bytes: ByteStream = Box::pin(
            resp.bytes_stream()
                .map_err(|e| ChatError::Transport(e.to_string())),
        );

        Ok(MessageStream { session_id, bytes })
    }

    #[instrument(skip(self), fields(session_id = %session_id))]
    async fn end_session(&self, session_id: &SessionId) -> Result<(), ChatError> {
        let resp = self
            .client
            .delete(self.url(&format!("/sessions/{session_id}")))
            .send()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;
        Self::check_status(resp).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(session_id = %session_id))]
    async fn session_info(&self, session_id: &SessionId) -> Result<SessionInfo, ChatError> {
        let resp = self
            .client
            .get(self.url(&format!("/sessions/{session_id}")))
            .send()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;
        let resp = Self::check_status(resp).await?;
        resp.json::<SessionInfo>()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))
    }
}
