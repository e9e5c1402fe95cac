use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;

use parley_core::errors::ChatError;
use parley_core::event::ChatEvent;

use crate::transport::ByteStream;

const DATA_PREFIX: &str = "data: ";

/// Line-buffering frame decoder.
///
/// Chunks arrive with no relation to frame boundaries; a frame is one
/// newline-terminated line. Bytes after the last newline are carried until
/// the next chunk (or `finish`). Lines without the `data: ` prefix are wire
/// comments and skipped; a `data: ` payload that fails to parse is skipped
/// too, never fatal to the stream.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    carry: String,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one chunk, yielding every event whose frame is now complete.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<ChatEvent> {
        self.carry.push_str(&String::from_utf8_lossy(chunk));

        let mut events = Vec::new();
        while let Some(pos) = self.carry.find('\n') {
            let line: String = self.carry.drain(..=pos).collect();
            if let Some(event) = decode_frame(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush the trailing partial line once the underlying stream has ended.
    pub fn finish(&mut self) -> Vec<ChatEvent> {
        let rest = std::mem::take(&mut self.carry);
        decode_frame(&rest).into_iter().collect()
    }
}

fn decode_frame(line: &str) -> Option<ChatEvent> {
    let line = line.trim_end_matches(['\n', '\r']);
    let payload = line.strip_prefix(DATA_PREFIX)?;
    match serde_json::from_str::<ChatEvent>(payload) {
        Ok(ChatEvent::Unknown) => {
            tracing::debug!(payload, "ignoring frame with unrecognized tag");
            None
        }
        Ok(event) => Some(event),
        Err(error) => {
            tracing::debug!(%error, "skipping malformed frame");
            None
        }
    }
}

/// Adapter from the transport's byte stream to a stream of decoded events.
///
/// Finite and not restartable: it ends when the byte stream ends, errors, or
/// goes idle past the timeout. After yielding an error it is fused.
pub struct EventStream {
    inner: ByteStream,
    decoder: FrameDecoder,
    ready: VecDeque<ChatEvent>,
    idle_deadline: Pin<Box<tokio::time::Sleep>>,
    idle_duration: Duration,
    done: bool,
}

impl EventStream {
    pub fn new(bytes: ByteStream, idle_timeout: Duration) -> Self {
        Self {
            inner: bytes,
            decoder: FrameDecoder::new(),
            ready: VecDeque::new(),
            idle_deadline: Box::pin(tokio::time::sleep(idle_timeout)),
            idle_duration: idle_timeout,
            done: false,
        }
    }
}

impl Stream for EventStream {
    type Item = Result<ChatEvent, ChatError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if let Some(event) = this.ready.pop_front() {
            return Poll::Ready(Some(Ok(event)));
        }
        if this.done {
            return Poll::Ready(None);
        }

        loop {
            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    // Data received, reset the idle timer.
                    let deadline = tokio::time::Instant::now() + this.idle_duration;
                    this.idle_deadline.as_mut().reset(deadline);

                    this.ready.extend(this.decoder.feed(&bytes));
                    if let Some(event) = this.ready.pop_front() {
                        return Poll::Ready(Some(Ok(event)));
                    }
                }
                Poll::Ready(Some(Err(error))) => {
                    this.done = true;
                    return Poll::Ready(Some(Err(error)));
                }
                Poll::Ready(None) => {
                    // Stream ended, flush whatever the decoder still holds.
                    this.done = true;
                    this.ready.extend(this.decoder.finish());
                    return match this.ready.pop_front() {
                        Some(event) => Poll::Ready(Some(Ok(event))),
                        None => Poll::Ready(None),
                    };
                }
                Poll::Pending => {
                    if this.idle_deadline.as_mut().poll(cx).is_ready() {
                        this.done = true;
                        return Poll::Ready(Some(Err(ChatError::Transport(format!(
                            "idle timeout after {}s",
                            this.idle_duration.as_secs()
                        )))));
                    }
                    return Poll::Pending;
                }
            }
        }
    }
}
