//! Streaming translator
//!
//! Reads an upstream Server-Sent-Events body line by line, forwards each
//! `data:` frame downstream as soon as it is complete and accumulates the
//! text and usage needed for accounting at stream end.

use crate::models::openai::ChatCompletionsStreamResponse;
use crate::models::Usage;
use crate::utils::error::helpers::stream_error;
use crate::utils::error::{ErrorContext, RelayResult};
use crate::utils::logging::RelayObserver;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Stream termination sentinel
pub const DONE: &str = "[DONE]";

/// Downstream half of a streamed relay
///
/// Frames are written to a bounded channel; a full channel suspends the
/// upstream reader.
#[derive(Debug, Clone)]
pub struct FrameSink {
    tx: mpsc::Sender<Bytes>,
}

impl FrameSink {
    pub fn new(tx: mpsc::Sender<Bytes>) -> Self {
        Self { tx }
    }

    /// Create a sink and the receiver the response body is built from
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self::new(tx), rx)
    }

    /// Write one `data: <payload>\n\n` event
    pub async fn send_data(&self, payload: &str) -> RelayResult<()> {
        self.tx
            .send(Bytes::from(format!("data: {}\n\n", payload)))
            .await
            .stream_context("downstream connection closed")
    }

    /// Resolves once the caller has gone away
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

/// Lifecycle of one streamed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Connecting,
    Streaming,
    Completed,
    Failed,
}

/// What the stream left behind for accounting
#[derive(Debug, Clone, Default)]
pub struct StreamSummary {
    /// Concatenated content fragments, in arrival order
    pub response_text: String,
    /// Last usage object reported by the vendor, if any
    pub usage: Option<Usage>,
    /// `data:` frames forwarded, excluding the sentinel
    pub frames_forwarded: usize,
    /// Whether the vendor sent its own sentinel
    pub upstream_done: bool,
}

/// Longest line accepted from an upstream body
pub const MAX_LINE_BYTES: usize = 4 * 1024 * 1024;

/// Splits a byte stream into lines without losing partial ones
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
    // Bytes of `pending` already known to hold no newline
    scanned: usize,
}

impl LineBuffer {
    /// Append a chunk and drain every complete line
    ///
    /// Fails once an unterminated line grows past `MAX_LINE_BYTES`.
    pub fn push(&mut self, chunk: &[u8]) -> RelayResult<Vec<String>> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[start + self.scanned..].iter().position(|&b| b == b'\n') {
            let end = start + self.scanned + offset;
            lines.push(decode_line(&self.pending[start..end]));
            start = end + 1;
            self.scanned = 0;
        }
        self.pending.drain(..start);
        self.scanned = self.pending.len();

        if self.pending.len() > MAX_LINE_BYTES {
            return Err(stream_error(format!(
                "upstream line exceeds {} bytes without a terminator",
                MAX_LINE_BYTES
            )));
        }
        Ok(lines)
    }

    /// Remaining unterminated line, if any
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        self.scanned = 0;
        let raw = std::mem::take(&mut self.pending);
        Some(decode_line(&raw))
    }
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// Outcome of feeding one line
enum LineOutcome {
    Continue,
    Done,
}

/// Translates one upstream SSE body to canonical frames
pub struct StreamTranslator {
    sink: FrameSink,
    observer: Arc<dyn RelayObserver>,
    state: StreamState,
    summary: StreamSummary,
}

impl StreamTranslator {
    pub fn new(sink: FrameSink, observer: Arc<dyn RelayObserver>) -> Self {
        Self {
            sink,
            observer,
            state: StreamState::Connecting,
            summary: StreamSummary::default(),
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Consume the upstream body until the sentinel, EOF, or an error
    ///
    /// A caller that disconnects aborts the read promptly and drops the
    /// upstream body.
    pub async fn run<S, E>(mut self, upstream: S) -> RelayResult<StreamSummary>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: std::fmt::Display,
    {
        let mut upstream = upstream;
        let mut lines = LineBuffer::default();
        self.state = StreamState::Streaming;

        loop {
            let next = tokio::select! {
                biased;
                _ = self.sink.closed() => {
                    return self.fail("client disconnected".to_string());
                }
                next = upstream.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    let complete = match lines.push(&chunk) {
                        Ok(complete) => complete,
                        Err(e) => return self.fail(e.to_string()),
                    };
                    for line in complete {
                        if let Err(e) = self.handle_line(&line).await {
                            return self.fail(e.to_string());
                        }
                        if self.summary.upstream_done {
                            return Ok(self.complete());
                        }
                    }
                }
                Some(Err(e)) => {
                    return self.fail(format!("failed to read upstream stream: {}", e));
                }
                None => break,
            }
        }

        if let Some(line) = lines.finish() {
            if let Err(e) = self.handle_line(&line).await {
                return self.fail(e.to_string());
            }
        }

        if !self.summary.upstream_done {
            debug!("Upstream closed without a terminator, sending one");
            if let Err(e) = self.sink.send_data(DONE).await {
                return self.fail(e.to_string());
            }
        }

        Ok(self.complete())
    }

    async fn handle_line(&mut self, line: &str) -> RelayResult<()> {
        match self.feed(line).await? {
            LineOutcome::Continue => Ok(()),
            LineOutcome::Done => {
                self.summary.upstream_done = true;
                Ok(())
            }
        }
    }

    async fn feed(&mut self, line: &str) -> RelayResult<LineOutcome> {
        let payload = match line.strip_prefix("data:") {
            Some(payload) => payload.trim_start(),
            None => return Ok(LineOutcome::Continue),
        };
        self.observer.on_stream_frame(line);

        if payload.starts_with(DONE) {
            self.sink.send_data(DONE).await?;
            return Ok(LineOutcome::Done);
        }

        match serde_json::from_str::<ChatCompletionsStreamResponse>(payload) {
            Ok(chunk) => {
                for choice in &chunk.choices {
                    if let Some(content) = choice.delta.content.as_deref().or(choice.text.as_deref()) {
                        self.summary.response_text.push_str(content);
                    }
                }
                if chunk.usage.is_some() {
                    self.summary.usage = chunk.usage;
                }
            }
            Err(e) => {
                warn!("Failed to parse stream frame, forwarding as-is: {}", e);
            }
        }

        self.sink.send_data(payload).await?;
        self.summary.frames_forwarded += 1;
        Ok(LineOutcome::Continue)
    }

    fn complete(mut self) -> StreamSummary {
        self.state = StreamState::Completed;
        debug!(
            frames = self.summary.frames_forwarded,
            text_len = self.summary.response_text.len(),
            "Stream completed"
        );
        self.summary
    }

    fn fail(&mut self, reason: String) -> RelayResult<StreamSummary> {
        self.state = StreamState::Failed;
        warn!(
            frames = self.summary.frames_forwarded,
            "Stream failed after partial delivery: {}", reason
        );
        Err(stream_error(reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::RelayError;
    use crate::utils::logging::NoopObserver;

    #[test]
    fn test_line_buffer_split_across_chunks() {
        let mut buffer = LineBuffer::default();
        assert!(buffer.push(b"data: {\"a\"").unwrap().is_empty());
        assert_eq!(
            buffer.push(b":1}\r\n\ndata: x").unwrap(),
            vec!["data: {\"a\":1}".to_string(), String::new()]
        );
        assert_eq!(buffer.finish(), Some("data: x".to_string()));
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn test_line_buffer_multibyte_boundary() {
        let text = "data: 你好\n".as_bytes();
        let mut buffer = LineBuffer::default();
        assert!(buffer.push(&text[..8]).unwrap().is_empty());
        assert_eq!(buffer.push(&text[8..]).unwrap(), vec!["data: 你好".to_string()]);
    }

    #[test]
    fn test_line_buffer_long_line_across_many_chunks() {
        let mut buffer = LineBuffer::default();
        let piece = [b'x'; 1024];
        for _ in 0..64 {
            assert!(buffer.push(&piece).unwrap().is_empty());
        }
        let lines = buffer.push(b"\ndata: y\n").unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), 64 * 1024);
        assert_eq!(lines[1], "data: y");
    }

    #[test]
    fn test_line_buffer_rejects_unterminated_line() {
        let mut buffer = LineBuffer::default();
        let chunk = vec![b'x'; MAX_LINE_BYTES / 2];
        assert!(buffer.push(&chunk).is_ok());
        assert!(buffer.push(&chunk).is_ok());
        assert!(matches!(buffer.push(b"x"), Err(RelayError::Stream(_))));
    }

    #[tokio::test]
    async fn test_unterminated_upstream_line_fails_stream() {
        let (sink, _rx) = FrameSink::channel(4);
        let chunk = Bytes::from(vec![b'x'; MAX_LINE_BYTES + 1]);
        let upstream = futures::stream::iter(vec![Ok::<_, std::io::Error>(chunk)]);

        let result = StreamTranslator::new(sink, Arc::new(NoopObserver)).run(upstream).await;
        assert!(matches!(result, Err(RelayError::Stream(_))));
    }

    #[tokio::test]
    async fn test_send_to_closed_sink_is_stream_error() {
        let (sink, rx) = FrameSink::channel(1);
        drop(rx);

        match sink.send_data("{}").await {
            Err(RelayError::Stream(message)) => assert!(message.starts_with("downstream connection closed")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_disconnected_caller_fails_stream() {
        let (sink, rx) = FrameSink::channel(4);
        drop(rx);
        let upstream = futures::stream::pending::<Result<Bytes, std::io::Error>>();
        let translator = StreamTranslator::new(sink, Arc::new(NoopObserver));
        assert_eq!(translator.state(), StreamState::Connecting);

        let result = translator.run(upstream).await;
        assert!(matches!(result, Err(RelayError::Stream(_))));
    }
}
