//! Streaming completion handle.
//!
//! [`StreamHandle`] drives a transport stream through an explicit state
//! machine: `Idle -> Active -> Completed | Errored | Aborted`. Exactly one
//! terminal event is produced per handle. Cancellation is cooperative
//! through a [`CancellationToken`] and drops the transport stream, which
//! cancels the underlying request.

use futures_core::Stream;
use futures_util::StreamExt;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;
use wcore::{Message, MessageBuilder, Role, StreamChunk, Usage};

type ChunkStream = Pin<Box<dyn Stream<Item = anyhow::Result<StreamChunk>> + Send>>;

/// Lifecycle of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Nothing read yet.
    Idle,
    /// Chunks are being delivered.
    Active,
    /// The transport finished and the message is complete.
    Completed,
    /// The transport failed.
    Errored,
    /// The caller cancelled the stream.
    Aborted,
}

impl StreamState {
    /// Whether the state is final.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Errored | Self::Aborted)
    }
}

/// Something observed on a stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Incremental text.
    Delta(String),
    /// The assembled reply; terminal.
    Completed(Message),
    /// The transport failure; terminal.
    Errored(String),
    /// Acknowledgment of a cancellation; terminal.
    Aborted,
}

/// Reads from a stream that already failed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The stream ended with a transport failure.
    #[error("stream failed: {0}")]
    Errored(String),
}

/// Cancels a [`StreamHandle`] from another task.
#[derive(Debug, Clone)]
pub struct AbortHandle(CancellationToken);

impl AbortHandle {
    /// Request cancellation. Has no effect once the stream is terminal.
    pub fn abort(&self) {
        self.0.cancel();
    }
}

/// A live, cancellable streamed completion.
pub struct StreamHandle {
    inner: Option<ChunkStream>,
    state: StreamState,
    builder: MessageBuilder,
    usage: Option<Usage>,
    error: Option<String>,
    cancel: CancellationToken,
    ack_pending: bool,
}

impl StreamHandle {
    /// Wrap a transport stream.
    pub fn new(stream: impl Stream<Item = anyhow::Result<StreamChunk>> + Send + 'static) -> Self {
        Self {
            inner: Some(Box::pin(stream)),
            state: StreamState::Idle,
            builder: MessageBuilder::new(Role::Assistant),
            usage: None,
            error: None,
            cancel: CancellationToken::new(),
            ack_pending: false,
        }
    }

    /// Current state.
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Handle that cancels this stream from elsewhere.
    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle(self.cancel.clone())
    }

    /// Cancel the stream.
    ///
    /// Idempotent: aborting a terminal stream is a no-op. The next read
    /// after a successful abort yields [`StreamEvent::Aborted`] once.
    pub fn abort(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.abort_now();
        self.ack_pending = true;
    }

    /// Read the next event.
    ///
    /// After `Completed` or `Aborted` every read returns `Ok(None)`; after
    /// `Errored` every read fails with [`StreamError::Errored`].
    pub async fn next_event(&mut self) -> Result<Option<StreamEvent>, StreamError> {
        match self.state {
            StreamState::Completed => return Ok(None),
            StreamState::Aborted => {
                let ack = std::mem::take(&mut self.ack_pending);
                return Ok(ack.then_some(StreamEvent::Aborted));
            }
            StreamState::Errored => {
                return Err(StreamError::Errored(self.error.clone().unwrap_or_default()));
            }
            StreamState::Idle | StreamState::Active => {}
        }

        loop {
            let polled = match self.inner.as_mut() {
                Some(inner) => tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => None,
                    next = inner.next() => Some(next),
                },
                None => return Ok(Some(self.complete())),
            };
            let Some(next) = polled else {
                tracing::debug!("stream aborted");
                self.abort_now();
                return Ok(Some(StreamEvent::Aborted));
            };
            self.state = StreamState::Active;

            match next {
                Some(Ok(chunk)) => {
                    tracing::trace!("chunk: {chunk:?}");
                    if let Some(usage) = &chunk.usage {
                        self.usage = Some(usage.clone());
                    }
                    if let Some(text) = self.builder.accept(&chunk) {
                        return Ok(Some(StreamEvent::Delta(text.to_owned())));
                    }
                }
                Some(Err(e)) => {
                    let message = e.to_string();
                    tracing::warn!("stream failed: {message}");
                    self.inner = None;
                    self.state = StreamState::Errored;
                    self.error = Some(message.clone());
                    return Ok(Some(StreamEvent::Errored(message)));
                }
                None => return Ok(Some(self.complete())),
            }
        }
    }

    /// Consume the handle as a single-pass stream of text fragments.
    ///
    /// Ends after completion or abort; yields the failure once and ends
    /// when the transport fails.
    pub fn into_text(mut self) -> impl Stream<Item = Result<String, StreamError>> + Send {
        async_stream::stream! {
            loop {
                match self.next_event().await {
                    Ok(Some(StreamEvent::Delta(text))) => yield Ok(text),
                    Ok(Some(StreamEvent::Errored(message))) => {
                        yield Err(StreamError::Errored(message));
                        break;
                    }
                    Ok(Some(StreamEvent::Completed(_) | StreamEvent::Aborted)) | Ok(None) => break,
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        }
    }

    /// Text received so far.
    pub fn content(&self) -> &str {
        self.builder.content()
    }

    /// Usage as reported by the provider's final chunk.
    pub fn usage(&self) -> Option<&Usage> {
        self.usage.as_ref()
    }

    /// Usage reconciled for split reasoning accounting.
    pub fn stream_usage(&self) -> Option<Usage> {
        self.usage.as_ref().map(Usage::reconcile)
    }

    fn complete(&mut self) -> StreamEvent {
        self.inner = None;
        self.state = StreamState::Completed;
        StreamEvent::Completed(self.builder.clone().build())
    }

    fn abort_now(&mut self) {
        self.cancel.cancel();
        self.inner = None;
        self.state = StreamState::Aborted;
    }
}
