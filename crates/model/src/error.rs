//! Errors surfaced by the adapter.

use compact_str::CompactString;

/// Adapter error.
///
/// Capability mismatches are not errors, see [`crate::VisionCheck`];
/// stream failures surface through [`crate::StreamEvent::Errored`].
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The options cannot describe a usable target.
    #[error("invalid configuration: {0}")]
    Config(CompactString),
    /// The fixed part of the prompt alone exceeds the budget.
    #[error("prompt requires {tokens} tokens but the budget is {max}")]
    InputLength { tokens: usize, max: usize },
    /// The summarizer failed to condense dropped history.
    #[error("failed to summarize history: {0}")]
    Summarize(anyhow::Error),
    /// The transport failed a non-streaming call.
    #[error("transport error: {0}")]
    Transport(anyhow::Error),
}

impl Error {
    pub(crate) fn config(message: impl Into<CompactString>) -> Self {
        Self::Config(message.into())
    }
}

/// Adapter result.
pub type Result<T> = std::result::Result<T, Error>;
