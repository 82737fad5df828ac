//! Collaborator traits consumed by the adapter.

use crate::{Message, Request, Response, StreamChunk};
use anyhow::Result;
use futures_core::Stream;

/// Completion transport.
///
/// Abstracts the network call to an OpenAI-compatible provider. The
/// returned stream owns everything it needs, so dropping it cancels the
/// underlying request.
pub trait Model: Sized + Clone {
    /// Send a completion request.
    fn send(&self, request: &Request) -> impl Future<Output = Result<Response>> + Send;

    /// Stream a completion response.
    fn stream(
        &self,
        request: Request,
    ) -> impl Stream<Item = Result<StreamChunk>> + Send + 'static;

    /// Post subsequent requests to `endpoint`.
    ///
    /// Called when the target changes with the model, e.g. an Azure
    /// deployment named after it. Transports without a URL ignore it.
    fn set_endpoint(&mut self, _endpoint: &str) {}
}

/// A synthetic message standing in for refined history.
#[derive(Debug, Clone)]
pub struct Summary {
    /// The message placed in front of the kept context
    pub message: Message,
    /// Its token cost
    pub token_count: usize,
}

/// Condenses messages that fell outside the context budget.
pub trait Summarizer {
    /// Summarize `dropped` (oldest first) into one message whose cost
    /// should not exceed `budget` tokens.
    fn summarize(
        &self,
        dropped: &[Message],
        budget: usize,
    ) -> impl Future<Output = Result<Summary>> + Send;
}

/// `()` refuses to summarize; use it with the truncate strategy.
impl Summarizer for () {
    async fn summarize(&self, _dropped: &[Message], _budget: usize) -> Result<Summary> {
        anyhow::bail!("no summarizer configured")
    }
}
