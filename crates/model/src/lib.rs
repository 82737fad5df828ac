//! OpenAI-compatible prompt assembly, token accounting and streaming.
//!
//! Resolves the request target from [`ClientOptions`], counts tokens the
//! way the provider does, routes image requests to vision models, fits
//! stored conversations into the context window, and drives streamed
//! completions through a cancellable [`StreamHandle`].

pub use assemble::{
    Built, INSTRUCTIONS_KEY, Payload, SUMMARY_KEY, TokenCountMap, Window, assemble,
    format_message, sanitize_name,
};
pub use client::Client;
pub use endpoint::{Resolved, resolve};
pub use error::{Error, Result};
pub use http::{HttpProvider, SseBuffer};
pub use limits::default_context_limit;
pub use options::{
    AzureOptions, BuildOptions, ClientOptions, ContextStrategy, Environment, ModelOptions,
    SaveOptions,
};
pub use stream::{AbortHandle, StreamError, StreamEvent, StreamHandle, StreamState};
pub use tokenizer::{Bpe, Overhead, REPLY_PRIMING, TokenCounter, Tokenizer, image_tokens};
pub use vision::{VisionCheck, check_vision, is_vision_model};

mod assemble;
mod client;
pub mod endpoint;
mod error;
mod http;
mod limits;
mod options;
mod stream;
pub mod tokenizer;
mod vision;
