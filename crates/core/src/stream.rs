//! Streaming response chunks

use crate::{Delta, FinishReason, Role, Usage};
use serde::Deserialize;

/// A streaming chat completion chunk
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StreamChunk {
    /// A unique identifier for the chat completion
    #[serde(default)]
    pub id: String,

    /// The object type, always "chat.completion.chunk"
    #[serde(default)]
    pub object: String,

    /// Unix timestamp (in seconds) of when the chunk was created
    #[serde(default)]
    pub created: u64,

    /// The model used for the completion
    #[serde(default)]
    pub model: String,

    /// The list of completion choices (with delta content)
    #[serde(default)]
    pub choices: Vec<StreamChoice>,

    /// Token usage statistics (only in final chunk)
    pub usage: Option<Usage>,
}

impl StreamChunk {
    /// Create a chunk carrying a text delta
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            choices: vec![StreamChoice {
                delta: Delta {
                    content: Some(content.into()),
                    ..Default::default()
                },
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    /// Create a trailing chunk carrying only usage
    pub fn usage(usage: Usage) -> Self {
        Self {
            usage: Some(usage),
            ..Default::default()
        }
    }

    /// Get the content of the first choice
    ///
    /// Legacy completions stream `text` instead of a delta.
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.delta.content.as_deref().or(c.text.as_deref()))
            .filter(|s| !s.is_empty())
    }

    /// Get the role announced by the first choice
    pub fn role(&self) -> Option<Role> {
        self.choices.first().and_then(|c| c.delta.role)
    }

    /// Get the reason the model stopped generating
    pub fn reason(&self) -> Option<&FinishReason> {
        self.choices
            .first()
            .and_then(|choice| choice.finish_reason.as_ref())
    }
}

/// A choice inside a streaming chunk
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StreamChoice {
    /// The index of this choice in the list
    #[serde(default)]
    pub index: u32,

    /// The incremental message content
    #[serde(default)]
    pub delta: Delta,

    /// The generated text (legacy completions)
    pub text: Option<String>,

    /// The reason the model stopped generating
    pub finish_reason: Option<FinishReason>,
}
