//! Chat response types and usage accounting

use crate::{Content, Message, Role};
use serde::{Deserialize, Serialize};

/// Message content in a completion response
///
/// Used for both streaming deltas and non-streaming response messages.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Delta {
    /// The role of the message author
    pub role: Option<Role>,

    /// The content of the message
    pub content: Option<String>,
}

/// A chat completion response from the provider
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Response {
    /// A unique identifier for the completion
    #[serde(default)]
    pub id: String,

    /// The model used for the completion
    #[serde(default)]
    pub model: String,

    /// The list of completion choices
    #[serde(default)]
    pub choices: Vec<Choice>,

    /// Token usage statistics
    pub usage: Option<Usage>,
}

impl Response {
    /// The first choice as an assistant message
    pub fn message(&self) -> Option<Message> {
        let choice = self.choices.first()?;
        let role = choice
            .message
            .as_ref()
            .and_then(|m| m.role)
            .unwrap_or(Role::Assistant);
        Some(Message {
            role,
            content: Content::Text(self.content()?.to_owned()),
            name: None,
        })
    }

    /// Text of the first choice, chat or legacy completion shape
    pub fn content(&self) -> Option<&str> {
        let choice = self.choices.first()?;
        choice
            .message
            .as_ref()
            .and_then(|m| m.content.as_deref())
            .or(choice.text.as_deref())
    }

    /// Get the reason the model stopped generating
    pub fn reason(&self) -> Option<&FinishReason> {
        self.choices
            .first()
            .and_then(|choice| choice.finish_reason.as_ref())
    }
}

/// A completion choice in a non-streaming response
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Choice {
    /// The index of this choice in the list
    #[serde(default)]
    pub index: u32,

    /// The generated message (chat completions)
    pub message: Option<Delta>,

    /// The generated text (legacy completions)
    pub text: Option<String>,

    /// The reason the model stopped generating
    pub finish_reason: Option<FinishReason>,
}

/// The reason the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The model finished naturally
    Stop,

    /// The model hit the max token limit
    Length,

    /// Content was filtered
    ContentFilter,

    /// The model is making tool calls
    ToolCalls,

    /// Any reason this crate does not model
    #[serde(other)]
    Other,
}

/// Token usage statistics
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
pub struct Usage {
    /// Number of tokens in the prompt
    pub prompt_tokens: u32,

    /// Number of tokens in the completion
    pub completion_tokens: u32,

    /// Total number of tokens used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u32>,

    /// Detailed breakdown of completion tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens_details: Option<CompletionTokensDetails>,
}

impl Usage {
    /// Create a usage record without a completion breakdown.
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: None,
            completion_tokens_details: None,
        }
    }

    /// Attach a completion breakdown.
    pub fn with_details(mut self, details: CompletionTokensDetails) -> Self {
        self.completion_tokens_details = Some(details);
        self
    }

    /// Reconcile split reasoning/output accounting.
    ///
    /// Some providers report reasoning tokens separately from, yet
    /// overlapping with, the completion total. Without a reasoning figure
    /// the record is returned unchanged; otherwise the completion count
    /// becomes `|reasoning_tokens - completion_tokens|`. The formula is
    /// kept for billing compatibility even though the value has no clear
    /// meaning once reasoning exceeds the completion total.
    pub fn reconcile(&self) -> Self {
        let Some(reasoning) = self
            .completion_tokens_details
            .as_ref()
            .and_then(|details| details.reasoning_tokens)
        else {
            return self.clone();
        };

        Self {
            completion_tokens: reasoning.abs_diff(self.completion_tokens),
            ..self.clone()
        }
    }
}

/// Detailed breakdown of completion tokens
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
pub struct CompletionTokensDetails {
    /// Number of tokens used for reasoning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_tokens: Option<u32>,

    /// Number of remaining output tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_tokens: Option<u32>,
}
