//! Message window assembly.
//!
//! Reconstructs the conversation ending at a leaf message and fits it
//! into the prompt budget. The newest message is always sent. Older
//! messages are kept newest first while they fit; the rest are dropped
//! or, under [`ContextStrategy::Summarize`], replaced by one summary
//! message covering every dropped message. When the summary does not fit,
//! more history is evicted and summarized again.

use crate::{
    ContextStrategy, Error, Result,
    tokenizer::{REPLY_PRIMING, TokenCounter, Tokenizer},
};
use compact_str::CompactString;
use std::collections::BTreeMap;
use wcore::{
    Content, ContentPart, History, ImageDetail, ImageUrl, Message, Role, StoredMessage,
    Summarizer, Summary, ancestors,
};

/// Token ledger of one assembly, keyed by message id.
pub type TokenCountMap = BTreeMap<CompactString, usize>;

/// Ledger key of the instructions message.
pub const INSTRUCTIONS_KEY: &str = "instructions";

/// Ledger key of the summary message.
pub const SUMMARY_KEY: &str = "summary";

/// Longest participant name providers accept.
pub const MAX_NAME_LEN: usize = 64;

/// The prompt sent to the provider.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Chat completions messages.
    Chat(Vec<Message>),
    /// A single legacy completions prompt.
    Text(String),
}

impl Payload {
    /// Whether nothing would be sent.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Chat(messages) => messages.is_empty(),
            Self::Text(text) => text.is_empty(),
        }
    }

    /// Chat messages, empty for a legacy prompt.
    pub fn messages(&self) -> &[Message] {
        match self {
            Self::Chat(messages) => messages,
            Self::Text(_) => &[],
        }
    }
}

/// Budget and formatting of one assembly.
#[derive(Debug, Clone, Default)]
pub struct Window {
    /// Tokens the prompt may occupy, reply priming included
    pub max_prompt_tokens: usize,
    /// Handling of history that does not fit
    pub strategy: ContextStrategy,
    /// Instructions placed before the conversation
    pub prompt_prefix: Option<String>,
    /// Name attached to user messages
    pub user_name: Option<String>,
    /// Name attached to assistant messages
    pub assistant_label: Option<String>,
    /// Detail requested for attached images
    pub image_detail: ImageDetail,
    /// Produce chat messages rather than a legacy prompt
    pub is_chat_completion: bool,
}

/// Result of an assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct Built {
    /// The prompt
    pub payload: Payload,
    /// Cost of every message in the chain, plus instructions and summary
    pub token_count_map: TokenCountMap,
    /// Cost of the prompt as sent, reply priming included
    pub prompt_tokens: usize,
}

impl Built {
    fn empty(chat: bool) -> Self {
        Self {
            payload: if chat {
                Payload::Chat(Vec::new())
            } else {
                Payload::Text(String::new())
            },
            token_count_map: TokenCountMap::new(),
            prompt_tokens: 0,
        }
    }
}

/// Assemble the prompt for the conversation ending at `leaf`.
pub async fn assemble<H, T, S>(
    history: &H,
    leaf: &str,
    window: &Window,
    counter: &TokenCounter<T>,
    summarizer: &S,
) -> Result<Built>
where
    H: History + ?Sized,
    T: Tokenizer,
    S: Summarizer,
{
    let chain = ancestors(history, leaf);
    if chain.is_empty() {
        return Ok(Built::empty(window.is_chat_completion));
    }

    let max = window.max_prompt_tokens;
    let messages: Vec<Message> = chain.iter().map(|m| format_message(m, window)).collect();
    let costs: Vec<usize> = chain
        .iter()
        .zip(&messages)
        .map(|(stored, message)| {
            stored
                .token_count
                .unwrap_or_else(|| counter.count_message(message))
        })
        .collect();
    let mut token_count_map: TokenCountMap = chain
        .iter()
        .zip(&costs)
        .map(|(stored, cost)| (stored.id.clone(), *cost))
        .collect();

    let instructions = window
        .prompt_prefix
        .as_deref()
        .map(str::trim)
        .filter(|prefix| !prefix.is_empty())
        .map(|prefix| Message::system(format!("Instructions:\n{prefix}")));
    let mut used = REPLY_PRIMING;
    if let Some(instructions) = &instructions {
        let cost = counter.count_message(instructions);
        used += cost;
        token_count_map.insert(INSTRUCTIONS_KEY.into(), cost);
    }
    if used > max {
        return Err(Error::InputLength { tokens: used, max });
    }

    let newest = messages.len() - 1;
    let mut start = messages.len();
    for index in (0..messages.len()).rev() {
        if index < newest && used + costs[index] > max {
            break;
        }
        used += costs[index];
        start = index;
    }
    if used > max {
        tracing::warn!("newest message alone exceeds the prompt budget: {used} > {max}");
    }

    let mut summary = None;
    if start > 0 {
        match window.strategy {
            ContextStrategy::Truncate => {
                tracing::debug!("dropped {start} messages outside the {max} token budget");
            }
            ContextStrategy::Summarize => {
                let mut refined =
                    summarize(summarizer, &messages[..start], max.saturating_sub(used)).await?;
                while used + refined.token_count > max {
                    if start == newest {
                        return Err(Error::InputLength {
                            tokens: used + refined.token_count,
                            max,
                        });
                    }
                    while used + refined.token_count > max && start < newest {
                        used -= costs[start];
                        start += 1;
                    }
                    tracing::debug!(
                        "summary of {} tokens evicted history down to {} messages",
                        refined.token_count,
                        messages.len() - start
                    );
                    refined =
                        summarize(summarizer, &messages[..start], max.saturating_sub(used))
                            .await?;
                }
                used += refined.token_count;
                token_count_map.insert(SUMMARY_KEY.into(), refined.token_count);
                summary = Some(refined.message);
            }
        }
    }

    tracing::debug!(
        "assembled {} of {} messages in {used} tokens",
        messages.len() - start,
        messages.len()
    );
    let prompt: Vec<Message> = instructions
        .into_iter()
        .chain(summary)
        .chain(messages.into_iter().skip(start))
        .collect();
    let payload = if window.is_chat_completion {
        Payload::Chat(prompt)
    } else {
        Payload::Text(transcript(&prompt, window))
    };

    Ok(Built {
        payload,
        token_count_map,
        prompt_tokens: used,
    })
}

async fn summarize<S: Summarizer>(
    summarizer: &S,
    dropped: &[Message],
    budget: usize,
) -> Result<Summary> {
    summarizer
        .summarize(dropped, budget)
        .await
        .map_err(Error::Summarize)
}

/// Convert a stored message into its wire form.
///
/// Image attachments with a URL become image parts after the text, and
/// the role's configured display name is attached when the message has
/// none of its own.
pub fn format_message(stored: &StoredMessage, window: &Window) -> Message {
    let label = match stored.role {
        Role::User => window.user_name.as_deref(),
        Role::Assistant => window.assistant_label.as_deref(),
        Role::System => None,
    };
    let name = stored
        .name
        .as_deref()
        .or(label)
        .and_then(sanitize_name);

    let images: Vec<ContentPart> = stored
        .attachments
        .iter()
        .filter(|attachment| attachment.is_image())
        .filter_map(|attachment| {
            let mut image_url =
                ImageUrl::new(attachment.url.clone()?, Some(window.image_detail));
            if let (Some(width), Some(height)) = (attachment.width, attachment.height) {
                image_url = image_url.with_size(width, height);
            }
            Some(ContentPart::ImageUrl { image_url })
        })
        .collect();

    let content = if images.is_empty() {
        stored.content.clone()
    } else {
        let mut parts = match &stored.content {
            Content::Text(text) if text.is_empty() => Vec::new(),
            Content::Text(text) => vec![ContentPart::Text { text: text.clone() }],
            Content::Parts(parts) => parts.clone(),
        };
        parts.extend(images);
        Content::Parts(parts)
    };

    Message {
        role: stored.role,
        content,
        name,
    }
}

/// Restrict a display name to `[A-Za-z0-9_-]{1,64}`.
pub fn sanitize_name(name: &str) -> Option<CompactString> {
    let name: CompactString = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_NAME_LEN)
        .collect();
    (!name.is_empty()).then_some(name)
}

fn transcript(prompt: &[Message], window: &Window) -> String {
    let user = window.user_name.as_deref().unwrap_or("User");
    let assistant = window.assistant_label.as_deref().unwrap_or("Assistant");

    let mut text = String::new();
    for message in prompt {
        let body = message.content.text();
        match message.role {
            Role::System => text.push_str(&body),
            Role::User => text.push_str(&format!("{user}:\n{body}")),
            Role::Assistant => text.push_str(&format!("{assistant}:\n{body}")),
        }
        text.push_str("\n\n");
    }
    text.push_str(&format!("{assistant}:\n"));
    text
}
