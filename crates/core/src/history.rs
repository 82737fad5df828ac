//! Conversation history lookup and ancestor-chain reconstruction.

use crate::StoredMessage;
use compact_str::CompactString;
use std::collections::{BTreeMap, BTreeSet};

/// Parent id used by clients to mark the first message of a conversation.
pub const ROOT_MESSAGE_ID: &str = "00000000-0000-0000-0000-000000000000";

/// Upper bound on the number of ancestors collected for one leaf.
pub const MAX_CHAIN_DEPTH: usize = 10_000;

/// Read-only lookup of persisted messages by id.
pub trait History {
    /// Get a message by id.
    fn message(&self, id: &str) -> Option<&StoredMessage>;
}

/// An in-memory conversation indexed by message id.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<StoredMessage>,
    index: BTreeMap<CompactString, usize>,
}

impl Conversation {
    /// Index a list of stored messages. Later duplicates of an id win.
    pub fn new(messages: Vec<StoredMessage>) -> Self {
        let index = messages
            .iter()
            .enumerate()
            .map(|(i, m)| (m.id.clone(), i))
            .collect();
        Self { messages, index }
    }

    /// Number of stored messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the conversation has no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl History for Conversation {
    fn message(&self, id: &str) -> Option<&StoredMessage> {
        self.index.get(id).map(|&i| &self.messages[i])
    }
}

impl History for BTreeMap<CompactString, StoredMessage> {
    fn message(&self, id: &str) -> Option<&StoredMessage> {
        self.get(id)
    }
}

/// Walk from `leaf` back to the root and return the chain oldest first.
///
/// The walk is iterative, stops at a missing or root parent, at a cycle,
/// or after [`MAX_CHAIN_DEPTH`] messages.
pub fn ancestors<'h, H: History + ?Sized>(history: &'h H, leaf: &str) -> Vec<&'h StoredMessage> {
    let mut chain = Vec::new();
    let mut seen = BTreeSet::new();
    let mut next = Some(leaf);

    while let Some(id) = next {
        if id == ROOT_MESSAGE_ID {
            break;
        }
        let Some(message) = history.message(id) else {
            break;
        };
        if !seen.insert(message.id.as_str()) {
            tracing::warn!("cycle in conversation at message {id}");
            break;
        }
        chain.push(message);
        if chain.len() >= MAX_CHAIN_DEPTH {
            tracing::warn!("conversation deeper than {MAX_CHAIN_DEPTH} messages, truncating");
            break;
        }
        next = message.parent_id.as_deref();
    }

    chain.reverse();
    chain
}
