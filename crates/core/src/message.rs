//! Chat messages, in both wire and stored form.

use crate::StreamChunk;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// A message in the chat, as sent to the provider.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
pub struct Message {
    /// The role of the message
    pub role: Role,

    /// The content of the message
    #[serde(default)]
    pub content: Content,

    /// Optional participant name, restricted by the provider to
    /// `[A-Za-z0-9_-]{1,64}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<CompactString>,
}

impl Message {
    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Content::Text(content.into()),
            name: None,
        }
    }

    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Content::Text(content.into()),
            name: None,
        }
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Content::Text(content.into()),
            name: None,
        }
    }

    /// Set the participant name.
    pub fn with_name(mut self, name: impl Into<CompactString>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Create a new message builder
    pub fn builder(role: Role) -> MessageBuilder {
        MessageBuilder::new(role)
    }
}

/// Message content: plain text or typed multimodal parts.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Content {
    /// Text-only content
    Text(String),
    /// Structured content parts
    Parts(Vec<ContentPart>),
}

impl Content {
    /// Concatenated text of the content, ignoring non-text parts.
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Whether the content carries neither text nor parts.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Parts(parts) => parts.is_empty(),
        }
    }

    /// Whether the content contains a text fragment.
    pub fn contains(&self, needle: &str) -> bool {
        match self {
            Self::Text(text) => text.contains(needle),
            Self::Parts(parts) => parts.iter().any(|part| match part {
                ContentPart::Text { text } => text.contains(needle),
                ContentPart::ImageUrl { .. } => false,
            }),
        }
    }
}

impl Default for Content {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// A typed content part.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// A text fragment
    Text {
        /// The text
        text: String,
    },
    /// An image reference
    ImageUrl {
        /// The image location and detail
        image_url: ImageUrl,
    },
}

/// Image reference inside a content part.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ImageUrl {
    /// Remote URL or data URI
    pub url: String,

    /// Requested detail level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<ImageDetail>,

    /// Pixel width, when known locally
    #[serde(skip)]
    pub width: Option<u32>,

    /// Pixel height, when known locally
    #[serde(skip)]
    pub height: Option<u32>,
}

impl ImageUrl {
    /// Create an image reference with unknown dimensions.
    pub fn new(url: impl Into<String>, detail: Option<ImageDetail>) -> Self {
        Self {
            url: url.into(),
            detail,
            width: None,
            height: None,
        }
    }

    /// Attach known pixel dimensions.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }
}

/// Image detail level for vision requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageDetail {
    /// Fixed low-resolution cost
    Low,
    /// Tiled high-resolution cost
    High,
    /// Provider decides; costed as high
    #[default]
    Auto,
}

/// A builder for messages assembled from stream deltas
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    role: Role,
    content: String,
}

impl MessageBuilder {
    /// Create a new message builder
    pub fn new(role: Role) -> Self {
        Self {
            role,
            content: String::new(),
        }
    }

    /// Accept a chunk from the stream, returns the text it carried.
    pub fn accept<'c>(&mut self, chunk: &'c StreamChunk) -> Option<&'c str> {
        if let Some(role) = chunk.role() {
            self.role = role;
        }

        let content = chunk.content()?;
        self.content.push_str(content);
        Some(content)
    }

    /// Text accumulated so far
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Build the message
    pub fn build(self) -> Message {
        Message {
            role: self.role,
            content: Content::Text(self.content),
            name: None,
        }
    }
}

/// The role of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
pub enum Role {
    /// The user role
    #[serde(rename = "user")]
    #[default]
    User,
    /// The assistant role
    #[serde(rename = "assistant")]
    Assistant,
    /// The system role
    #[serde(rename = "system")]
    System,
}

impl Role {
    /// Wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

/// A persisted conversation message.
///
/// Messages form a parent-pointer chain rather than a flat list; the
/// history up to a message is recovered by walking `parent_id` back to
/// the root.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct StoredMessage {
    /// Message identifier
    pub id: CompactString,

    /// Identifier of the preceding message, `None` at the root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<CompactString>,

    /// The role of the message
    pub role: Role,

    /// Display label of the author
    #[serde(default)]
    pub sender: CompactString,

    /// The content of the message
    #[serde(default)]
    pub content: Content,

    /// Explicit participant name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<CompactString>,

    /// Cached token cost from a previous assembly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_count: Option<usize>,

    /// Files attached to the message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl StoredMessage {
    /// Create a stored message with the given id, role and text.
    pub fn new(id: impl Into<CompactString>, role: Role, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            content: Content::Text(text.into()),
            ..Default::default()
        }
    }

    /// Set the parent message id.
    pub fn with_parent(mut self, parent: impl Into<CompactString>) -> Self {
        self.parent_id = Some(parent.into());
        self
    }

    /// Attach a file.
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

/// A file attached to a message.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
pub struct Attachment {
    /// MIME content type, e.g. `image/png`
    #[serde(rename = "type")]
    pub content_type: CompactString,

    /// Location the provider can fetch the file from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Pixel width for images
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    /// Pixel height for images
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl Attachment {
    /// Create an attachment of the given content type.
    pub fn new(content_type: impl Into<CompactString>) -> Self {
        Self {
            content_type: content_type.into(),
            ..Default::default()
        }
    }

    /// Whether the attachment needs a vision-capable model.
    pub fn is_image(&self) -> bool {
        self.content_type.contains("image")
    }
}
