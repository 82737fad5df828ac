//! Token counting.
//!
//! Text is encoded with the model family's BPE from `tiktoken-rs`. Chat
//! messages add a per-message overhead and a per-name adjustment that
//! differ between model generations, and every reply is primed with a
//! fixed number of tokens.

use crate::limits::lookup;
use tiktoken_rs::{
    CoreBPE,
    tokenizer::{Tokenizer as Encoding, get_tokenizer},
};
use wcore::{Content, ContentPart, ImageDetail, ImageUrl, Message};

/// Tokens priming every reply with `<|start|>assistant<|message|>`.
pub const REPLY_PRIMING: usize = 3;

/// Flat cost of a low-detail image.
pub const LOW_DETAIL_IMAGE_TOKENS: usize = 85;

/// Cost of one 512px tile of a high-detail image.
pub const IMAGE_TILE_TOKENS: usize = 170;

/// Counts tokens in text.
pub trait Tokenizer {
    /// Number of tokens `text` encodes to.
    fn count_text(&self, text: &str) -> usize;
}

/// BPE encoder shared across the process.
#[derive(Clone, Copy)]
pub struct Bpe(&'static CoreBPE);

impl Bpe {
    /// Encoder for a model, `cl100k_base` when the model is unknown.
    pub fn for_model(model: &str) -> Self {
        let encoding = get_tokenizer(model).unwrap_or(Encoding::Cl100kBase);
        let bpe = match encoding {
            Encoding::O200kBase | Encoding::O200kHarmony => tiktoken_rs::o200k_base_singleton(),
            Encoding::R50kBase | Encoding::P50kBase | Encoding::P50kEdit | Encoding::Gpt2 => {
                tiktoken_rs::r50k_base_singleton()
            }
            _ => tiktoken_rs::cl100k_base_singleton(),
        };
        Self(bpe)
    }
}

impl Tokenizer for Bpe {
    fn count_text(&self, text: &str) -> usize {
        self.0.encode_with_special_tokens(text).len()
    }
}

/// Per-message framing cost of a model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overhead {
    /// Tokens framing every message
    pub per_message: usize,
    /// Adjustment applied when a message carries a name
    pub per_name: isize,
}

/// Framing used by current chat models and anything unrecognized.
pub const DEFAULT_OVERHEAD: Overhead = Overhead {
    per_message: 3,
    per_name: 1,
};

const OVERHEADS: &[(&str, Overhead)] = &[(
    "gpt-3.5-turbo-0301",
    Overhead {
        per_message: 4,
        per_name: -1,
    },
)];

impl Overhead {
    /// Framing for a model id.
    pub fn for_model(model: &str) -> Self {
        lookup(OVERHEADS, model).unwrap_or(DEFAULT_OVERHEAD)
    }
}

/// Token cost of an image part.
///
/// Low detail is flat. High and auto detail fit the image within
/// 2048x2048, scale the shortest side down to 768 and charge per 512px
/// tile. Images of unknown size cost nothing until they are sized.
pub fn image_tokens(width: Option<u32>, height: Option<u32>, detail: ImageDetail) -> usize {
    if detail == ImageDetail::Low {
        return LOW_DETAIL_IMAGE_TOKENS;
    }
    let (Some(width), Some(height)) = (width, height) else {
        return 0;
    };
    if width == 0 || height == 0 {
        return LOW_DETAIL_IMAGE_TOKENS;
    }

    let (mut width, mut height) = (f64::from(width), f64::from(height));
    let longest = width.max(height);
    if longest > 2048.0 {
        let ratio = 2048.0 / longest;
        width *= ratio;
        height *= ratio;
    }
    let shortest = width.min(height);
    if shortest > 768.0 {
        let ratio = 768.0 / shortest;
        width *= ratio;
        height *= ratio;
    }

    let tiles = (width / 512.0).ceil() as usize * (height / 512.0).ceil() as usize;
    IMAGE_TILE_TOKENS * tiles + LOW_DETAIL_IMAGE_TOKENS
}

/// Token counter bound to one model.
#[derive(Clone)]
pub struct TokenCounter<T = Bpe> {
    tokenizer: T,
    overhead: Overhead,
}

impl TokenCounter {
    /// Counter using the model's own encoder and framing.
    pub fn for_model(model: &str) -> Self {
        Self::new(Bpe::for_model(model), model)
    }
}

impl<T: Tokenizer> TokenCounter<T> {
    /// Counter with a custom tokenizer and the model's framing.
    pub fn new(tokenizer: T, model: &str) -> Self {
        Self {
            tokenizer,
            overhead: Overhead::for_model(model),
        }
    }

    /// The framing in use.
    pub fn overhead(&self) -> Overhead {
        self.overhead
    }

    /// Tokens in plain text.
    pub fn count_text(&self, text: &str) -> usize {
        self.tokenizer.count_text(text)
    }

    /// Tokens a message occupies in a chat prompt.
    ///
    /// Does not include [`REPLY_PRIMING`], which is charged once per
    /// prompt.
    pub fn count_message(&self, message: &Message) -> usize {
        let mut tokens = self.overhead.per_message
            + self.count_text(message.role.as_str())
            + self.count_content(&message.content);
        if let Some(name) = &message.name {
            tokens = (tokens + self.count_text(name)).saturating_add_signed(self.overhead.per_name);
        }
        tokens
    }

    fn count_content(&self, content: &Content) -> usize {
        match content {
            Content::Text(text) => self.count_text(text),
            Content::Parts(parts) => parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => self.count_text(text),
                    ContentPart::ImageUrl {
                        image_url:
                            ImageUrl {
                                detail,
                                width,
                                height,
                                ..
                            },
                    } => image_tokens(*width, *height, detail.unwrap_or_default()),
                })
                .sum(),
        }
    }
}
