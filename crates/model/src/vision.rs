//! Vision capability guard.

use compact_str::CompactString;
use wcore::Attachment;

/// Name fragments of vision-capable models.
pub const VISION_MODELS: &[&str] = &[
    "gpt-4o",
    "gpt-4.1",
    "gpt-4.5",
    "gpt-5",
    "gpt-4-turbo",
    "gpt-4-vision",
    "llava",
    "llama-3.2",
    "llama3.2",
    "llama-4",
    "qwen-vl",
    "qwen2-vl",
    "pixtral",
    "claude-3",
    "claude-opus-4",
    "claude-sonnet-4",
    "gemini",
];

/// Reasoning series with vision, matched as whole name segments only.
pub const VISION_SERIES: &[&str] = &["o1", "o3", "o4"];

/// Models matching a vision fragment that do not accept images.
const TEXT_ONLY: &[&str] = &["gpt-4-turbo-preview", "o1-mini", "o3-mini"];

/// Outcome of checking a request for vision support.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisionCheck {
    /// No image attachments, or no enabled model list to choose from.
    NotRequested,
    /// The request goes to a vision-capable model.
    Vision {
        /// The model to use
        model: CompactString,
        /// Whether it replaces the requested model
        substituted: bool,
    },
    /// Images were attached but no enabled model accepts them.
    Unsupported,
}

/// Whether a model accepts image content.
pub fn is_vision_model(model: &str) -> bool {
    !TEXT_ONLY.iter().any(|name| model.contains(name))
        && (VISION_MODELS.iter().any(|name| model.contains(name))
            || VISION_SERIES.iter().any(|name| has_segment(model, name)))
}

/// Whether `name` occurs in `model` delimited by non-alphanumerics or the
/// ends of the string, e.g. `o3` in `openai/o3-pro` but not in `llama-3o3b`.
fn has_segment(model: &str, name: &str) -> bool {
    model.match_indices(name).any(|(start, _)| {
        let before = model[..start].chars().next_back();
        let after = model[start + name.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// Pick the model serving a request with `attachments`.
///
/// The requested model is kept when it is enabled and capable. Otherwise
/// the default vision model is used if enabled and capable, then the
/// first enabled capable model.
pub fn check_vision(
    model: &str,
    attachments: &[Attachment],
    enabled: Option<&[CompactString]>,
    default_vision_model: Option<&str>,
) -> VisionCheck {
    if !attachments.iter().any(Attachment::is_image) {
        return VisionCheck::NotRequested;
    }
    let Some(enabled) = enabled else {
        return VisionCheck::NotRequested;
    };
    let usable = |candidate: &str| {
        enabled.iter().any(|m| m.as_str() == candidate) && is_vision_model(candidate)
    };

    if usable(model) {
        return VisionCheck::Vision {
            model: model.into(),
            substituted: false,
        };
    }
    if let Some(default) = default_vision_model.filter(|m| usable(*m)) {
        return VisionCheck::Vision {
            model: default.into(),
            substituted: true,
        };
    }
    match enabled.iter().find(|m| is_vision_model(m)) {
        Some(found) => VisionCheck::Vision {
            model: found.clone(),
            substituted: true,
        },
        None => {
            tracing::warn!("no enabled model accepts images, requested {model}");
            VisionCheck::Unsupported
        }
    }
}
