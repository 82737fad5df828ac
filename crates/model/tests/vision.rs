//! Tests for the vision capability guard.

use compact_str::CompactString;
use wcore::Attachment;
use windlass_model::{VisionCheck, check_vision, is_vision_model};

fn enabled(models: &[&str]) -> Vec<CompactString> {
    models.iter().map(|m| CompactString::from(*m)).collect()
}

fn png() -> Vec<Attachment> {
    vec![Attachment::new("image/png")]
}

#[test]
fn falls_back_to_first_capable_model() {
    let models = enabled(&["initial-model", "llava", "other-model"]);
    let check = check_vision(
        "initial-model",
        &png(),
        Some(models.as_slice()),
        Some("non-valid-default-model"),
    );
    assert_eq!(
        check,
        VisionCheck::Vision {
            model: "llava".into(),
            substituted: true
        }
    );
}

#[test]
fn prefers_default_vision_model() {
    let models = enabled(&["initial-model", "llava", "gpt-4o"]);
    let check = check_vision("initial-model", &png(), Some(models.as_slice()), Some("gpt-4o"));
    assert_eq!(
        check,
        VisionCheck::Vision {
            model: "gpt-4o".into(),
            substituted: true
        }
    );
}

#[test]
fn keeps_capable_requested_model() {
    let models = enabled(&["gpt-4o", "llava"]);
    let check = check_vision("gpt-4o", &png(), Some(models.as_slice()), Some("llava"));
    assert_eq!(
        check,
        VisionCheck::Vision {
            model: "gpt-4o".into(),
            substituted: false
        }
    );
}

#[test]
fn no_capable_model_is_unsupported() {
    let models = enabled(&["initial-model", "other-model"]);
    let check = check_vision("initial-model", &png(), Some(models.as_slice()), None);
    assert_eq!(check, VisionCheck::Unsupported);
}

#[test]
fn not_requested_without_images() {
    let models = enabled(&["llava"]);
    let files = vec![Attachment::new("application/pdf")];
    assert_eq!(
        check_vision("initial-model", &files, Some(models.as_slice()), None),
        VisionCheck::NotRequested
    );
    assert_eq!(
        check_vision("initial-model", &[], Some(models.as_slice()), None),
        VisionCheck::NotRequested
    );
}

#[test]
fn not_requested_without_model_list() {
    assert_eq!(
        check_vision("initial-model", &png(), None, Some("llava")),
        VisionCheck::NotRequested
    );
}

#[test]
fn vision_patterns() {
    for model in ["gpt-4o-mini", "gpt-4-vision-preview", "gpt-4-turbo", "llava:13b", "claude-3-opus"] {
        assert!(is_vision_model(model), "model: {model}");
    }
    for model in ["gpt-4", "gpt-3.5-turbo", "gpt-4-turbo-preview", "o1-mini", "mistral"] {
        assert!(!is_vision_model(model), "model: {model}");
    }
}

#[test]
fn reasoning_series_match_whole_segments() {
    for model in ["o1", "o3-pro", "o4-mini", "openai/o3", "o1-2024-12-17"] {
        assert!(is_vision_model(model), "model: {model}");
    }
    for model in ["yolo1", "foo3-chat", "qwen2-72b-coo4", "llama-3o3b", "deepseek-v3-o10"] {
        assert!(!is_vision_model(model), "model: {model}");
    }
}
