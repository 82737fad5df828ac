//! Tests for token counting.

use wcore::{Content, ContentPart, ImageDetail, ImageUrl, Message, Role};
use windlass_model::{Overhead, REPLY_PRIMING, TokenCounter, Tokenizer, image_tokens};

fn system(name: Option<&str>, content: &str) -> Message {
    let message = Message::system(content);
    match name {
        Some(name) => message.with_name(name),
        None => message,
    }
}

fn jargon() -> Vec<Message> {
    vec![
        system(
            None,
            "You are a helpful, pattern-following assistant that translates corporate jargon into plain English.",
        ),
        system(
            Some("example_user"),
            "New synergies will help drive top-line growth.",
        ),
        system(
            Some("example_assistant"),
            "Things working well together will increase revenue.",
        ),
        system(
            Some("example_user"),
            "Let's circle back when we have more bandwidth to touch base on opportunities for increased leverage.",
        ),
        system(
            Some("example_assistant"),
            "Let's talk later when we're less busy about how to do better.",
        ),
        Message::user(
            "This late pivot means we don't have time to boil the ocean for the client deliverable.",
        ),
    ]
}

fn prompt_tokens(model: &str, messages: &[Message]) -> usize {
    let counter = TokenCounter::for_model(model);
    REPLY_PRIMING + messages.iter().map(|m| counter.count_message(m)).sum::<usize>()
}

#[test]
fn count_matches_provider_for_known_models() {
    let messages = jargon();
    for (model, expected) in [
        ("gpt-3.5-turbo-0301", 127),
        ("gpt-3.5-turbo-0613", 129),
        ("gpt-3.5-turbo", 129),
        ("gpt-4-0314", 129),
        ("gpt-4-0613", 129),
        ("gpt-4", 129),
        ("unknown", 129),
    ] {
        assert_eq!(prompt_tokens(model, &messages), expected, "model: {model}");
    }
}

#[test]
fn vision_request_with_unsized_image() {
    let message = Message {
        role: Role::User,
        content: Content::Parts(vec![
            ContentPart::Text {
                text: "describe what is in this image?".into(),
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl::new(
                    "https://venturebeat.com/wp-content/uploads/2019/03/openai-1.png",
                    Some(ImageDetail::High),
                ),
            },
        ]),
        name: None,
    };
    assert_eq!(prompt_tokens("gpt-4-vision-preview", &[message]), 14);
}

#[test]
fn name_changes_count_by_name_overhead() {
    for model in ["gpt-4", "gpt-3.5-turbo-0301", "unknown"] {
        let counter = TokenCounter::for_model(model);
        let plain = Message::user("Hello there");
        let named = plain.clone().with_name("Test_User");
        let delta = counter.count_message(&named) as isize - counter.count_message(&plain) as isize;
        let name_tokens = counter.count_text("Test_User") as isize;
        assert_eq!(delta, name_tokens + counter.overhead().per_name, "model: {model}");
    }
}

#[test]
fn empty_message_costs_only_framing() {
    let counter = TokenCounter::for_model("gpt-4");
    let empty = Message::assistant("");
    assert_eq!(
        counter.count_message(&empty),
        counter.overhead().per_message + counter.count_text("assistant")
    );
}

#[test]
fn overhead_profiles() {
    assert_eq!(
        Overhead::for_model("gpt-3.5-turbo-0301"),
        Overhead {
            per_message: 4,
            per_name: -1
        }
    );
    assert_eq!(Overhead::for_model("gpt-4o"), Overhead::for_model("no-such-model"));
    assert_eq!(Overhead::for_model("gpt-4o").per_message, 3);
}

#[test]
fn count_text_is_positive_and_deterministic() {
    let counter = TokenCounter::for_model("gpt-4o");
    let first = counter.count_text("Hello, world!");
    assert!(first > 0);
    assert_eq!(first, counter.count_text("Hello, world!"));
    assert_eq!(counter.count_text(""), 0);
}

#[test]
fn image_costs() {
    assert_eq!(image_tokens(None, None, ImageDetail::Low), 85);
    assert_eq!(image_tokens(Some(4096), Some(4096), ImageDetail::Low), 85);
    assert_eq!(image_tokens(None, None, ImageDetail::High), 0);
    assert_eq!(image_tokens(Some(512), Some(512), ImageDetail::High), 255);
    assert_eq!(image_tokens(Some(1024), Some(1024), ImageDetail::Auto), 765);
    assert_eq!(image_tokens(Some(2048), Some(4096), ImageDetail::High), 1105);
}

#[test]
fn sized_image_parts_add_to_text_cost() {
    let counter = TokenCounter::for_model("gpt-4o");
    let text_only = Message::user("what is this?");
    let with_image = Message {
        content: Content::Parts(vec![
            ContentPart::Text {
                text: "what is this?".into(),
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl::new("https://example.com/a.png", Some(ImageDetail::High))
                    .with_size(1024, 1024),
            },
        ]),
        ..text_only.clone()
    };
    assert_eq!(
        counter.count_message(&with_image),
        counter.count_message(&text_only) + 765
    );
}

struct Chars;

impl Tokenizer for Chars {
    fn count_text(&self, text: &str) -> usize {
        text.chars().count()
    }
}

#[test]
fn custom_tokenizer() {
    let counter = TokenCounter::new(Chars, "gpt-4");
    assert_eq!(counter.count_message(&Message::user("abc")), 3 + 4 + 3);
}
