//! Tests for the client facade.

use compact_str::CompactString;
use futures_core::Stream;
use futures_util::stream;
use std::collections::BTreeMap;
use wcore::{
    Attachment, Conversation, Message, Model, ROOT_MESSAGE_ID, Request, Response, Role,
    StoredMessage, StreamChunk, Summarizer, Summary, Usage,
};
use windlass_model::{
    AzureOptions, Client, ClientOptions, ContextStrategy, Environment, Error, Payload,
    StreamEvent, VisionCheck,
};

/// Transport replaying fixed chunks and recording nothing.
#[derive(Clone)]
struct Scripted;

impl Model for Scripted {
    async fn send(&self, request: &Request) -> anyhow::Result<Response> {
        assert!(request.stream.is_none());
        Ok(serde_json::from_value(serde_json::json!({
            "id": "c1",
            "model": request.model,
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Mock message content"},
                "finish_reason": "stop"
            }],
            "usage": {
                "prompt_tokens": 10,
                "completion_tokens": 20,
                "completion_tokens_details": {"reasoning_tokens": 30, "other_tokens": 5}
            }
        }))?)
    }

    fn stream(
        &self,
        request: Request,
    ) -> impl Stream<Item = anyhow::Result<StreamChunk>> + Send + 'static {
        assert_eq!(request.stream, Some(true));
        stream::iter(vec![
            Ok(StreamChunk::text("Mock ")),
            Ok(StreamChunk::text("chunk")),
            Ok(StreamChunk::usage(Usage::new(5, 2))),
        ])
    }
}

struct Refiner;

impl Summarizer for Refiner {
    async fn summarize(&self, _dropped: &[Message], _budget: usize) -> anyhow::Result<Summary> {
        Ok(Summary {
            message: Message::assistant("Refined answer"),
            token_count: 30,
        })
    }
}

fn options() -> ClientOptions {
    ClientOptions {
        api_key: Some("new-api-key".into()),
        model_options: windlass_model::ModelOptions {
            temperature: Some(0.7),
            ..windlass_model::ModelOptions::new("gpt-4")
        },
        ..Default::default()
    }
}

fn client(options: ClientOptions) -> Client<Scripted, Refiner> {
    Client::new(options, Environment::default(), Scripted, Refiner).unwrap()
}

fn hello() -> Conversation {
    Conversation::new(vec![
        StoredMessage::new("1", Role::User, "Hello").with_parent(ROOT_MESSAGE_ID),
        StoredMessage::new("2", Role::Assistant, "Hi").with_parent("1"),
    ])
}

#[test]
fn options_are_applied() {
    let client = client(options());
    assert_eq!(client.options().api_key.as_deref(), Some("new-api-key"));
    assert_eq!(client.model_options().model, "gpt-4");
    assert_eq!(client.model_options().temperature, Some(0.7));
}

#[test]
fn set_options_rederives_target() {
    let mut client = client(options());
    client
        .set_options(ClientOptions {
            reverse_proxy_url: Some("https://example.com/completions".into()),
            ..options()
        })
        .unwrap();
    assert!(client.resolved().force_prompt);
    assert!(!client.resolved().is_chat_completion);

    let failed = client.set_options(ClientOptions {
        max_context_tokens: Some(10),
        max_prompt_tokens: Some(10),
        ..options()
    });
    assert!(failed.is_err());
    assert!(client.resolved().force_prompt);
}

#[test]
fn token_counts() {
    let client = client(options());
    assert!(client.token_count("Hello, world!") > 0);
    assert!(client.token_count_for_message(&Message::user("Hello")) > client.token_count("Hello"));
}

#[test]
fn build_and_save_options() {
    let client = client(ClientOptions {
        model_label: Some("Helper".into()),
        prompt_prefix: Some("Be kind".into()),
        ..options()
    });
    let build = client.build_options(Some("Hello"));
    assert!(build.is_chat_completion);
    assert_eq!(build.prompt_prefix.as_deref(), Some("Hello"));

    let save = client.save_options();
    assert_eq!(save.model_label.as_deref(), Some("Helper"));
    assert_eq!(save.prompt_prefix.as_deref(), Some("Be kind"));
    assert_eq!(save.model_options.model, "gpt-4");
}

#[tokio::test]
async fn prefix_from_options_or_argument() {
    let client = client(ClientOptions {
        prompt_prefix: Some("Test Prefix from options".into()),
        ..options()
    });
    let built = client
        .build_messages(&hello(), "2", &client.build_options(None))
        .await
        .unwrap();
    assert!(built.payload.messages()[0].content.contains("Test Prefix from options"));

    let built = client
        .build_messages(&hello(), "2", &client.build_options(Some("Test Prefix")))
        .await
        .unwrap();
    let instructions: Vec<_> = built
        .payload
        .messages()
        .iter()
        .filter(|m| m.content.contains("Test Prefix"))
        .collect();
    assert_eq!(instructions.len(), 1);
    assert!(!instructions[0].content.contains("from options"));
}

#[tokio::test]
async fn no_prefix_no_instructions() {
    let client = client(options());
    let built = client
        .build_messages(&hello(), "2", &client.build_options(None))
        .await
        .unwrap();
    assert_eq!(built.payload.messages().len(), 2);
    assert!(built.payload.messages().iter().all(|m| m.role != Role::System));
}

#[tokio::test]
async fn user_name_is_attached() {
    let client = client(ClientOptions {
        name: Some("Test User".into()),
        ..options()
    });
    let built = client
        .build_messages(&hello(), "2", &client.build_options(None))
        .await
        .unwrap();
    assert!(
        built
            .payload
            .messages()
            .iter()
            .any(|m| m.role == Role::User && m.name.as_deref() == Some("Test_User"))
    );
}

#[tokio::test]
async fn summarize_strategy_returns_ledger() {
    let client = client(ClientOptions {
        context_strategy: ContextStrategy::Summarize,
        ..options()
    });
    let built = client
        .build_messages(&hello(), "2", &client.build_options(None))
        .await
        .unwrap();
    assert_eq!(built.token_count_map.len(), 2);
    assert_eq!(built.payload.messages().len(), 2);
}

#[tokio::test]
async fn empty_history() {
    let client = client(options());
    let built = client
        .build_messages(&Conversation::default(), "1", &client.build_options(None))
        .await
        .unwrap();
    assert!(built.payload.is_empty());
}

#[test]
fn vision_request_switches_model_and_clears_stop() {
    let mut models = BTreeMap::new();
    models.insert(
        CompactString::from("ollama"),
        vec!["initial-model".into(), "llava".into(), "other-model".into()],
    );
    let mut client = client(ClientOptions {
        endpoint: Some("ollama".into()),
        models_config: models,
        default_vision_model: Some("non-valid-default-model".into()),
        model_options: windlass_model::ModelOptions {
            stop: Some(vec!["\n\nUser:".into()]),
            ..windlass_model::ModelOptions::new("initial-model")
        },
        ..Default::default()
    });

    let check = client
        .check_vision_request(&[Attachment::new("image/png")])
        .unwrap();
    assert!(matches!(check, VisionCheck::Vision { substituted: true, .. }));
    assert_eq!(client.model_options().model, "llava");
    assert!(client.is_vision_model());
    assert!(client.model_options().stop.is_none());
}

fn azure_vision_options() -> ClientOptions {
    ClientOptions {
        api_key: Some("azure-key".into()),
        endpoint: Some("azureOpenAI".into()),
        models_config: BTreeMap::from([(
            CompactString::from("azureOpenAI"),
            vec![CompactString::from("gpt-3.5-turbo"), CompactString::from("gpt-4o")],
        )]),
        azure: Some(AzureOptions {
            instance_name: "test-instance".into(),
            deployment_name: "test-deployment".into(),
            api_version: "2024-02-01".into(),
        }),
        ..ClientOptions::new("gpt-3.5-turbo")
    }
}

fn model_as_deployment() -> Environment {
    Environment {
        use_model_as_deployment_name: true,
        ..Default::default()
    }
}

#[test]
fn vision_substitute_retargets_azure_deployment() {
    let mut client =
        Client::new(azure_vision_options(), model_as_deployment(), Scripted, Refiner).unwrap();
    assert!(client.resolved().completions_url.contains("/deployments/gpt-35-turbo/"));
    assert_eq!(client.resolved().max_context_tokens, 16_385);

    let check = client
        .check_vision_request(&[Attachment::new("image/jpeg")])
        .unwrap();
    assert!(matches!(check, VisionCheck::Vision { substituted: true, .. }));
    let resolved = client.resolved();
    assert_eq!(resolved.model_options.model, "gpt-4o");
    assert!(resolved.completions_url.contains("/deployments/gpt-4o/"));
    assert_eq!(resolved.azure_endpoint.as_ref(), Some(&resolved.completions_url));
    assert_eq!(resolved.max_context_tokens, 128_000);
    assert_eq!(resolved.max_prompt_tokens, 128_000 - 1024);
}

#[test]
fn vision_substitute_moves_http_transport() {
    let mut client = Client::http(azure_vision_options(), model_as_deployment()).unwrap();
    assert!(client.transport().endpoint().contains("/deployments/gpt-35-turbo/"));

    client
        .check_vision_request(&[Attachment::new("image/png")])
        .unwrap();
    assert!(client.transport().endpoint().contains("/deployments/gpt-4o/"));
    assert_eq!(client.transport().endpoint(), client.resolved().completions_url);
}

#[test]
fn failed_vision_retarget_keeps_configuration() {
    let mut models = BTreeMap::new();
    models.insert(
        CompactString::from("ollama"),
        vec![CompactString::from("initial-model"), CompactString::from("llava")],
    );
    let mut client = client(ClientOptions {
        endpoint: Some("ollama".into()),
        models_config: models,
        max_context_tokens: None,
        model_options: windlass_model::ModelOptions {
            max_tokens: Some(8_000),
            ..windlass_model::ModelOptions::new("gpt-4")
        },
        ..Default::default()
    });
    let before = client.resolved().clone();

    let err = client
        .check_vision_request(&[Attachment::new("image/png")])
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)), "{err}");
    assert_eq!(client.resolved(), &before);
    assert!(!client.is_vision_model());
}

#[test]
fn request_carries_parameters() {
    let client = client(options());
    let request = client.request(&Payload::Chat(vec![Message::user("Hello")]));
    assert_eq!(request.model, "gpt-4");
    assert_eq!(request.temperature, Some(0.7));
    assert_eq!(request.messages.len(), 1);
    assert!(request.prompt.is_none());

    let request = client.request(&Payload::Text("User:\nHello".into()));
    assert!(request.messages.is_empty());
    assert_eq!(request.prompt.as_deref(), Some("User:\nHello"));
}

#[tokio::test]
async fn send_records_reconciled_usage() {
    let mut client = client(options());
    assert!(client.stream_usage().is_none());

    let response = client
        .send(&Payload::Chat(vec![Message::user("Hello")]))
        .await
        .unwrap();
    assert_eq!(response.content(), Some("Mock message content"));

    let usage = client.stream_usage().unwrap();
    assert_eq!(usage.prompt_tokens, 10);
    assert_eq!(usage.completion_tokens, 10);
}

#[tokio::test]
async fn stream_then_record_usage() {
    let mut client = client(options());
    let mut handle = client.stream(&Payload::Chat(vec![Message::user("Hello")]));

    let mut last = None;
    while let Some(event) = handle.next_event().await.unwrap() {
        last = Some(event);
    }
    assert_eq!(
        last,
        Some(StreamEvent::Completed(Message::assistant("Mock chunk")))
    );

    let usage = handle.stream_usage().unwrap();
    client.record_usage(usage.clone());
    assert_eq!(client.stream_usage(), Some(usage));
}
