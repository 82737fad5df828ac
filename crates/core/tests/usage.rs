//! Tests for usage reconciliation.

use windlass_core as wcore;
use wcore::{CompletionTokensDetails, Usage};

#[test]
fn identity_without_details() {
    let usage = Usage::new(10, 20);
    assert_eq!(usage.reconcile(), usage);
}

#[test]
fn identity_without_reasoning_tokens() {
    let usage = Usage::new(10, 20).with_details(CompletionTokensDetails {
        reasoning_tokens: None,
        other_tokens: Some(5),
    });
    assert_eq!(usage.reconcile(), usage);
}

#[test]
fn reasoning_tokens_adjust_completion() {
    let usage = Usage::new(10, 20).with_details(CompletionTokensDetails {
        reasoning_tokens: Some(30),
        other_tokens: Some(5),
    });
    let reconciled = usage.reconcile();
    assert_eq!(reconciled.prompt_tokens, 10);
    assert_eq!(reconciled.completion_tokens, 10);
    assert_eq!(
        reconciled.completion_tokens_details,
        usage.completion_tokens_details
    );
}

#[test]
fn reasoning_below_completion_uses_absolute_difference() {
    let usage = Usage::new(7, 50).with_details(CompletionTokensDetails {
        reasoning_tokens: Some(12),
        other_tokens: None,
    });
    assert_eq!(usage.reconcile().completion_tokens, 38);
}

#[test]
fn null_details_deserialize_as_absent() {
    let usage: Usage = serde_json::from_str(
        r#"{"prompt_tokens": 10, "completion_tokens": 20, "completion_tokens_details": null}"#,
    )
    .unwrap();
    assert!(usage.completion_tokens_details.is_none());
    assert_eq!(usage.reconcile(), usage);
}
