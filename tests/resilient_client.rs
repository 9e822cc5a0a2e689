mod common;

use common::{client_for, FakeEndpoint, Reply, MODEL};
use doc_translator::translation::{BreakerSettings, BreakerState, ClientEvent, Outcome, RetryPolicy};
use doc_translator::TranslatorError;
use std::time::Duration;

#[tokio::test]
async fn translates_through_endpoint() {
    let endpoint = FakeEndpoint::translating();
    let client = client_for(endpoint.clone());

    let text = client.translate_segment("Hello world.", MODEL, "fr").await.unwrap();
    assert_eq!(text, "[fr] Hello world.");
    assert_eq!(endpoint.calls(), 1);
    assert!(endpoint.prompts()[0].contains("to French"));
}

#[tokio::test]
async fn transport_failures_return_original_text() {
    let client = client_for(FakeEndpoint::failing());

    let text = client.translate_segment("Keep me.", MODEL, "fr").await.unwrap();
    assert_eq!(text, "Keep me.");
}

#[tokio::test]
async fn configuration_errors_are_raised() {
    let client = client_for(FakeEndpoint::translating());

    let err = client.translate_segment("Hi.", "no-such-model", "fr").await.unwrap_err();
    assert!(matches!(err, TranslatorError::UnknownModel(_)));

    let err = client.translate_segment("Hi.", MODEL, "tlh").await.unwrap_err();
    assert!(matches!(err, TranslatorError::UnsupportedLanguage(_)));
}

#[tokio::test]
async fn circuit_opens_and_rejects_without_calling_endpoint() {
    let endpoint = FakeEndpoint::failing();
    let client = client_for(endpoint.clone());
    let mut events = client.subscribe();

    for i in 0..3 {
        let out = client.translate(&format!("Sentence {}.", i), None, MODEL, "fr").await.unwrap();
        assert_eq!(out.outcome, Outcome::Fallback);
    }
    assert_eq!(client.circuit_state(), BreakerState::Open);
    assert_eq!(endpoint.calls(), 3);

    let out = client.translate("Later.", None, MODEL, "fr").await.unwrap();
    assert_eq!(out.text, "Later.");
    assert_eq!(out.outcome, Outcome::Fallback);
    assert_eq!(endpoint.calls(), 3);

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(seen.contains(&ClientEvent::CircuitOpened));
    assert!(seen.contains(&ClientEvent::Rejected { model: MODEL.to_string() }));
}

#[tokio::test]
async fn timeout_retries_once_with_shortened_text() {
    let endpoint = FakeEndpoint::new(|call, text| {
        if call == 0 {
            Reply::Hang
        } else {
            Reply::Text(format!("[fr] {}", text))
        }
    });
    let client = client_for(endpoint.clone());
    let mut events = client.subscribe();

    let original = "alpha beta gamma delta epsilon zeta";
    let out = client.translate(original, None, MODEL, "fr").await.unwrap();

    assert_eq!(out.outcome, Outcome::Shortened);
    assert!(!out.outcome.is_complete());
    assert_eq!(endpoint.calls(), 2);
    let retried = common::segment_text(&endpoint.prompts()[1]).to_string();
    assert!(retried.len() < original.len());
    assert!(original.starts_with(&retried));
    assert_eq!(out.text, format!("[fr] {}", retried));

    let mut saw_retry = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, ClientEvent::RetryShortened { .. }) {
            saw_retry = true;
        }
    }
    assert!(saw_retry);
}

#[tokio::test]
async fn generic_errors_do_not_retry() {
    let endpoint = FakeEndpoint::failing();
    let client = client_for(endpoint.clone());

    client.translate("One two three.", None, MODEL, "fr").await.unwrap();
    assert_eq!(endpoint.calls(), 1);
}

#[tokio::test]
async fn exhausted_retry_falls_back() {
    let endpoint = FakeEndpoint::new(|_, _| Reply::Hang);
    let client = client_for(endpoint.clone());

    let out = client.translate("Slow text here.", None, MODEL, "fr").await.unwrap();
    assert_eq!(out.outcome, Outcome::Fallback);
    assert_eq!(out.text, "Slow text here.");
    assert_eq!(endpoint.calls(), 2);
    assert_eq!(client.circuit_snapshot().failure_count, 1);
}

#[tokio::test]
async fn context_is_sent_but_not_returned() {
    let endpoint = FakeEndpoint::translating();
    let client = client_for(endpoint.clone());

    let text = client
        .translate_segment_in_context("Second.", Some("First."), MODEL, "fr")
        .await
        .unwrap();

    assert_eq!(text, "[fr] Second.");
    assert!(endpoint.prompts()[0].contains("[Previous context: First.]"));
}

#[tokio::test]
async fn missing_model_is_reported() {
    let client = client_for(FakeEndpoint::translating());
    client.ensure_model_available(MODEL).await.unwrap();

    let err = client.ensure_model_available("llama3:70b").await.unwrap_err();
    assert!(matches!(err, TranslatorError::ModelUnavailable(_)));
}

#[tokio::test]
async fn circuit_opens_when_each_call_outlasts_the_window() {
    let endpoint = FakeEndpoint::new(|_, _| Reply::Hang);
    let client = client_for(endpoint.clone())
        .with_breaker(BreakerSettings {
            volume_threshold: 3,
            error_threshold_percentage: 40.0,
            cooldown: Duration::from_secs(45),
            rolling_window: Duration::from_millis(20),
        })
        .with_policy(RetryPolicy {
            overall_timeout: Duration::from_millis(30),
            retry_timeout_ratio: 0.6,
            shorten_ratio: 0.5,
        });

    for i in 0..3 {
        let out = client.translate(&format!("Stuck {}.", i), None, MODEL, "fr").await.unwrap();
        assert_eq!(out.outcome, Outcome::Fallback);
    }
    assert_eq!(client.circuit_state(), BreakerState::Open);
    assert_eq!(endpoint.calls(), 6);

    client.translate("Rejected.", None, MODEL, "fr").await.unwrap();
    assert_eq!(endpoint.calls(), 6);
}
