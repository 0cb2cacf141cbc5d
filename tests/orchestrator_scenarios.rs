//! End-to-end retry loop scenarios against a scripted model client

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quality_translator::{
    AttemptOutcome, Completion, CompletionRequest, ConfigurationError, MockModelClient, MockReply,
    ModelClient, Orchestrator, ProviderError, ResultStatus, TokenUsage, TranslationRequest,
    TranslatorConfig,
};

const TRANSLATOR: &str = "gpt-3.5-turbo";
const JUDGE: &str = "gpt-4o";

fn config(threshold: f64, max_retries: i64) -> TranslatorConfig {
    TranslatorConfig {
        api_key: String::new(),
        translation_model_id: TRANSLATOR.to_string(),
        evaluation_model_id: JUDGE.to_string(),
        quality_threshold: threshold,
        max_retries,
        max_concurrent: 3,
        ..Default::default()
    }
}

fn build(client: &MockModelClient, config: TranslatorConfig) -> Orchestrator {
    Orchestrator::new(Arc::new(client.clone()), config).unwrap()
}

fn request(text: &str) -> TranslationRequest {
    TranslationRequest::new(text, "English", "Spanish")
        .unwrap()
        .with_context("customer support chat")
}

fn translations(count: usize) -> Vec<MockReply> {
    (0..count).map(|i| MockReply::text(format!("traducción {}", i))).collect()
}

fn composites(result: &quality_translator::TranslationResult) -> Vec<f64> {
    result
        .attempts
        .iter()
        .filter_map(|r| r.score().map(|s| s.composite))
        .collect()
}

#[tokio::test]
async fn accepted_on_third_attempt() {
    let client = MockModelClient::new()
        .script(TRANSLATOR, translations(3))
        .script(
            JUDGE,
            [MockReply::uniform(6.0), MockReply::uniform(7.5), MockReply::uniform(9.0)],
        );

    let result = build(&client, config(8.5, 2)).translate(&request("Hello")).await;

    assert_eq!(result.attempts_count(), 3);
    assert!(result.accepted);
    assert!(result.success);
    assert_eq!(result.status, ResultStatus::Accepted);
    assert_eq!(result.quality_score, 9.0);
    assert_eq!(result.translated_text, "traducción 2");
    assert_eq!(composites(&result), vec![6.0, 7.5, 9.0]);
}

#[tokio::test]
async fn exhausted_returns_best_attempt() {
    let client = MockModelClient::new()
        .script(TRANSLATOR, translations(2))
        .script(JUDGE, [MockReply::uniform(6.0), MockReply::uniform(7.0)]);

    let result = build(&client, config(9.5, 1)).translate(&request("Hello")).await;

    assert_eq!(result.attempts_count(), 2);
    assert!(!result.accepted);
    assert!(result.success);
    assert_eq!(result.status, ResultStatus::Exhausted);
    assert_eq!(result.quality_score, 7.0);
    assert_eq!(result.best_attempt, Some(1));
    assert_eq!(result.translated_text, "traducción 1");
}

#[tokio::test]
async fn ties_keep_the_earlier_attempt() {
    let client = MockModelClient::new()
        .script(TRANSLATOR, translations(3))
        .script(
            JUDGE,
            [MockReply::uniform(7.0), MockReply::uniform(5.0), MockReply::uniform(7.0)],
        );

    let result = build(&client, config(8.0, 2)).translate(&request("Hello")).await;

    assert_eq!(result.attempts_count(), 3);
    assert!(!result.accepted);
    assert_eq!(result.best_attempt, Some(0));
    assert_eq!(result.translated_text, "traducción 0");
}

#[tokio::test]
async fn first_attempt_meeting_threshold_stops_the_loop() {
    let client = MockModelClient::new()
        .script(TRANSLATOR, translations(3))
        .script(JUDGE, [MockReply::uniform(8.5)]);

    let result = build(&client, config(8.5, 2)).translate(&request("Hello")).await;

    assert_eq!(result.attempts_count(), 1);
    assert!(result.accepted);
    assert_eq!(client.requests_for(TRANSLATOR).len(), 1);
}

#[tokio::test]
async fn unparseable_evaluations_fail_closed_and_loop_continues() {
    let client = MockModelClient::new()
        .script(TRANSLATOR, translations(2))
        .script(
            JUDGE,
            [
                MockReply::text("Excellent translation!"),
                MockReply::text("Really, it is excellent."),
                MockReply::uniform(6.0),
            ],
        );

    let result = build(&client, config(8.5, 1)).translate(&request("Hello")).await;

    assert_eq!(result.attempts_count(), 2);
    let first = result.attempts[0].score().unwrap();
    assert!(!first.parsed);
    assert_eq!(
        (first.accuracy, first.fluency, first.context_relevance, first.composite),
        (0.0, 0.0, 0.0, 0.0)
    );
    assert_eq!(first.explanation, "evaluation parse failure");

    assert!(!result.accepted);
    assert_eq!(result.best_attempt, Some(1));
    assert_eq!(result.quality_score, 6.0);
}

#[tokio::test]
async fn provider_failing_every_attempt() {
    let client = MockModelClient::new().script(
        TRANSLATOR,
        [
            MockReply::transient("connection reset"),
            MockReply::Error(ProviderError::RateLimited {
                retry_after: Some(Duration::from_secs(20)),
            }),
            MockReply::transient("502 bad gateway"),
        ],
    );

    let result = build(&client, config(8.5, 2)).translate(&request("Hello")).await;

    assert!(!result.success);
    assert!(!result.accepted);
    assert_eq!(result.status, ResultStatus::Failed);
    assert_eq!(result.attempts_count(), 3);
    assert!(result.attempts.iter().all(|r| r.is_failed() && r.score().is_none()));
    assert!(result.error.as_deref().unwrap_or_default().contains("502 bad gateway"));
    assert_eq!(result.translated_text, "");
    assert!(client.requests_for(JUDGE).is_empty());

    let hints: Vec<_> = result.attempts.iter().map(|r| r.retry_after()).collect();
    assert_eq!(hints, vec![None, Some(Duration::from_secs(20)), None]);
    assert_eq!(result.retry_after(), Some(Duration::from_secs(20)));
    match &result.attempts[1].outcome {
        AttemptOutcome::Failed {
            error_kind,
            retry_after_ms,
            ..
        } => {
            assert_eq!(error_kind, "rate_limited");
            assert_eq!(*retry_after_ms, Some(20_000));
        }
        other => panic!("expected failed attempt, got {:?}", other),
    }
}

#[tokio::test]
async fn feedback_comes_from_the_best_attempt() {
    let client = MockModelClient::new()
        .script(TRANSLATOR, translations(3))
        .script(
            JUDGE,
            [MockReply::uniform(7.0), MockReply::uniform(5.0), MockReply::uniform(9.0)],
        );

    let result = build(&client, config(8.5, 2)).translate(&request("Hello")).await;

    assert!(result.accepted);
    let sent = client.requests_for(TRANSLATOR);
    assert!(sent[1].prompt.contains("traducción 0"));
    assert!(sent[2].prompt.contains("traducción 0"));
    assert!(!sent[2].prompt.contains("traducción 1"));
}

#[tokio::test]
async fn failed_attempt_does_not_reset_feedback() {
    let client = MockModelClient::new()
        .script(
            TRANSLATOR,
            [
                MockReply::text("primer intento"),
                MockReply::transient("timeout upstream"),
                MockReply::text("tercer intento"),
            ],
        )
        .script(JUDGE, [MockReply::scores(5.0, 6.0, 7.0), MockReply::uniform(9.0)]);

    let result = build(&client, config(8.5, 2)).translate(&request("Hello")).await;

    assert!(result.accepted);
    assert_eq!(result.attempts_count(), 3);
    assert!(result.attempts[1].is_failed());

    let sent = client.requests_for(TRANSLATOR);
    assert!(sent[2].prompt.contains("primer intento"));
    match &result.attempts[2].outcome {
        AttemptOutcome::Evaluated { attempt, .. } => {
            assert!(attempt.feedback_injected);
            assert_eq!(attempt.index, 2);
        }
        other => panic!("expected evaluated attempt, got {:?}", other),
    }
}

#[tokio::test]
async fn attempts_stay_within_budget() {
    for max_retries in 0..4 {
        let budget = max_retries as usize + 1;
        let client = MockModelClient::new()
            .script(TRANSLATOR, translations(budget))
            .script(JUDGE, (0..budget).map(|_| MockReply::uniform(3.0)));

        let result = build(&client, config(8.5, max_retries))
            .translate(&request("Hello"))
            .await;

        assert!(result.attempts_count() >= 1);
        assert_eq!(result.attempts_count(), budget);
        for record in &result.attempts {
            let score = record.score().unwrap();
            assert!((0.0..=10.0).contains(&score.composite));
        }
    }
}

#[test]
fn identical_models_are_rejected_at_construction() {
    let client = MockModelClient::new();
    let config = TranslatorConfig {
        evaluation_model_id: TRANSLATOR.to_string(),
        ..config(8.5, 2)
    };

    let err = Orchestrator::new(Arc::new(client.clone()), config).unwrap_err();
    assert_eq!(err, ConfigurationError::IdenticalModels(TRANSLATOR.to_string()));
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn batch_keeps_requests_independent_and_ordered() {
    // Replies are consumed in completion order; identical judge replies keep
    // the outcome independent of scheduling.
    let texts = ["one", "two", "three", "four", "five"];
    let client = MockModelClient::new()
        .script(TRANSLATOR, translations(texts.len()))
        .script(JUDGE, texts.iter().map(|_| MockReply::uniform(9.0)));
    let orchestrator = build(&client, config(8.5, 2));

    let requests: Vec<_> = texts.iter().map(|t| request(t)).collect();
    let report = orchestrator.translate_batch(&requests).await;

    assert_eq!(report.results.len(), texts.len());
    assert_eq!(report.accepted, texts.len());
    assert_eq!(report.failed, 0);
    assert!(report.results.iter().all(|r| r.attempts_count() == 1));
    assert_eq!(report.usage.total_input_tokens, 20 * texts.len() as u64);
    assert_eq!(report.usage.total_output_tokens, 10 * texts.len() as u64);

    // Every request was translated exactly once
    let sent = client.requests_for(TRANSLATOR);
    assert_eq!(sent.len(), texts.len());
    for text in texts {
        assert_eq!(sent.iter().filter(|r| r.prompt.contains(&format!("\n\n{}\n\n", text))).count(), 1);
    }
}

#[tokio::test]
async fn batch_reports_per_request_failures() {
    let client = MockModelClient::new()
        .script(
            TRANSLATOR,
            [MockReply::text("bien"), MockReply::transient("boom")],
        )
        .script(JUDGE, [MockReply::uniform(9.0)]);
    let orchestrator = build(
        &client,
        TranslatorConfig {
            max_concurrent: 1,
            ..config(8.5, 0)
        },
    );

    let requests = vec![request("good"), request("bad")];
    let report = orchestrator.translate_batch(&requests).await;

    assert_eq!(report.accepted, 1);
    assert_eq!(report.failed, 1);
    assert!(report.results[0].success);
    assert!(!report.results[1].success);
}

/// Echoes translation prompts back and tracks how many calls overlap
#[derive(Debug, Default)]
struct CountingClient {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl ModelClient for CountingClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let text = if request.model_id == JUDGE {
            r#"{"accuracy": 9, "fluency": 9, "context_relevance": 9, "explanation": "ok"}"#.to_string()
        } else {
            request.prompt
        };
        Ok(Completion {
            text,
            usage: TokenUsage::new(1, 1),
        })
    }
}

#[tokio::test]
async fn batch_respects_concurrency_limit_and_input_order() {
    let client = Arc::new(CountingClient::default());
    let orchestrator = Orchestrator::new(
        client.clone(),
        TranslatorConfig {
            max_concurrent: 2,
            ..config(8.5, 0)
        },
    )
    .unwrap();

    let texts = ["alpha", "bravo", "charlie", "delta", "echo", "foxtrot"];
    let requests: Vec<_> = texts.iter().map(|t| request(t)).collect();
    let report = orchestrator.translate_batch(&requests).await;

    assert_eq!(report.results.len(), texts.len());
    for (result, text) in report.results.iter().zip(texts) {
        assert!(result.accepted);
        assert!(result.translated_text.contains(&format!("\n\n{}\n\n", text)));
    }
    let peak = client.peak.load(Ordering::SeqCst);
    assert!((1..=2).contains(&peak), "peak in-flight calls was {}", peak);
}

#[tokio::test]
async fn evaluator_answer_with_braces_in_trailing_prose_is_accepted() {
    let judged = r#"{"accuracy": 9, "fluency": 9, "context_relevance": 9, "explanation": "good"}

Note: scores use the {0-10} scale."#;
    let client = MockModelClient::new()
        .script(TRANSLATOR, translations(1))
        .script(JUDGE, [MockReply::text(judged)]);

    let result = build(&client, config(8.5, 2)).translate(&request("Hello")).await;

    assert!(result.accepted);
    assert_eq!(result.quality_score, 9.0);
    assert!(result.attempts[0].parsed());
    assert_eq!(client.requests_for(JUDGE).len(), 1);
}
