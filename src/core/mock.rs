//! Scripted model client for tests and offline demos
//!
//! Replies are queued per model id, so one client can stand in for both the
//! translation model and the evaluation model. Once a queue is drained the
//! client answers with a permanent "script exhausted" error.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::core::client::{Completion, CompletionRequest, ModelClient};
use crate::core::errors::ProviderError;
use crate::core::models::TokenUsage;

/// One scripted reply
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Return this text
    Text(String),
    /// Fail with this error
    Error(ProviderError),
    /// Sleep, then return the text
    Delayed(Duration, String),
}

impl MockReply {
    pub fn text(text: impl Into<String>) -> Self {
        MockReply::Text(text.into())
    }

    /// Well-formed evaluation JSON with all three dimensions
    pub fn scores(accuracy: f64, fluency: f64, context_relevance: f64) -> Self {
        MockReply::Text(
            serde_json::json!({
                "accuracy": accuracy,
                "fluency": fluency,
                "context_relevance": context_relevance,
                "explanation": format!(
                    "accuracy {}, fluency {}, context {}",
                    accuracy, fluency, context_relevance
                ),
            })
            .to_string(),
        )
    }

    /// Evaluation JSON whose three dimensions all equal `score`
    pub fn uniform(score: f64) -> Self {
        Self::scores(score, score, score)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        MockReply::Error(ProviderError::Transient {
            message: message.into(),
        })
    }
}

/// Model client replaying scripted replies
#[derive(Debug, Clone, Default)]
pub struct MockModelClient {
    scripts: Arc<Mutex<HashMap<String, VecDeque<MockReply>>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
    call_count: Arc<AtomicUsize>,
    usage_per_call: TokenUsage,
}

impl MockModelClient {
    pub fn new() -> Self {
        Self {
            usage_per_call: TokenUsage::new(10, 5),
            ..Default::default()
        }
    }

    /// Token usage reported for every successful call
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage_per_call = usage;
        self
    }

    /// Queue replies for `model_id`
    pub fn script(self, model_id: &str, replies: impl IntoIterator<Item = MockReply>) -> Self {
        {
            let mut scripts = self.scripts.lock().unwrap_or_else(|e| e.into_inner());
            scripts.entry(model_id.to_string()).or_default().extend(replies);
        }
        self
    }

    /// Every request received so far, in call order
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Requests that were sent to `model_id`
    pub fn requests_for(&self, model_id: &str) -> Vec<CompletionRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.model_id == model_id)
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    fn next_reply(&self, model_id: &str) -> Option<MockReply> {
        let mut scripts = self.scripts.lock().unwrap_or_else(|e| e.into_inner());
        scripts.get_mut(model_id).and_then(|queue| queue.pop_front())
    }
}

#[async_trait]
impl ModelClient for MockModelClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let reply = self.next_reply(&request.model_id);
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        match reply {
            Some(MockReply::Text(text)) => Ok(Completion {
                text,
                usage: self.usage_per_call,
            }),
            Some(MockReply::Delayed(delay, text)) => {
                tokio::time::sleep(delay).await;
                Ok(Completion {
                    text,
                    usage: self.usage_per_call,
                })
            }
            Some(MockReply::Error(err)) => Err(err),
            None => Err(ProviderError::Permanent {
                message: format!("script exhausted for model {}", request.model_id),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(model_id: &str) -> CompletionRequest {
        CompletionRequest {
            system_prompt: None,
            prompt: "hi".to_string(),
            model_id: model_id.to_string(),
            temperature: 0.0,
            max_tokens: 10,
        }
    }

    #[tokio::test]
    async fn test_replies_are_routed_by_model() {
        let client = MockModelClient::new()
            .script("translator", [MockReply::text("hola")])
            .script("judge", [MockReply::uniform(8.0)]);

        let judged = client.complete(request("judge")).await.unwrap();
        assert!(judged.text.contains("\"accuracy\":8.0"));

        let translated = client.complete(request("translator")).await.unwrap();
        assert_eq!(translated.text, "hola");
        assert_eq!(translated.usage, TokenUsage::new(10, 5));

        let drained = client.complete(request("translator")).await;
        assert!(matches!(drained, Err(ProviderError::Permanent { .. })));

        assert_eq!(client.call_count(), 3);
        assert_eq!(client.requests_for("translator").len(), 2);
    }
}
