//! Multi-dimensional translation quality evaluator
//!
//! Scores a translation for accuracy, fluency and context relevance with a
//! model call, reads the answer through a strict schema and folds the three
//! dimensions into a composite score. Malformed answers are retried once with
//! a stricter instruction; anything still unreadable scores zero.

use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::client::{complete_with_timeout, CompletionRequest, ModelClient};
use crate::core::config::TranslatorConfig;
use crate::core::errors::EvaluationParseError;
use crate::core::models::{
    DimensionScores, DimensionWeights, EvaluationScore, TokenUsage, TranslationRequest, TranslationResult,
};
use crate::core::prompts;

/// Explanation attached to the fail-closed score
pub const PARSE_FAILURE: &str = "evaluation parse failure";

/// Expected answer of the evaluation model
#[derive(Debug, Deserialize)]
struct RawEvaluation {
    #[serde(alias = "Accuracy")]
    accuracy: f64,
    #[serde(alias = "Fluency")]
    fluency: f64,
    #[serde(alias = "Context Relevance", alias = "context relevance", alias = "contextRelevance")]
    context_relevance: f64,
    #[serde(default, alias = "Explanation")]
    explanation: String,
}

/// Read dimension scores from a raw evaluation answer
///
/// Uses the first JSON object in `raw` that has the expected shape, so prose,
/// code fences or stray braces around it are tolerated. Every dimension must
/// be present as a finite number.
pub fn parse_scores(raw: &str) -> Result<DimensionScores, EvaluationParseError> {
    let mut last_error = None;
    let mut parsed = None;

    for (start, _) in raw.match_indices('{') {
        let mut values = serde_json::Deserializer::from_str(&raw[start..]).into_iter::<RawEvaluation>();
        match values.next() {
            Some(Ok(value)) => {
                parsed = Some(value);
                break;
            }
            Some(Err(e)) => {
                last_error.get_or_insert(e);
            }
            None => {}
        }
    }

    let parsed = match (parsed, last_error) {
        (Some(parsed), _) => parsed,
        (None, Some(e)) => return Err(EvaluationParseError::InvalidJson(e.to_string())),
        (None, None) => return Err(EvaluationParseError::NoJsonObject),
    };

    for (name, value) in [
        ("accuracy", parsed.accuracy),
        ("fluency", parsed.fluency),
        ("context_relevance", parsed.context_relevance),
    ] {
        if !value.is_finite() {
            return Err(EvaluationParseError::NonFinite(name));
        }
    }

    Ok(DimensionScores {
        accuracy: parsed.accuracy,
        fluency: parsed.fluency,
        context_relevance: parsed.context_relevance,
        explanation: parsed.explanation.trim().to_string(),
    })
}

/// Score plus the tokens spent obtaining it
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub score: EvaluationScore,
    pub usage: TokenUsage,
    /// Model calls issued, 1 or 2
    pub calls: u32,
}

/// Texts under evaluation
struct Subject<'a> {
    source_text: &'a str,
    translated_text: &'a str,
    source_lang: &'a str,
    target_lang: &'a str,
    context: Option<&'a str>,
    reference: Option<&'a str>,
}

/// Stateless evaluator; safe to share across concurrent requests
#[derive(Debug, Clone)]
pub struct Evaluator {
    client: Arc<dyn ModelClient>,
    model_id: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
    weights: DimensionWeights,
}

impl Evaluator {
    pub fn new(client: Arc<dyn ModelClient>, model_id: impl Into<String>) -> Self {
        Self {
            client,
            model_id: model_id.into(),
            temperature: 0.1,
            max_tokens: 500,
            timeout: Duration::from_secs(30),
            weights: DimensionWeights::default(),
        }
    }

    /// Build from the evaluation settings of `config`
    pub fn from_config(client: Arc<dyn ModelClient>, config: &TranslatorConfig) -> Self {
        Self {
            client,
            model_id: config.evaluation_model_id.clone(),
            temperature: config.evaluation_temperature,
            max_tokens: config.max_tokens,
            timeout: config.timeout(),
            weights: config.weights(),
        }
    }

    pub fn with_weights(mut self, weights: DimensionWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Score `translated_text` as a translation of `source_text`
    pub async fn evaluate(
        &self,
        source_text: &str,
        translated_text: &str,
        source_lang: &str,
        target_lang: &str,
        context: Option<&str>,
    ) -> Evaluation {
        self.run(Subject {
            source_text,
            translated_text,
            source_lang,
            target_lang,
            context,
            reference: None,
        })
        .await
    }

    /// Score a translation of `request`, comparing against its reference if any
    pub async fn evaluate_request(&self, request: &TranslationRequest, translated_text: &str) -> Evaluation {
        self.run(Subject {
            source_text: request.text(),
            translated_text,
            source_lang: request.source_lang(),
            target_lang: request.target_lang(),
            context: request.context(),
            reference: request.reference(),
        })
        .await
    }

    /// Re-score finished translations, pairing `results[i]` with `requests[i]`
    ///
    /// Failed results are not evaluated and yield `None`. A request's
    /// reference translation is used when present. At most `max_concurrent`
    /// evaluations run at once; output follows input order and stops at the
    /// shorter slice.
    pub async fn evaluate_batch(
        &self,
        requests: &[TranslationRequest],
        results: &[TranslationResult],
        max_concurrent: usize,
    ) -> Vec<Option<Evaluation>> {
        let tasks: Vec<_> = requests
            .iter()
            .zip(results)
            .map(|(request, result)| async move {
                if !result.success {
                    debug!("Skipping evaluation of failed translation");
                    return None;
                }
                Some(self.evaluate_request(request, &result.translated_text).await)
            })
            .collect();

        stream::iter(tasks)
            .buffered(max_concurrent.max(1))
            .collect()
            .await
    }

    async fn run(&self, subject: Subject<'_>) -> Evaluation {
        let has_reference = subject.reference.is_some();
        let user_prompt = prompts::evaluation_user(
            subject.source_text,
            subject.translated_text,
            subject.source_lang,
            subject.target_lang,
            subject.context,
            subject.reference,
        );

        let mut usage = TokenUsage::default();
        let systems = [
            prompts::evaluation_system(subject.source_lang, subject.target_lang, has_reference),
            prompts::strict_evaluation_system(subject.source_lang, subject.target_lang, has_reference),
        ];

        for (call, system) in systems.into_iter().enumerate() {
            let request = CompletionRequest {
                system_prompt: Some(system),
                prompt: user_prompt.clone(),
                model_id: self.model_id.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            };
            let calls = call as u32 + 1;

            let completion = match complete_with_timeout(self.client.as_ref(), request, self.timeout).await {
                Ok(completion) => completion,
                Err(e) => {
                    warn!("Evaluation call to {} failed: {}", self.model_id, e);
                    return Evaluation {
                        score: EvaluationScore::fail_closed(format!("evaluation call failed: {}", e)),
                        usage,
                        calls,
                    };
                }
            };
            usage.add(completion.usage);

            match parse_scores(&completion.text) {
                Ok(scores) => {
                    let score = EvaluationScore::from_dimensions(scores, &self.weights);
                    debug!(
                        "Evaluation by {}: accuracy={} fluency={} context={} composite={}",
                        self.model_id, score.accuracy, score.fluency, score.context_relevance, score.composite
                    );
                    return Evaluation { score, usage, calls };
                }
                Err(e) => {
                    warn!("Unparseable evaluation from {} (call {}): {}", self.model_id, calls, e);
                }
            }
        }

        Evaluation {
            score: EvaluationScore::fail_closed(PARSE_FAILURE),
            usage,
            calls: 2,
        }
    }
}
