//! Quality-gated retry orchestrator
//!
//! Each request goes through attempt → evaluate → accept/retry. A retry
//! carries the best judged attempt so far back to the translation model as
//! feedback. The loop ends when an attempt reaches the quality threshold or
//! the retry budget is spent, and the best attempt seen is returned.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::core::client::{complete_with_timeout, CompletionRequest, ModelClient, OpenAiClient};
use crate::core::config::TranslatorConfig;
use crate::core::errors::{ConfigurationError, ProviderError};
use crate::core::evaluator::Evaluator;
use crate::core::models::{
    AttemptOutcome, AttemptRecord, ResultStatus, TranslationAttempt, TranslationRequest,
    TranslationResult, UsageReport,
};
use crate::core::prompts::{self, Feedback};
use crate::core::token_tracker::TokenTracker;

/// Text used by [`Orchestrator::check_connection`]
const CONNECTION_TEXT: &str = "Hello, world!";

/// Results of a batch run, in request order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub results: Vec<TranslationResult>,
    pub usage: UsageReport,
    pub accepted: usize,
    pub failed: usize,
}

/// Whether `candidate` should replace the current best composite.
/// Ties keep the earlier attempt.
fn improves(best: Option<f64>, candidate: f64) -> bool {
    best.map_or(true, |current| candidate > current)
}

/// Drives translation attempts until one meets the quality threshold
#[derive(Debug, Clone)]
pub struct Orchestrator {
    client: Arc<dyn ModelClient>,
    evaluator: Evaluator,
    translation_model_id: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
    quality_threshold: f64,
    max_retries: u32,
    max_concurrent: usize,
}

impl Orchestrator {
    /// Validate `config` and build an orchestrator around `client`
    pub fn new(client: Arc<dyn ModelClient>, config: TranslatorConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;

        let max_retries = u32::try_from(config.max_retries).map_err(|_| ConfigurationError::Invalid {
            field: "max_retries".to_string(),
            message: format!("{} is out of range", config.max_retries),
        })?;

        let evaluator = Evaluator::from_config(client.clone(), &config);

        info!(
            "Orchestrator ready: {} translates, {} evaluates, threshold {}, up to {} retries",
            config.translation_model_id, config.evaluation_model_id, config.quality_threshold, max_retries
        );

        let timeout = config.timeout();
        Ok(Self {
            client,
            evaluator,
            translation_model_id: config.translation_model_id,
            temperature: config.translation_temperature,
            max_tokens: config.max_tokens,
            timeout,
            quality_threshold: config.quality_threshold,
            max_retries,
            max_concurrent: config.max_concurrent,
        })
    }

    /// Create from environment, talking to the configured HTTP endpoint
    pub fn from_env() -> Result<Self, ConfigurationError> {
        let config = TranslatorConfig::from_env()?;
        Self::from_config(config)
    }

    /// Create from an already loaded configuration, talking to the HTTP endpoint
    pub fn from_config(config: TranslatorConfig) -> Result<Self, ConfigurationError> {
        let client = OpenAiClient::new(&config)?;
        Self::new(Arc::new(client), config)
    }

    pub fn translation_model_id(&self) -> &str {
        &self.translation_model_id
    }

    pub fn evaluation_model_id(&self) -> &str {
        self.evaluator.model_id()
    }

    pub fn quality_threshold(&self) -> f64 {
        self.quality_threshold
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Ask the translation model for one translation, with feedback on retries
    pub async fn produce_attempt(
        &self,
        request: &TranslationRequest,
        index: usize,
        feedback: Option<Feedback<'_>>,
    ) -> Result<TranslationAttempt, ProviderError> {
        let feedback_injected = feedback.is_some();
        let prompt = match feedback {
            Some(feedback) => prompts::feedback_prompt(request, feedback),
            None => prompts::translation_prompt(request),
        };

        let completion = complete_with_timeout(
            self.client.as_ref(),
            CompletionRequest {
                system_prompt: Some(prompts::TRANSLATION_SYSTEM.to_string()),
                prompt,
                model_id: self.translation_model_id.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            },
            self.timeout,
        )
        .await?;

        Ok(TranslationAttempt {
            index,
            text: completion.text,
            model_id: self.translation_model_id.clone(),
            temperature: self.temperature,
            feedback_injected,
            usage: completion.usage,
        })
    }

    /// Translate one request; never fails, problems are reported in the result
    pub async fn translate(&self, request: &TranslationRequest) -> TranslationResult {
        let started = Instant::now();
        let budget = self.max_retries as usize + 1;

        let mut history: Vec<AttemptRecord> = Vec::with_capacity(budget);
        let mut usage = UsageReport::default();
        // Positions in `history`
        let mut best: Option<usize> = None;
        let mut last_error: Option<ProviderError> = None;
        let mut accepted = false;

        for index in 0..budget {
            // Only a readable judgement of the best attempt is fed back
            let feedback = best.and_then(|pos| match &history[pos].outcome {
                AttemptOutcome::Evaluated { attempt, score } if score.parsed => Some(Feedback { attempt, score }),
                _ => None,
            });

            let produced = self.produce_attempt(request, index, feedback).await;
            let attempt = match produced {
                Ok(attempt) => attempt,
                Err(e) => {
                    warn!("Attempt {}/{} failed: {}", index + 1, budget, e);
                    history.push(AttemptRecord {
                        index,
                        outcome: AttemptOutcome::Failed {
                            error_kind: e.kind().to_string(),
                            message: e.to_string(),
                            retry_after_ms: e.retry_after().map(|d| d.as_millis() as u64),
                        },
                    });
                    last_error = Some(e);
                    continue;
                }
            };
            usage.record_translation(attempt.usage);

            let evaluation = self.evaluator.evaluate_request(request, &attempt.text).await;
            usage.record_evaluation(evaluation.usage);
            let score = evaluation.score;

            info!(
                "Attempt {}/{} scored {} (parsed: {}, feedback: {})",
                index + 1,
                budget,
                score.composite,
                score.parsed,
                attempt.feedback_injected
            );

            let composite = score.composite;
            history.push(AttemptRecord {
                index,
                outcome: AttemptOutcome::Evaluated { attempt, score },
            });
            let position = history.len() - 1;

            let best_composite = best.and_then(|pos| history[pos].score()).map(|s| s.composite);
            if improves(best_composite, composite) {
                best = Some(position);
            }

            if composite >= self.quality_threshold {
                accepted = true;
                break;
            }
            debug!("Below threshold {}, retrying", self.quality_threshold);
        }

        self.finish(history, best, accepted, usage, last_error, started)
    }

    fn finish(
        &self,
        history: Vec<AttemptRecord>,
        best: Option<usize>,
        accepted: bool,
        usage: UsageReport,
        last_error: Option<ProviderError>,
        started: Instant,
    ) -> TranslationResult {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let best_record = best.map(|pos| &history[pos]);

        let (translated_text, quality_score, best_attempt) = match best_record {
            Some(record) => (
                record.text().unwrap_or_default().to_string(),
                record.score().map(|s| s.composite).unwrap_or(0.0),
                Some(record.index),
            ),
            None => (String::new(), 0.0, None),
        };

        let (status, success, error) = match (best_record, accepted) {
            (Some(_), true) => (ResultStatus::Accepted, true, None),
            (Some(_), false) => (ResultStatus::Exhausted, true, None),
            (None, _) => {
                let detail = last_error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "no attempt was made".to_string());
                (
                    ResultStatus::Failed,
                    false,
                    Some(format!("All {} translation attempts failed; last error: {}", history.len(), detail)),
                )
            }
        };

        match status {
            ResultStatus::Failed => warn!("Translation failed after {} attempts", history.len()),
            _ => info!(
                "Translation {} after {} attempts with score {} in {}ms",
                status,
                history.len(),
                quality_score,
                elapsed_ms
            ),
        }

        TranslationResult {
            translated_text,
            quality_score,
            accepted,
            status,
            best_attempt,
            attempts: history,
            usage,
            success,
            error,
            translation_model: self.translation_model_id.clone(),
            evaluation_model: self.evaluator.model_id().to_string(),
            completed_at: chrono::Utc::now(),
            elapsed_ms,
        }
    }

    /// Translate independent requests with at most `max_concurrent` in flight
    pub async fn translate_batch(&self, requests: &[TranslationRequest]) -> BatchReport {
        self.translate_batch_with(requests, |_, _| {}).await
    }

    /// Like [`translate_batch`](Self::translate_batch), calling `on_result` as each request finishes
    pub async fn translate_batch_with<F>(&self, requests: &[TranslationRequest], on_result: F) -> BatchReport
    where
        F: Fn(usize, &TranslationResult) + Sync,
    {
        info!("Starting batch of {} requests ({} concurrent)", requests.len(), self.max_concurrent);

        let tracker = TokenTracker::new();
        let tasks: Vec<_> = requests
            .iter()
            .enumerate()
            .map(|(i, request)| {
                let tracker = &tracker;
                let on_result = &on_result;
                async move {
                    let result = self.translate(request).await;
                    tracker.record(&result.usage);
                    on_result(i, &result);
                    result
                }
            })
            .collect();
        let results = stream::iter(tasks)
            .buffered(self.max_concurrent)
            .collect::<Vec<_>>()
            .await;

        let accepted = results.iter().filter(|r| r.accepted).count();
        let failed = results.iter().filter(|r| !r.success).count();
        info!(
            "Batch done: {} accepted, {} failed, {} tokens",
            accepted,
            failed,
            tracker.snapshot().total_tokens()
        );

        BatchReport {
            results,
            usage: tracker.snapshot(),
            accepted,
            failed,
        }
    }

    /// Send a single test translation to verify the model service is reachable
    pub async fn check_connection(&self) -> Result<String, ProviderError> {
        let request = TranslationRequest::new(CONNECTION_TEXT, "English", "Spanish").map_err(|e| {
            ProviderError::Permanent {
                message: e.to_string(),
            }
        })?;
        let attempt = self.produce_attempt(&request, 0, None).await?;
        Ok(attempt.text)
    }
}
