//! Core data models for translation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::core::errors::{ConfigurationError, TranslationError};

/// Translation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTranslationRequest")]
pub struct TranslationRequest {
    text: String,
    source_lang: String,
    target_lang: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reference: Option<String>,
}

/// Unchecked wire shape of [`TranslationRequest`]
#[derive(Deserialize)]
struct RawTranslationRequest {
    text: String,
    source_lang: String,
    target_lang: String,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    reference: Option<String>,
}

impl TryFrom<RawTranslationRequest> for TranslationRequest {
    type Error = TranslationError;

    fn try_from(raw: RawTranslationRequest) -> Result<Self, Self::Error> {
        let mut request = TranslationRequest::new(raw.text, raw.source_lang, raw.target_lang)?;
        request.context = raw.context.filter(|c| !c.trim().is_empty());
        request.reference = raw.reference.filter(|r| !r.trim().is_empty());
        Ok(request)
    }
}

impl TranslationRequest {
    /// Create a request; the source text must not be blank
    pub fn new(
        text: impl Into<String>,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
    ) -> Result<Self, TranslationError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(TranslationError::InvalidRequest {
                message: "source text must not be empty".to_string(),
            });
        }

        Ok(Self {
            text,
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
            context: None,
            reference: None,
        })
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Attach a gold-standard translation the evaluator compares against
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source_lang(&self) -> &str {
        &self.source_lang
    }

    pub fn target_lang(&self) -> &str {
        &self.target_lang
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }
}

/// Token counters reported by the model service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    pub fn add(&mut self, other: TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// One produced translation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationAttempt {
    pub index: usize,
    pub text: String,
    pub model_id: String,
    pub temperature: f32,
    pub feedback_injected: bool,
    pub usage: TokenUsage,
}

/// Weights used to fold the three dimensions into the composite score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionWeights {
    pub accuracy: f64,
    pub fluency: f64,
    pub context_relevance: f64,
}

impl Default for DimensionWeights {
    fn default() -> Self {
        Self {
            accuracy: 1.0 / 3.0,
            fluency: 1.0 / 3.0,
            context_relevance: 1.0 / 3.0,
        }
    }
}

impl DimensionWeights {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let weights = [self.accuracy, self.fluency, self.context_relevance];
        let sum: f64 = weights.iter().sum();
        let valid = weights.iter().all(|w| w.is_finite() && *w >= 0.0) && (sum - 1.0).abs() < 1e-6;

        if !valid {
            return Err(ConfigurationError::InvalidWeights {
                accuracy: self.accuracy,
                fluency: self.fluency,
                context_relevance: self.context_relevance,
            });
        }
        Ok(())
    }

    /// Parse "accuracy,fluency,context_relevance"
    pub fn parse(value: &str) -> Result<Self, ConfigurationError> {
        let parts = value
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ConfigurationError::Invalid {
                field: "dimension_weights".to_string(),
                message: e.to_string(),
            })?;

        match parts.as_slice() {
            [accuracy, fluency, context_relevance] => {
                let weights = Self {
                    accuracy: *accuracy,
                    fluency: *fluency,
                    context_relevance: *context_relevance,
                };
                weights.validate()?;
                Ok(weights)
            }
            _ => Err(ConfigurationError::Invalid {
                field: "dimension_weights".to_string(),
                message: format!("expected 3 comma-separated values, got {}", parts.len()),
            }),
        }
    }
}

/// Dimension scores as read from an evaluation response, before clamping
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionScores {
    pub accuracy: f64,
    pub fluency: f64,
    pub context_relevance: f64,
    pub explanation: String,
}

/// Quality judgment for one translation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationScore {
    pub accuracy: f64,
    pub fluency: f64,
    pub context_relevance: f64,
    pub composite: f64,
    pub explanation: String,
    pub parsed: bool,
}

impl EvaluationScore {
    /// Clamp each dimension to [0, 10] and compute the rounded composite
    pub fn from_dimensions(scores: DimensionScores, weights: &DimensionWeights) -> Self {
        let accuracy = scores.accuracy.clamp(0.0, 10.0);
        let fluency = scores.fluency.clamp(0.0, 10.0);
        let context_relevance = scores.context_relevance.clamp(0.0, 10.0);

        let weighted = weights.accuracy * accuracy
            + weights.fluency * fluency
            + weights.context_relevance * context_relevance;
        let composite = ((weighted * 10.0).round() / 10.0).clamp(0.0, 10.0);

        Self {
            accuracy,
            fluency,
            context_relevance,
            composite,
            explanation: scores.explanation,
            parsed: true,
        }
    }

    /// Lowest possible score, used when no judgment could be obtained
    pub fn fail_closed(explanation: impl Into<String>) -> Self {
        Self {
            accuracy: 0.0,
            fluency: 0.0,
            context_relevance: 0.0,
            composite: 0.0,
            explanation: explanation.into(),
            parsed: false,
        }
    }
}

/// What happened in one loop iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The model produced a translation and it was scored
    Evaluated {
        attempt: TranslationAttempt,
        score: EvaluationScore,
    },
    /// The translation call failed at the provider level
    Failed {
        error_kind: String,
        message: String,
        /// Back-off requested by the provider when rate limited
        #[serde(default, skip_serializing_if = "Option::is_none")]
        retry_after_ms: Option<u64>,
    },
}

/// Entry of the attempt history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub index: usize,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

impl AttemptRecord {
    pub fn text(&self) -> Option<&str> {
        match &self.outcome {
            AttemptOutcome::Evaluated { attempt, .. } => Some(&attempt.text),
            AttemptOutcome::Failed { .. } => None,
        }
    }

    pub fn score(&self) -> Option<&EvaluationScore> {
        match &self.outcome {
            AttemptOutcome::Evaluated { score, .. } => Some(score),
            AttemptOutcome::Failed { .. } => None,
        }
    }

    pub fn parsed(&self) -> bool {
        self.score().map(|s| s.parsed).unwrap_or(false)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Failed { .. })
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match &self.outcome {
            AttemptOutcome::Failed { retry_after_ms, .. } => retry_after_ms.map(Duration::from_millis),
            AttemptOutcome::Evaluated { .. } => None,
        }
    }
}

/// Terminal state of the retry loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    /// Some attempt met the quality threshold
    Accepted,
    /// Retry budget spent without meeting the threshold
    Exhausted,
    /// Every attempt failed at the provider level
    Failed,
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultStatus::Accepted => write!(f, "accepted"),
            ResultStatus::Exhausted => write!(f, "exhausted"),
            ResultStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Token usage summed over all calls of one request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageReport {
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub translation: TokenUsage,
    pub evaluation: TokenUsage,
}

impl UsageReport {
    pub fn record_translation(&mut self, usage: TokenUsage) {
        self.translation.add(usage);
        self.add_total(usage);
    }

    pub fn record_evaluation(&mut self, usage: TokenUsage) {
        self.evaluation.add(usage);
        self.add_total(usage);
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_input_tokens + self.total_output_tokens
    }

    fn add_total(&mut self, usage: TokenUsage) {
        self.total_input_tokens += usage.input_tokens;
        self.total_output_tokens += usage.output_tokens;
    }
}

/// Translation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationResult {
    /// Best attempt's text, empty when no attempt succeeded
    pub translated_text: String,
    pub quality_score: f64,
    pub accepted: bool,
    pub status: ResultStatus,
    /// Index of the attempt `translated_text` comes from
    pub best_attempt: Option<usize>,
    pub attempts: Vec<AttemptRecord>,
    pub usage: UsageReport,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub translation_model: String,
    pub evaluation_model: String,
    pub completed_at: chrono::DateTime<chrono::Utc>,
    pub elapsed_ms: u64,
}

impl TranslationResult {
    pub fn attempts_count(&self) -> usize {
        self.attempts.len()
    }

    /// Longest back-off any failed attempt was asked to respect
    pub fn retry_after(&self) -> Option<Duration> {
        self.attempts.iter().filter_map(AttemptRecord::retry_after).max()
    }
}
