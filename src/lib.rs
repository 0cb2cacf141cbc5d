//! Quality Translator - LLM translation with automatic quality gating
//!
//! Every translation is scored by a second, independently configured model.
//! Translations below the quality threshold are retried with the evaluator's
//! feedback until one passes or the retry budget runs out.

#![forbid(unsafe_code)]

pub mod cli;
pub mod core;
pub mod server;

// Re-export key types for convenience
pub use crate::core::{
    client::{Completion, CompletionRequest, ModelClient, OpenAiClient},
    config::TranslatorConfig,
    cost::{CostBreakdown, CostEstimator, CostLedger, CostRecord, DailySummary, DomainStats},
    errors::{ConfigurationError, EvaluationParseError, ProviderError, TranslationError},
    evaluator::{Evaluation, Evaluator},
    mock::{MockModelClient, MockReply},
    models::{
        AttemptOutcome, AttemptRecord, DimensionWeights, EvaluationScore, ResultStatus, TokenUsage,
        TranslationAttempt, TranslationRequest, TranslationResult, UsageReport,
    },
    orchestrator::{BatchReport, Orchestrator},
    token_tracker::TokenTracker,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
