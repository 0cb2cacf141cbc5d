//! Custom error types for translation operations

use std::time::Duration;
use thiserror::Error;

/// Invalid orchestrator configuration, detected at construction time
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// Quality threshold outside [0, 10]
    #[error("Quality threshold must be within [0, 10], got {0}")]
    InvalidThreshold(f64),

    /// Negative retry budget
    #[error("max_retries must be >= 0, got {0}")]
    NegativeRetryBudget(i64),

    /// Translation and evaluation use the same model
    #[error("Translation and evaluation models must differ (both are '{0}')")]
    IdenticalModels(String),

    /// Dimension weights are negative or do not sum to 1
    #[error("Dimension weights must be non-negative and sum to 1, got {accuracy}/{fluency}/{context_relevance}")]
    InvalidWeights {
        accuracy: f64,
        fluency: f64,
        context_relevance: f64,
    },

    /// A required value is missing
    #[error("Missing required setting: {0}")]
    Missing(String),

    /// Any other invalid setting
    #[error("Invalid setting {field}: {message}")]
    Invalid { field: String, message: String },
}

/// Failure of a single model call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Temporary failure (network, 5xx), a later call may succeed
    #[error("Transient provider error: {message}")]
    Transient { message: String },

    /// Failure that will not go away by itself (auth, bad request, malformed body)
    #[error("Permanent provider error: {message}")]
    Permanent { message: String },

    /// Rate limit exceeded
    #[error("Rate limit exceeded. Retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// The call did not finish within the configured timeout
    #[error("Request timeout after {0:?}")]
    Timeout(Duration),
}

impl ProviderError {
    /// Whether resubmitting the same call later may succeed
    pub fn is_transient(&self) -> bool {
        !matches!(self, ProviderError::Permanent { .. })
    }

    /// Retry-after hint carried by rate-limit rejections
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ProviderError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Short machine-readable label
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::Transient { .. } => "transient",
            ProviderError::Permanent { .. } => "permanent",
            ProviderError::RateLimited { .. } => "rate_limited",
            ProviderError::Timeout(_) => "timeout",
        }
    }
}

/// Evaluation response could not be read as a score
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationParseError {
    #[error("no JSON object in evaluation response")]
    NoJsonObject,

    #[error("malformed evaluation JSON: {0}")]
    InvalidJson(String),

    #[error("score '{0}' is not a finite number")]
    NonFinite(&'static str),
}

/// Translation-related errors
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Model call failed
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Invalid request
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// File operation error
    #[error("File error: {path} - {message}")]
    FileError { path: String, message: String },

    /// Wrapper for anyhow errors
    #[error("Internal error: {0}")]
    InternalError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Reqwest error
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

impl From<anyhow::Error> for TranslationError {
    fn from(err: anyhow::Error) -> Self {
        TranslationError::InternalError(err.to_string())
    }
}

/// Result type for translation operations
pub type Result<T> = std::result::Result<T, TranslationError>;
