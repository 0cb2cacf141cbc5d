//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::core::errors::{ConfigurationError, Result, TranslationError};
use crate::core::models::DimensionWeights;

/// Default OpenAI-compatible chat completions endpoint
pub const DEFAULT_API_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Configuration for translator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    pub api_key: String,
    pub api_endpoint: String,
    pub translation_model_id: String,
    pub evaluation_model_id: String,
    pub quality_threshold: f64,
    /// Signed so that a negative budget can be reported instead of wrapping
    pub max_retries: i64,
    pub translation_temperature: f32,
    pub evaluation_temperature: f32,
    pub max_tokens: u32,
    pub timeout_ms: u64,
    pub max_concurrent: usize,
    pub dimension_weights: Option<DimensionWeights>,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            api_endpoint: std::env::var("API_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_API_ENDPOINT.to_string()),
            translation_model_id: "gpt-3.5-turbo".to_string(),
            evaluation_model_id: "gpt-4o".to_string(),
            quality_threshold: 8.5,
            max_retries: 2,
            translation_temperature: 0.3,
            evaluation_temperature: 0.1,
            max_tokens: 500,
            timeout_ms: 30000,
            max_concurrent: 4,
            dimension_weights: None,
        }
    }
}

/// Read an environment variable, falling back to `default` when unset
fn env_or<T>(key: &str, default: T) -> std::result::Result<T, ConfigurationError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value.trim().parse::<T>().map_err(|e| ConfigurationError::Invalid {
            field: key.to_string(),
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

impl TranslatorConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> std::result::Result<Self, ConfigurationError> {
        let defaults = Self::default();

        let dimension_weights = match std::env::var("DIMENSION_WEIGHTS") {
            Ok(value) => Some(DimensionWeights::parse(&value)?),
            Err(_) => None,
        };

        let config = Self {
            api_key: defaults.api_key,
            api_endpoint: defaults.api_endpoint,
            translation_model_id: env_or("TRANSLATION_MODEL", defaults.translation_model_id)?,
            evaluation_model_id: env_or("EVALUATION_MODEL", defaults.evaluation_model_id)?,
            quality_threshold: env_or("QUALITY_THRESHOLD", defaults.quality_threshold)?,
            max_retries: env_or("MAX_RETRIES", defaults.max_retries)?,
            translation_temperature: env_or("TRANSLATION_TEMPERATURE", defaults.translation_temperature)?,
            evaluation_temperature: env_or("EVALUATION_TEMPERATURE", defaults.evaluation_temperature)?,
            max_tokens: env_or("MAX_TOKENS", defaults.max_tokens)?,
            timeout_ms: env_or("REQUEST_TIMEOUT_MS", defaults.timeout_ms)?,
            max_concurrent: env_or("MAX_CONCURRENT", defaults.max_concurrent)?,
            dimension_weights,
        };

        info!(
            "Loaded config: translation={}, evaluation={}, threshold={}, max_retries={}",
            config.translation_model_id,
            config.evaluation_model_id,
            config.quality_threshold,
            config.max_retries
        );

        Ok(config)
    }

    /// Load from a JSON or YAML file, picked by extension
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| TranslationError::FileError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let is_yaml = path
            .extension()
            .map(|ext| {
                let ext = ext.to_string_lossy().to_lowercase();
                ext == "yaml" || ext == "yml"
            })
            .unwrap_or(false);

        let config: Self = if is_yaml {
            serde_yaml::from_str(&content)?
        } else {
            serde_json::from_str(&content)?
        };
        Ok(config)
    }

    /// Save configuration to file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the orchestration settings
    pub fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        if self.translation_model_id.trim().is_empty() {
            return Err(ConfigurationError::Missing("translation_model_id".to_string()));
        }

        if self.evaluation_model_id.trim().is_empty() {
            return Err(ConfigurationError::Missing("evaluation_model_id".to_string()));
        }

        if self.translation_model_id == self.evaluation_model_id {
            return Err(ConfigurationError::IdenticalModels(self.translation_model_id.clone()));
        }

        if !self.quality_threshold.is_finite() || !(0.0..=10.0).contains(&self.quality_threshold) {
            return Err(ConfigurationError::InvalidThreshold(self.quality_threshold));
        }

        if self.max_retries < 0 {
            return Err(ConfigurationError::NegativeRetryBudget(self.max_retries));
        }

        if let Some(weights) = &self.dimension_weights {
            weights.validate()?;
        }

        for (field, value) in [
            ("translation_temperature", self.translation_temperature),
            ("evaluation_temperature", self.evaluation_temperature),
        ] {
            if !value.is_finite() || !(0.0..=2.0).contains(&value) {
                return Err(ConfigurationError::Invalid {
                    field: field.to_string(),
                    message: format!("must be within [0, 2], got {}", value),
                });
            }
        }

        if self.max_tokens == 0 {
            return Err(ConfigurationError::Invalid {
                field: "max_tokens".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        if self.timeout_ms == 0 {
            return Err(ConfigurationError::Invalid {
                field: "timeout_ms".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        if self.max_concurrent == 0 {
            return Err(ConfigurationError::Invalid {
                field: "max_concurrent".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        if self.api_key.is_empty() {
            warn!("No API key configured; only injected model clients will work");
        }

        Ok(())
    }

    /// Per-call timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Effective dimension weights
    pub fn weights(&self) -> DimensionWeights {
        self.dimension_weights.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> TranslatorConfig {
        TranslatorConfig {
            api_key: "test_key".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_config_validation_identical_models() {
        let config = TranslatorConfig {
            evaluation_model_id: "gpt-3.5-turbo".to_string(),
            ..valid()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigurationError::IdenticalModels("gpt-3.5-turbo".to_string()))
        );
    }

    #[test]
    fn test_config_validation_threshold_bounds() {
        for threshold in [-0.1, 10.5, f64::NAN] {
            let config = TranslatorConfig {
                quality_threshold: threshold,
                ..valid()
            };
            assert!(matches!(config.validate(), Err(ConfigurationError::InvalidThreshold(_))));
        }

        for threshold in [0.0, 10.0] {
            let config = TranslatorConfig {
                quality_threshold: threshold,
                ..valid()
            };
            assert!(config.validate().is_ok());
        }
    }

    #[test]
    fn test_config_validation_negative_retries() {
        let config = TranslatorConfig {
            max_retries: -1,
            ..valid()
        };
        assert_eq!(config.validate(), Err(ConfigurationError::NegativeRetryBudget(-1)));
    }

    #[test]
    fn test_config_validation_weights() {
        let config = TranslatorConfig {
            dimension_weights: Some(DimensionWeights {
                accuracy: 0.6,
                fluency: 0.6,
                context_relevance: 0.0,
            }),
            ..valid()
        };
        assert!(matches!(config.validate(), Err(ConfigurationError::InvalidWeights { .. })));
    }

    #[test]
    fn test_config_file_round_trip_json_and_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let config = TranslatorConfig {
            quality_threshold: 7.0,
            max_retries: 4,
            ..valid()
        };

        let json_path = dir.path().join("config.json");
        config.to_file(&json_path).unwrap();
        assert_eq!(TranslatorConfig::from_file(&json_path).unwrap(), config);

        let yaml_path = dir.path().join("config.yaml");
        std::fs::write(
            &yaml_path,
            "translation_model_id: gpt-4o-mini\nevaluation_model_id: gpt-4o\nquality_threshold: 9.0\n",
        )
        .unwrap();
        let loaded = TranslatorConfig::from_file(&yaml_path).unwrap();
        assert_eq!(loaded.translation_model_id, "gpt-4o-mini");
        assert_eq!(loaded.quality_threshold, 9.0);
        assert_eq!(loaded.max_retries, 2);
    }

    #[test]
    fn test_from_file_missing() {
        let err = TranslatorConfig::from_file("/nonexistent/config.json").unwrap_err();
        assert!(matches!(err, TranslationError::FileError { .. }));
    }
}
