//! Model client capability and its OpenAI-compatible HTTP implementation

use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::config::TranslatorConfig;
use crate::core::errors::{ConfigurationError, ProviderError};
use crate::core::models::TokenUsage;

/// One completion call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: Option<String>,
    pub prompt: String,
    pub model_id: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Generated text plus the tokens it cost
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

/// Capability to call a generative model
///
/// Implementations report every failure as a [`ProviderError`]; they never
/// retry on their own.
#[async_trait]
pub trait ModelClient: Send + Sync + Debug {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError>;
}

/// Run `complete` under a deadline, mapping expiry to [`ProviderError::Timeout`]
pub async fn complete_with_timeout(
    client: &dyn ModelClient,
    request: CompletionRequest,
    timeout: Duration,
) -> Result<Completion, ProviderError> {
    match tokio::time::timeout(timeout, client.complete(request)).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout(timeout)),
    }
}

/// Client for OpenAI-compatible chat completion endpoints
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    api_endpoint: String,
    timeout: Duration,
}

impl OpenAiClient {
    /// Create a new client
    pub fn new(config: &TranslatorConfig) -> Result<Self, ConfigurationError> {
        if config.api_key.is_empty() {
            return Err(ConfigurationError::Missing("OPENAI_API_KEY".to_string()));
        }

        let timeout = config.timeout();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Some(Duration::from_secs(30)))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| ConfigurationError::Invalid {
                field: "http_client".to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            api_endpoint: config.api_endpoint.clone(),
            timeout,
        })
    }

    fn build_body(request: &CompletionRequest) -> serde_json::Value {
        let mut messages = Vec::new();
        if let Some(system) = &request.system_prompt {
            messages.push(serde_json::json!({ "role": "system", "content": system }));
        }
        messages.push(serde_json::json!({ "role": "user", "content": request.prompt }));

        serde_json::json!({
            "model": request.model_id,
            "messages": messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        })
    }

    fn map_send_error(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout(self.timeout)
        } else {
            ProviderError::Transient {
                message: err.to_string(),
            }
        }
    }

    /// Pull the completion text and usage out of a chat completions body
    fn parse_body(json: &serde_json::Value) -> Result<Completion, ProviderError> {
        let text = json["choices"]
            .get(0)
            .and_then(|c| c["message"]["content"].as_str())
            .ok_or_else(|| ProviderError::Permanent {
                message: "No completion text in response".to_string(),
            })?
            .trim()
            .to_string();

        let usage = TokenUsage::new(
            json["usage"]["prompt_tokens"].as_u64().unwrap_or(0),
            json["usage"]["completion_tokens"].as_u64().unwrap_or(0),
        );

        Ok(Completion { text, usage })
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        debug!("Calling model {} ({} prompt chars)", request.model_id, request.prompt.len());

        let response = self
            .client
            .post(&self.api_endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&Self::build_body(&request))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();

        if status.is_success() {
            let json: serde_json::Value = response.json().await.map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(self.timeout)
                } else {
                    ProviderError::Permanent {
                        message: format!("Invalid response body: {}", e),
                    }
                }
            })?;
            return Self::parse_body(&json);
        }

        let status_code = status.as_u16();

        // Read the header before the body consumes the response
        if status_code == 429 {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            warn!("Rate limited by {} (retry after {:?})", request.model_id, retry_after);
            return Err(ProviderError::RateLimited { retry_after });
        }

        let error_text = response.text().await.unwrap_or_default();
        let message = format!("{} - {}", status_code, error_text);

        if status.is_server_error() {
            Err(ProviderError::Transient { message })
        } else {
            Err(ProviderError::Permanent { message })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest {
            system_prompt: Some("You are a translator.".to_string()),
            prompt: "Translate: hi".to_string(),
            model_id: "gpt-3.5-turbo".to_string(),
            temperature: 0.3,
            max_tokens: 500,
        }
    }

    #[test]
    fn test_client_requires_api_key() {
        let config = TranslatorConfig {
            api_key: String::new(),
            ..Default::default()
        };
        assert!(OpenAiClient::new(&config).is_err());

        let config = TranslatorConfig {
            api_key: "test_key".to_string(),
            ..Default::default()
        };
        assert!(OpenAiClient::new(&config).is_ok());
    }

    #[test]
    fn test_build_body_includes_system_prompt() {
        let body = OpenAiClient::build_body(&request());
        assert_eq!(body["model"], "gpt-3.5-turbo");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Translate: hi");
        assert_eq!(body["max_tokens"], 500);
    }

    #[test]
    fn test_parse_body() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "  Hola mundo \n" } }],
            "usage": { "prompt_tokens": 42, "completion_tokens": 7, "total_tokens": 49 }
        });
        let completion = OpenAiClient::parse_body(&json).unwrap();
        assert_eq!(completion.text, "Hola mundo");
        assert_eq!(completion.usage, TokenUsage::new(42, 7));

        let empty = serde_json::json!({ "choices": [] });
        assert!(matches!(
            OpenAiClient::parse_body(&empty),
            Err(ProviderError::Permanent { .. })
        ));
    }
}
