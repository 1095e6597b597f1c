//! Chat-completion provider seam.
//!
//! The engine only needs a system+user message pair answered with text,
//! plus a "prefer JSON output" hint for the batch path. Providers are
//! opaque external services with their own availability contract.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

/// LLM call failure. Always recoverable at the engine level: batch failures
/// fall back to per-rule validation, per-rule failures become pending
/// results.
#[derive(Debug, thiserror::Error)]
pub enum ValidationCallError {
    #[error("llm request failed: {0}")]
    Request(String),
    #[error("llm service error: {0}")]
    Service(String),
    #[error("malformed llm response: {0}")]
    MalformedResponse(String),
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Send one system+user exchange and return the assistant text.
    /// `prefer_json` asks the provider for machine-readable output where
    /// the backend supports it.
    async fn chat(
        &self,
        system: &str,
        user: &str,
        prefer_json: bool,
    ) -> Result<String, ValidationCallError>;
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Expired calls surface as [`ValidationCallError`] and take the same
    /// fallback path as any other failure.
    pub timeout_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            max_tokens: 4096,
            timeout_ms: 90_000,
        }
    }
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiCompatibleProvider {
    client: reqwest::Client,
    config: ProviderConfig,
}

impl OpenAiCompatibleProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ValidationCallError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ValidationCallError::Request(format!("client init failed: {e}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatibleProvider {
    async fn chat(
        &self,
        system: &str,
        user: &str,
        prefer_json: bool,
    ) -> Result<String, ValidationCallError> {
        debug!(model = %self.config.model, prefer_json, "issuing chat completion");

        let mut body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });
        if prefer_json {
            body["response_format"] = json!({ "type": "json_object" });
        }

        let mut request = self
            .client
            .post(format!(
                "{}/chat/completions",
                self.config.base_url.trim_end_matches('/')
            ))
            .json(&body);

        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ValidationCallError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| ValidationCallError::Service(e.to_string()))?;

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ValidationCallError::MalformedResponse(e.to_string()))?;

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                ValidationCallError::MalformedResponse("missing message content".to_string())
            })
    }
}
