//! Generation client abstraction and request/response types.

use citerag_core::{AppResult, GenerationConfig};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    /// The prompt body to send
    pub prompt: String,

    /// Model identifier (e.g., "gemma:2b")
    pub model: String,

    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Temperature for sampling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Enable streaming responses
    #[serde(default)]
    pub stream: bool,
}

impl LlmRequest {
    /// Create a new request with required fields.
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            max_tokens: None,
            temperature: None,
            stream: false,
        }
    }

    /// Create a request carrying the sampling options from configuration.
    pub fn from_config(prompt: impl Into<String>, config: &GenerationConfig) -> Self {
        let request = Self::new(prompt, config.model.clone())
            .with_temperature(config.temperature)
            .with_max_tokens(config.num_predict);

        if config.stream {
            request.with_streaming()
        } else {
            request
        }
    }

    /// Enable streaming for this request.
    pub fn with_streaming(mut self) -> Self {
        self.stream = true;
        self
    }

    /// Set the maximum tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the temperature for sampling.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Completed generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// The generated text
    pub content: String,

    /// Model that generated the response
    pub model: String,

    /// Token counters and provider-side timings
    pub usage: LlmUsage,

    /// Whether the response was complete
    #[serde(default = "default_true")]
    pub done: bool,
}

fn default_true() -> bool {
    true
}

/// Token counters reported by the provider, with optional timings.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct LlmUsage {
    /// Tokens in the prompt
    #[serde(default)]
    pub prompt_tokens: u32,

    /// Tokens in the completion
    #[serde(default)]
    pub completion_tokens: u32,

    /// Total tokens used
    #[serde(default)]
    pub total_tokens: u32,

    /// Seconds spent generating completion tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_secs: Option<f64>,

    /// Seconds spent evaluating the prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_eval_secs: Option<f64>,

    /// Seconds spent loading the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_secs: Option<f64>,
}

impl LlmUsage {
    /// Create usage stats from prompt and completion token counts.
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            ..Default::default()
        }
    }
}

/// A fragment of a streaming response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmStreamChunk {
    /// Incremental text content
    pub content: String,

    /// Model generating the stream
    pub model: String,

    /// Whether this is the final fragment
    #[serde(default)]
    pub done: bool,

    /// Token counters, only on the final fragment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<LlmUsage>,
}

/// Stream of generation fragments.
pub type LlmStream = Pin<Box<dyn Stream<Item = AppResult<LlmStreamChunk>> + Send>>;

/// Trait for generation providers.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Get the provider name (e.g., "ollama").
    fn provider_name(&self) -> &str;

    /// Perform a non-streaming completion.
    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse>;

    /// Perform a streaming completion.
    ///
    /// The final fragment has `done == true` and carries the usage counters.
    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_from_config() {
        let config = GenerationConfig::default();
        let request = LlmRequest::from_config("body", &config);

        assert_eq!(request.model, "gemma:2b");
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.max_tokens, Some(350));
        assert!(request.stream);
    }

    #[test]
    fn test_request_without_streaming() {
        let config = GenerationConfig {
            stream: false,
            ..Default::default()
        };
        assert!(!LlmRequest::from_config("body", &config).stream);
    }

    #[test]
    fn test_usage_totals() {
        let usage = LlmUsage::new(120, 30);
        assert_eq!(usage.total_tokens, 150);
        assert!(usage.eval_secs.is_none());
    }
}
