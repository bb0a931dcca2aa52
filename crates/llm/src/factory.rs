//! Generation provider factory.
//!
//! Resolves the configured provider name into a client implementation.

use crate::client::LlmClient;
use crate::providers::OllamaClient;
use citerag_core::{AppError, AppResult, GenerationConfig};
use std::sync::Arc;
use std::time::Duration;

/// Create a generation client from configuration.
///
/// The client carries the configured request timeout; a timeout of zero
/// disables it.
///
/// # Errors
/// Returns `AppError::Config` for an unknown provider and `AppError::Llm`
/// if the HTTP client cannot be built.
pub fn create_client(config: &GenerationConfig) -> AppResult<Arc<dyn LlmClient>> {
    match config.provider.to_lowercase().as_str() {
        "ollama" => {
            let client = if config.timeout_secs == 0 {
                OllamaClient::with_base_url(config.endpoint.as_str())
            } else {
                OllamaClient::with_timeout(
                    config.endpoint.as_str(),
                    Duration::from_secs(config.timeout_secs),
                )?
            };
            tracing::debug!(endpoint = %config.endpoint, "Created Ollama client");
            Ok(Arc::new(client))
        }
        other => Err(AppError::Config(format!(
            "Unknown generation provider: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama_client() {
        let client = create_client(&GenerationConfig::default()).unwrap();
        assert_eq!(client.provider_name(), "ollama");
    }

    #[test]
    fn test_create_ollama_without_timeout() {
        let config = GenerationConfig {
            provider: "Ollama".to_string(),
            endpoint: "http://localhost:8080".to_string(),
            timeout_secs: 0,
            ..Default::default()
        };
        assert!(create_client(&config).is_ok());
    }

    #[test]
    fn test_unknown_provider() {
        let config = GenerationConfig {
            provider: "unknown".to_string(),
            ..Default::default()
        };
        match create_client(&config) {
            Err(AppError::Config(msg)) => assert!(msg.contains("Unknown generation provider")),
            Err(other) => panic!("Unexpected error: {other}"),
            Ok(_) => panic!("Expected error for unknown provider"),
        }
    }
}
