//! Embedding provider trait and factory.

use super::providers::{OllamaProvider, TrigramProvider};
use citerag_core::{AppError, AppResult, VectorConfig};
use std::sync::Arc;

/// Trait for embedding providers.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "trigram", "ollama")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in a batch.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Knowledge("No embedding returned".to_string()))
    }
}

/// Create an embedding provider from configuration.
///
/// `endpoint` is the Ollama base URL, shared with the generation service.
pub fn create_provider(config: &VectorConfig, endpoint: &str) -> AppResult<Arc<dyn EmbeddingProvider>> {
    if config.dimensions == 0 {
        return Err(AppError::Config(
            "vector.dimensions must be at least 1".to_string(),
        ));
    }

    match config.provider.to_lowercase().as_str() {
        "trigram" => Ok(Arc::new(TrigramProvider::new(config.dimensions))),

        "ollama" => {
            let provider = OllamaProvider::new(endpoint, &config.model, config.dimensions)?;
            Ok(Arc::new(provider))
        }

        _ => Err(AppError::Config(format!(
            "Unknown embedding provider: '{}'. Supported providers: trigram, ollama",
            config.provider
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_trigram_provider() {
        let provider = create_provider(&VectorConfig::default(), "http://localhost:11434").unwrap();
        assert_eq!(provider.provider_name(), "trigram");
        assert_eq!(provider.dimensions(), 384);
    }

    #[test]
    fn test_create_ollama_provider() {
        let config = VectorConfig {
            provider: "ollama".to_string(),
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
        };

        let provider = create_provider(&config, "http://localhost:11434").unwrap();
        assert_eq!(provider.provider_name(), "ollama");
        assert_eq!(provider.model_name(), "nomic-embed-text");
    }

    #[test]
    fn test_create_unknown_provider() {
        let config = VectorConfig {
            provider: "unknown".to_string(),
            ..Default::default()
        };

        let result = create_provider(&config, "http://localhost:11434");
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Unknown embedding provider"));
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let config = VectorConfig {
            dimensions: 0,
            ..Default::default()
        };
        assert!(matches!(
            create_provider(&config, "http://localhost:11434"),
            Err(AppError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_provider_embed_single() {
        let provider = create_provider(&VectorConfig::default(), "http://localhost:11434").unwrap();
        let embedding = provider.embed("test text").await.unwrap();
        assert_eq!(embedding.len(), 384);
    }
}
