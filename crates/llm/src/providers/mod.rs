//! Generation service providers.

pub mod ollama;

pub use ollama::OllamaClient;
