//! Embedding providers for the local vector adapter.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};
