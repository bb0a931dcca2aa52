//! Generation service integration for citerag.
//!
//! The retrieval engine only guarantees the shape of the prompt body it
//! hands off. This crate owns the transport: a provider-agnostic
//! [`LlmClient`] trait with single-shot and streaming completion, and an
//! Ollama implementation.
//!
//! # Example
//! ```no_run
//! use citerag_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("<SYSTEM>\n...\n</SYSTEM>", "gemma:2b");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
pub use factory::create_client;
pub use providers::OllamaClient;
