//! citerag core library
//!
//! Foundational utilities shared by every citerag crate:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management, including the retrieval and generation
//!   value objects handed to the engine

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{
    AppConfig, Bm25Params, GenerationConfig, MergeStrategy, PathsConfig, RetrievalConfig,
    VectorConfig,
};
pub use error::{AppError, AppResult};
