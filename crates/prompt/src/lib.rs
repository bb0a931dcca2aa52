//! Grounded prompt rendering for citerag.
//!
//! This crate provides:
//! - The built-in grounded prompt (system and user Handlebars templates)
//! - YAML prompt definitions that override it per workspace
//! - Rendering into the `<SYSTEM>`/`<USER>` tagged body handed to the
//!   generation service

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use loader::{load_grounded_prompt, load_prompt, GROUNDED_PROMPT_ID};
pub use types::{BuiltPrompt, BuiltPromptMetadata, GroundedInput, PromptDefinition, FALLBACK_ANSWER};
