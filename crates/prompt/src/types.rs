//! Prompt types for citerag.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Phrase the generator must answer with when the context does not
/// support an answer.
pub const FALLBACK_ANSWER: &str = "I don't know based on the provided documents.";

/// A prompt definition: a pair of Handlebars templates.
///
/// Templates see the variables `question`, `context`, `citation_note`,
/// `approx_words` (absent when no word budget applies) and `fallback`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Creator identifier
    #[serde(rename = "createdBy", default)]
    pub created_by: String,

    /// System section template
    pub system: String,

    /// User section template
    pub user: String,
}

/// Values substituted into a grounded prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundedInput {
    /// The question being answered
    pub question: String,

    /// Labeled context blocks, already bounded
    pub context: String,

    /// Comma-joined citation labels in block order
    pub citation_note: String,

    /// Answer length hint in words
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approx_words: Option<u32>,
}

impl GroundedInput {
    /// Create an input without a word budget.
    pub fn new(
        question: impl Into<String>,
        context: impl Into<String>,
        citation_note: impl Into<String>,
    ) -> Self {
        Self {
            question: question.into(),
            context: context.into(),
            citation_note: citation_note.into(),
            approx_words: None,
        }
    }

    /// Set the answer length hint.
    pub fn with_approx_words(mut self, words: u32) -> Self {
        self.approx_words = Some(words);
        self
    }
}

/// A rendered prompt ready for the generation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    /// System section
    pub system: String,

    /// User section
    pub user: String,

    /// Metadata about the built prompt
    pub metadata: BuiltPromptMetadata,
}

/// Metadata about a built prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPromptMetadata {
    /// Source prompt ID
    #[serde(rename = "sourcePromptId")]
    pub source_prompt_id: String,

    /// Template variables that were resolved
    #[serde(rename = "resolvedVariables")]
    pub resolved_variables: HashMap<String, String>,
}

impl BuiltPrompt {
    /// The single text body with delimited system and user sections.
    pub fn to_body(&self) -> String {
        format!(
            "<SYSTEM>\n{}\n</SYSTEM>\n<USER>\n{}\n</USER>",
            self.system, self.user
        )
    }
}
