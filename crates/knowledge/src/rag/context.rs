//! Grounded context assembly.
//!
//! Merged hits become numbered, labeled blocks under a character budget,
//! plus the citation labels the generator is told to use.

use crate::types::Hit;
use citerag_core::{AppError, AppResult, RetrievalConfig};
use citerag_prompt::{build_prompt, BuiltPrompt, GroundedInput, PromptDefinition};
use serde::Serialize;

/// Appended to a context cut at the character budget.
pub const TRUNCATION_MARKER: &str = "\n… [truncated]";

/// Hits kept when none reach the relevance threshold.
pub const FALLBACK_HITS: usize = 2;

/// Bounded, citation-labeled context for one question.
#[derive(Debug, Clone, Serialize)]
pub struct PromptContext {
    /// The question being grounded
    pub question: String,

    /// Hits that made it into the context, in order
    pub hits: Vec<Hit>,

    /// `"[i] label\n<text>"` blocks, before truncation
    pub blocks: Vec<String>,

    /// Citation labels in block order
    pub citations: Vec<String>,

    /// Joined blocks, cut to the budget
    pub context: String,

    /// Whether the context was cut
    pub truncated: bool,

    /// Whether no hit reached the threshold and the top hits were used anyway
    pub used_fallback: bool,
}

impl PromptContext {
    /// Citation labels joined with `", "`.
    pub fn citation_note(&self) -> String {
        self.citations.join(", ")
    }
}

/// Builds prompt contexts from merged hits.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    min_score: f64,
    char_budget: usize,
    label_origins: bool,
}

impl ContextAssembler {
    /// Create an assembler.
    ///
    /// `label_origins` appends `[vector]` / `[bm25]` to citation labels.
    pub fn new(min_score: f64, char_budget: usize, label_origins: bool) -> Self {
        Self {
            min_score,
            char_budget,
            label_origins,
        }
    }

    /// Create an assembler from retrieval configuration.
    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self::new(config.min_score, config.context_char_budget, config.label_origins)
    }

    /// Assemble the context for `question` from merged, sorted hits.
    ///
    /// Hits scoring below the threshold are dropped; if that leaves nothing,
    /// the first [`FALLBACK_HITS`] hits are used regardless of score.
    ///
    /// # Errors
    /// `Knowledge` when `hits` is empty. Callers report "no results"
    /// instead of assembling.
    pub fn assemble(&self, question: &str, hits: &[Hit]) -> AppResult<PromptContext> {
        if hits.is_empty() {
            return Err(AppError::Knowledge(
                "Cannot assemble a context without hits".to_string(),
            ));
        }

        let relevant: Vec<Hit> = hits
            .iter()
            .filter(|hit| hit.score >= self.min_score)
            .cloned()
            .collect();

        let used_fallback = relevant.is_empty();
        let selected = if used_fallback {
            tracing::warn!(
                min_score = self.min_score,
                top_score = hits[0].score,
                "No hit reached the relevance threshold, using the top {} anyway",
                FALLBACK_HITS
            );
            hits.iter().take(FALLBACK_HITS).cloned().collect()
        } else {
            relevant
        };

        let mut blocks = Vec::with_capacity(selected.len());
        let mut citations = Vec::with_capacity(selected.len());
        for (i, hit) in selected.iter().enumerate() {
            let label = hit.label(self.label_origins);
            blocks.push(format!("[{}] {}\n{}", i + 1, label, hit.text));
            citations.push(label);
        }

        let (context, truncated) = truncate_chars(&blocks.join("\n\n"), self.char_budget);

        tracing::debug!(
            blocks = blocks.len(),
            truncated,
            chars = context.chars().count(),
            "Assembled context"
        );

        Ok(PromptContext {
            question: question.to_string(),
            hits: selected,
            blocks,
            citations,
            context,
            truncated,
            used_fallback,
        })
    }

    /// Render the grounded prompt for an assembled context.
    pub fn render(
        &self,
        context: &PromptContext,
        definition: &PromptDefinition,
        approx_words: Option<u32>,
    ) -> AppResult<BuiltPrompt> {
        let mut input = GroundedInput::new(
            context.question.clone(),
            context.context.clone(),
            context.citation_note(),
        );
        if let Some(words) = approx_words {
            input = input.with_approx_words(words);
        }

        build_prompt(definition, &input)
    }
}

/// Answer length hint for a token budget, about half a word per token.
pub fn approx_words(num_predict: u32) -> u32 {
    num_predict / 2
}

/// Keep the first `budget` characters, appending [`TRUNCATION_MARKER`]
/// when anything was cut. Cuts may land inside a block.
pub fn truncate_chars(text: &str, budget: usize) -> (String, bool) {
    match text.char_indices().nth(budget) {
        Some((byte_idx, _)) => (format!("{}{}", &text[..byte_idx], TRUNCATION_MARKER), true),
        None => (text.to_string(), false),
    }
}
