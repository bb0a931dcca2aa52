//! RAG response types.

use crate::rag::context::PromptContext;
use crate::types::Hit;
use citerag_llm::LlmUsage;
use citerag_prompt::BuiltPrompt;
use serde::Serialize;

/// Printed and returned when retrieval produced nothing.
pub const NO_RESULTS_MESSAGE: &str = "No results found.";

/// Merged hits for one question, before any generation.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalOutcome {
    /// The question asked
    pub question: String,

    /// Merged hits, best first
    pub hits: Vec<Hit>,

    /// Vector hits that survived normalization
    pub vector_hits: usize,

    /// Lexical hits scored
    pub lexical_hits: usize,

    /// Wall-clock retrieval time
    pub elapsed_secs: f64,
}

impl RetrievalOutcome {
    /// Whether nothing was retrieved.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Best merged score, if any.
    pub fn best_score(&self) -> Option<f64> {
        self.hits.first().map(|hit| hit.score)
    }
}

/// Everything needed to ask the generator about one question.
#[derive(Debug, Clone)]
pub struct GroundedRequest {
    /// Retrieval that produced the context
    pub retrieval: RetrievalOutcome,

    /// Assembled context and citations
    pub context: PromptContext,

    /// Rendered prompt
    pub prompt: BuiltPrompt,

    /// Best merged score fell below the relevance threshold
    pub low_confidence: bool,
}

/// Result of preparing a question for generation.
#[derive(Debug, Clone)]
pub enum Prepared {
    /// Nothing retrieved; assembly was skipped
    NoResults(RetrievalOutcome),

    /// Context assembled and prompt rendered
    Ready(Box<GroundedRequest>),
}

/// Wall-clock timings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Timing {
    /// Seconds spent retrieving and merging
    pub retrieval_secs: f64,

    /// Seconds spent waiting on the generator
    pub generation_secs: f64,
}

/// Answer to a question, with what it was grounded on.
#[derive(Debug, Clone, Serialize)]
pub struct RagResponse {
    /// The question asked
    pub question: String,

    /// Generated answer, or [`NO_RESULTS_MESSAGE`]
    pub answer: String,

    /// Merged hits, best first
    pub matches: Vec<Hit>,

    /// Citation labels offered to the generator
    pub citations: Vec<String>,

    /// Best merged score fell below the relevance threshold
    pub low_confidence: bool,

    /// Retrieval produced nothing
    pub no_results: bool,

    /// The context was cut at the character budget
    pub context_truncated: bool,

    /// Wall-clock timings
    pub timing: Timing,

    /// Token counters from the generator
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<LlmUsage>,
}

impl RagResponse {
    /// Response for a question nothing was retrieved for.
    pub fn no_results(retrieval: RetrievalOutcome) -> Self {
        Self {
            question: retrieval.question,
            answer: NO_RESULTS_MESSAGE.to_string(),
            matches: Vec::new(),
            citations: Vec::new(),
            low_confidence: false,
            no_results: true,
            context_truncated: false,
            timing: Timing {
                retrieval_secs: retrieval.elapsed_secs,
                generation_secs: 0.0,
            },
            usage: None,
        }
    }

    /// Response carrying a generated answer.
    pub fn answered(
        request: &GroundedRequest,
        answer: impl Into<String>,
        usage: Option<LlmUsage>,
        generation_secs: f64,
    ) -> Self {
        Self {
            question: request.retrieval.question.clone(),
            answer: answer.into(),
            matches: request.retrieval.hits.clone(),
            citations: request.context.citations.clone(),
            low_confidence: request.low_confidence,
            no_results: false,
            context_truncated: request.context.truncated,
            timing: Timing {
                retrieval_secs: request.retrieval.elapsed_secs,
                generation_secs,
            },
            usage,
        }
    }
}
