//! Hybrid retrieval and grounding engine.
//!
//! A BM25 index is built once over a corpus snapshot and scored at query
//! time. Its hits are merged with those of a vector search service, and the
//! merged hits become a bounded, citation-labeled context for a text
//! generator.
//!
//! Per query: question → [`tokenize`] → [`Bm25Scorer`] → [`HybridMerger`]
//! (joined with [`VectorSearch`] output) → [`ContextAssembler`] → prompt
//! body → generation client.

pub mod bm25;
pub mod corpus;
pub mod embeddings;
pub mod index;
pub mod merge;
pub mod rag;
pub mod tokenizer;
pub mod types;
pub mod vector;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use bm25::Bm25Scorer;
pub use corpus::{CorpusSource, JsonlCorpus};
pub use embeddings::{create_provider, EmbeddingProvider};
pub use index::{IndexSnapshot, IndexStats, LexicalIndex, SnapshotStore};
pub use merge::HybridMerger;
pub use rag::{
    ContextAssembler, GroundedRequest, Prepared, PromptContext, RagPipeline, RagResponse,
    RetrievalOutcome, Timing, NO_RESULTS_MESSAGE,
};
pub use tokenizer::tokenize;
pub use types::{DocMetadata, Document, Hit, HitOrigin, VectorMatch};
pub use vector::{MemoryVectorStore, VectorSearch};
