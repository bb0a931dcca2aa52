//! Command handlers for the citerag CLI.

pub mod ask;
pub mod index;
pub mod search;
pub mod stats;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use index::IndexCommand;
pub use search::SearchCommand;
pub use stats::StatsCommand;

use citerag_core::{config::AppConfig, AppError, AppResult, RetrievalConfig};
use citerag_knowledge::{
    create_provider, CorpusSource, Hit, JsonlCorpus, MemoryVectorStore, RagPipeline, SnapshotStore,
    VectorSearch,
};
use citerag_prompt::load_grounded_prompt;
use std::sync::Arc;

/// Pipeline over the workspace index, corpus and local vector store.
///
/// A vector store that cannot be built leaves the pipeline lexical-only.
pub(crate) async fn build_pipeline(
    config: &AppConfig,
    retrieval: RetrievalConfig,
) -> AppResult<RagPipeline> {
    let store = Arc::new(SnapshotStore::new(config.index_path()));
    let corpus = Arc::new(JsonlCorpus::new(config.corpus_path()));

    let mut pipeline = RagPipeline::new(retrieval, config.generation.clone(), store)
        .with_corpus(corpus.clone())
        .with_prompt(load_grounded_prompt(&config.workspace)?);

    match vector_store(config, Arc::clone(&corpus)).await {
        Ok(vector) => pipeline = pipeline.with_vector_search(vector),
        Err(e) => tracing::warn!(error = %e, "Vector search unavailable, using lexical retrieval only"),
    }

    Ok(pipeline)
}

async fn vector_store(
    config: &AppConfig,
    corpus: Arc<JsonlCorpus>,
) -> AppResult<Arc<dyn VectorSearch>> {
    let documents = tokio::task::spawn_blocking(move || corpus.load())
        .await
        .map_err(|e| AppError::Knowledge(format!("Corpus loading task failed: {}", e)))??;

    let provider = create_provider(&config.vector, &config.generation.endpoint)?;
    let store = MemoryVectorStore::from_documents(&documents, provider).await?;
    Ok(Arc::new(store))
}

/// Apply command-line retrieval overrides and validate the result.
pub(crate) fn retrieval_config(
    config: &AppConfig,
    top_k: Option<usize>,
    min_score: Option<f64>,
) -> AppResult<RetrievalConfig> {
    let mut retrieval = config.retrieval.clone();
    if let Some(top_k) = top_k {
        retrieval.top_k = top_k;
    }
    if let Some(min_score) = min_score {
        retrieval.min_score = min_score;
    }
    retrieval.validate()?;
    Ok(retrieval)
}

/// `[i] source p.page — score=… (origin)`
pub(crate) fn match_line(rank: usize, hit: &Hit) -> String {
    format!(
        "[{}] {} — score={:.4} ({})",
        rank,
        hit.metadata.label(),
        hit.score,
        hit.origin.tag()
    )
}

/// First `max_chars` characters of `text`, with an ellipsis when cut.
pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &flat[..idx]),
        None => flat,
    }
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> AppResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}
