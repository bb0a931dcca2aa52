//! Index command handler.
//!
//! Builds the lexical index over the corpus and publishes it atomically.

use clap::Args;
use citerag_core::{config::AppConfig, AppResult};
use citerag_knowledge::{CorpusSource, IndexStats, JsonlCorpus, SnapshotStore};
use std::path::PathBuf;
use std::time::Instant;

/// Build the lexical index from the corpus
#[derive(Args, Debug)]
pub struct IndexCommand {
    /// Corpus file or directory of *.jsonl chunks (default: paths.corpus_path)
    #[arg(long)]
    pub corpus: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IndexCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing index command");

        let corpus_path = self.corpus.clone().unwrap_or_else(|| config.corpus_path());
        let index_path = config.index_path();

        let start = Instant::now();
        let stats = tokio::task::spawn_blocking(move || build_index(corpus_path, index_path))
            .await
            .map_err(|e| citerag_core::AppError::Other(format!("Index task failed: {}", e)))??;
        let elapsed = start.elapsed().as_secs_f64();

        if self.json {
            super::print_json(&stats)?;
        } else {
            println!(
                "Indexed {} documents ({} tokens in vocabulary, avgdl {:.2}) in {:.2}s",
                stats.documents, stats.vocabulary, stats.avgdl, elapsed
            );
            println!("Index: {}", stats.path.display());
        }

        Ok(())
    }
}

fn build_index(corpus_path: PathBuf, index_path: PathBuf) -> AppResult<IndexStats> {
    let documents = JsonlCorpus::new(corpus_path).load()?;
    let store = SnapshotStore::new(index_path);
    store.rebuild(&documents)?;
    store.stats()
}

#[cfg(test)]
mod tests {
    use super::*;
    use citerag_core::AppError;
    use tempfile::TempDir;

    #[test]
    fn test_build_index_from_jsonl() {
        let temp = TempDir::new().unwrap();
        let corpus = temp.path().join("chunks.jsonl");
        std::fs::write(
            &corpus,
            concat!(
                r#"{"id": "a", "text": "retrieval engines rank passages", "metadata": {"source_file": "ir.pdf", "page_number": 1}}"#,
                "\n",
                r#"{"id": "b", "text": "lexical retrieval uses term statistics", "metadata": {"source_file": "ir.pdf", "page_number": 2}}"#,
                "\n",
            ),
        )
        .unwrap();

        let stats = build_index(corpus, temp.path().join("data/bm25_index.json")).unwrap();

        assert_eq!(stats.documents, 2);
        assert!((stats.avgdl - 4.5).abs() < 1e-9);
        assert!(stats.size_bytes > 0);
        assert!(stats.path.exists());
    }

    #[test]
    fn test_empty_corpus_is_rejected() {
        let temp = TempDir::new().unwrap();
        let corpus = temp.path().join("chunks.jsonl");
        std::fs::write(&corpus, "\n").unwrap();

        let result = build_index(corpus, temp.path().join("bm25_index.json"));
        assert!(matches!(result, Err(AppError::EmptyCorpus)));
    }
}
