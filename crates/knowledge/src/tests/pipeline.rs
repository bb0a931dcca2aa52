//! Pipeline behavior: concurrency of both retrievers, degradation paths,
//! on-demand builds and generation.

use super::{ml_corpus, vector_match, StubLlm, StubVectorSearch};
use crate::corpus::CorpusSource;
use crate::index::SnapshotStore;
use crate::rag::{Prepared, RagPipeline, NO_RESULTS_MESSAGE};
use crate::types::{DocMetadata, HitOrigin};
use citerag_core::{GenerationConfig, RetrievalConfig};
use citerag_prompt::FALLBACK_ANSWER;
use std::sync::Arc;
use tempfile::TempDir;

const QUESTION: &str = "machine learning basics";

fn built_store(temp: &TempDir) -> Arc<SnapshotStore> {
    let store = SnapshotStore::new(temp.path().join("bm25_index.json"));
    store.rebuild(&ml_corpus()).unwrap();
    Arc::new(store)
}

fn pipeline(store: Arc<SnapshotStore>, retrieval: RetrievalConfig) -> RagPipeline {
    RagPipeline::new(retrieval, GenerationConfig::default(), store)
}

#[tokio::test]
async fn test_answer_grounds_prompt_in_merged_hits() {
    let temp = TempDir::new().unwrap();
    let llm = Arc::new(StubLlm::new(&["Machine learning starts with the basics (ml.pdf p.1 [bm25])."]));
    let vector = StubVectorSearch::new(vec![vector_match("ml.pdf", 1, "machine learning basics", 0.2)]);

    let pipeline = pipeline(built_store(&temp), RetrievalConfig::default())
        .with_vector_search(Arc::new(vector))
        .with_llm(llm.clone());

    let response = pipeline.answer(QUESTION).await.unwrap();

    assert_eq!(response.answer, "Machine learning starts with the basics (ml.pdf p.1 [bm25]).");
    assert!(!response.no_results);
    assert!(!response.low_confidence);
    assert_eq!(response.usage.as_ref().map(|u| u.total_tokens), Some(150));

    // The vector hit claims ml.pdf p.1 first, so its lexical duplicate is dropped
    assert_eq!(response.matches.len(), 3);
    assert_eq!(response.matches[0].metadata, DocMetadata::new("ml.pdf", 7));
    assert_eq!(response.matches[0].origin, HitOrigin::Lexical);
    assert_eq!(response.matches[2].metadata, DocMetadata::new("ml.pdf", 1));
    assert_eq!(response.matches[2].origin, HitOrigin::Vector);
    assert_eq!(
        response.citations,
        vec!["ml.pdf p.7 [bm25]", "cooking.pdf p.1 [bm25]", "ml.pdf p.1 [vector]"]
    );

    let request = llm.last_request().unwrap();
    assert!(!request.stream);
    assert_eq!(request.max_tokens, Some(350));
    assert!(request.prompt.starts_with("<SYSTEM>\n"));
    assert!(request.prompt.contains("175 words or fewer"));
    assert!(request.prompt.contains(FALLBACK_ANSWER));
    assert!(request.prompt.contains("[1] ml.pdf p.7 [bm25]\ndeep learning extends"));
    assert!(request.prompt.ends_with("</USER>"));
}

#[tokio::test]
async fn test_no_results_skips_generation() {
    let temp = TempDir::new().unwrap();
    let llm = Arc::new(StubLlm::new(&["unused"]));
    let pipeline = pipeline(built_store(&temp), RetrievalConfig::default()).with_llm(llm.clone());

    let response = pipeline.answer("quantum chromodynamics").await.unwrap();

    assert!(response.no_results);
    assert_eq!(response.answer, NO_RESULTS_MESSAGE);
    assert!(response.matches.is_empty());
    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn test_missing_index_is_built_from_corpus() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(SnapshotStore::new(temp.path().join("data/bm25_index.json")));
    let corpus: Arc<dyn CorpusSource> = Arc::new(ml_corpus());

    let pipeline = pipeline(Arc::clone(&store), RetrievalConfig::default()).with_corpus(corpus);
    let outcome = pipeline.retrieve(QUESTION).await.unwrap();

    assert_eq!(outcome.lexical_hits, 3);
    assert_eq!(outcome.hits[0].metadata, DocMetadata::new("ml.pdf", 1));
    assert!(store.path().exists());
}

#[tokio::test]
async fn test_missing_index_without_corpus_degrades_to_vector_hits() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(SnapshotStore::new(temp.path().join("bm25_index.json")));
    let vector = StubVectorSearch::new(vec![vector_match("ml.pdf", 1, "machine learning basics", 0.3)]);

    let pipeline = pipeline(store, RetrievalConfig::default()).with_vector_search(Arc::new(vector));
    let outcome = pipeline.retrieve(QUESTION).await.unwrap();

    assert_eq!(outcome.lexical_hits, 0);
    assert_eq!(outcome.hits.len(), 1);
    assert_eq!(outcome.hits[0].origin, HitOrigin::Vector);
}

#[tokio::test]
async fn test_corrupt_index_degrades_to_vector_hits() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("bm25_index.json");
    std::fs::write(&path, r#"{"avgdl": 1.0, "N": 5}"#).unwrap();

    let vector = StubVectorSearch::new(vec![vector_match("ml.pdf", 1, "machine learning basics", 0.3)]);
    let corpus: Arc<dyn CorpusSource> = Arc::new(ml_corpus());
    let pipeline = pipeline(Arc::new(SnapshotStore::new(&path)), RetrievalConfig::default())
        .with_corpus(corpus)
        .with_vector_search(Arc::new(vector));

    let outcome = pipeline.retrieve(QUESTION).await.unwrap();

    assert_eq!(outcome.lexical_hits, 0);
    assert_eq!(outcome.vector_hits, 1);
    assert_eq!(outcome.hits[0].metadata, DocMetadata::new("ml.pdf", 1));
}

#[tokio::test]
async fn test_vector_failure_degrades_to_lexical_hits() {
    let temp = TempDir::new().unwrap();
    let pipeline = pipeline(built_store(&temp), RetrievalConfig::default())
        .with_vector_search(Arc::new(StubVectorSearch::failing()));

    let outcome = pipeline.retrieve(QUESTION).await.unwrap();

    assert_eq!(outcome.vector_hits, 0);
    assert_eq!(outcome.hits.len(), 3);
    assert!(outcome.hits.iter().all(|h| h.origin == HitOrigin::Lexical));
}

#[tokio::test]
async fn test_malformed_vector_hits_are_dropped() {
    let temp = TempDir::new().unwrap();
    let mut broken = vector_match("ml.pdf", 1, "no page", 0.1);
    broken.metadata = serde_json::json!({"source_file": "ml.pdf"});
    let vector = StubVectorSearch::new(vec![broken, vector_match("extra.pdf", 2, "extra", 0.5)]);

    let pipeline = pipeline(built_store(&temp), RetrievalConfig::default())
        .with_vector_search(Arc::new(vector));
    let outcome = pipeline.retrieve(QUESTION).await.unwrap();

    assert_eq!(outcome.vector_hits, 1);
    assert!(outcome
        .hits
        .iter()
        .any(|h| h.metadata == DocMetadata::new("extra.pdf", 2)));
}

#[tokio::test]
async fn test_vector_only_mode() {
    let temp = TempDir::new().unwrap();
    let vector = StubVectorSearch::new(vec![
        vector_match("ml.pdf", 1, "machine learning basics", 0.2),
        vector_match("ml.pdf", 7, "deep learning", 0.4),
    ]);
    let retrieval = RetrievalConfig {
        lexical_enabled: false,
        ..RetrievalConfig::default()
    };

    let pipeline = pipeline(built_store(&temp), retrieval).with_vector_search(Arc::new(vector));
    let Prepared::Ready(request) = pipeline.prepare(QUESTION).await.unwrap() else {
        panic!("expected an assembled context");
    };

    assert_eq!(request.retrieval.lexical_hits, 0);
    assert_eq!(request.context.citations, vec!["ml.pdf p.1", "ml.pdf p.7"]);

    let body = request.prompt.to_body();
    assert!(!body.contains("words or fewer"));
    assert!(body.contains("(ml.pdf p.1, ml.pdf p.7)"));
}

#[tokio::test]
async fn test_low_confidence_falls_back_to_top_hits() {
    let temp = TempDir::new().unwrap();
    let vector = StubVectorSearch::new(vec![
        vector_match("a.pdf", 1, "first", 0.9),
        vector_match("b.pdf", 2, "second", 0.9),
        vector_match("c.pdf", 3, "third", 0.95),
    ]);
    let retrieval = RetrievalConfig {
        lexical_enabled: false,
        ..RetrievalConfig::default()
    };

    let pipeline = pipeline(built_store(&temp), retrieval).with_vector_search(Arc::new(vector));
    let Prepared::Ready(request) = pipeline.prepare(QUESTION).await.unwrap() else {
        panic!("expected an assembled context");
    };

    assert!(request.low_confidence);
    assert!(request.context.used_fallback);
    assert_eq!(request.context.citations, vec!["a.pdf p.1", "b.pdf p.2"]);
}

#[tokio::test]
async fn test_streaming_answer_collects_fragments() {
    let temp = TempDir::new().unwrap();
    let llm = Arc::new(StubLlm::new(&["Machine ", "learning ", "basics (ml.pdf p.1 [bm25]). "]));
    let pipeline = pipeline(built_store(&temp), RetrievalConfig::default()).with_llm(llm.clone());

    let Prepared::Ready(request) = pipeline.prepare(QUESTION).await.unwrap() else {
        panic!("expected an assembled context");
    };

    let mut seen = Vec::new();
    let response = pipeline
        .generate_streaming(&request, |fragment| seen.push(fragment.to_string()))
        .await
        .unwrap();

    assert_eq!(seen, vec!["Machine ", "learning ", "basics (ml.pdf p.1 [bm25]). "]);
    assert_eq!(response.answer, "Machine learning basics (ml.pdf p.1 [bm25]).");
    assert_eq!(response.usage.as_ref().map(|u| u.completion_tokens), Some(30));
    assert!(llm.last_request().unwrap().stream);
}

#[tokio::test]
async fn test_generation_requires_a_client() {
    let temp = TempDir::new().unwrap();
    let pipeline = pipeline(built_store(&temp), RetrievalConfig::default());

    assert!(pipeline.answer(QUESTION).await.is_err());
}

#[tokio::test]
async fn test_rebuild_swaps_index_for_later_queries() {
    let temp = TempDir::new().unwrap();
    let store = built_store(&temp);
    let pipeline = pipeline(Arc::clone(&store), RetrievalConfig::default());

    let before = pipeline.retrieve("sourdough").await.unwrap();
    assert_eq!(before.hits.len(), 1);

    let held = store.current().unwrap();
    store
        .rebuild(&[crate::types::Document::new(
            "new",
            "sourdough hydration and sourdough timing",
            DocMetadata::new("bread.pdf", 4),
        )])
        .unwrap();

    // A reader holding the old index still sees all of it
    assert_eq!(held.len(), 3);

    let after = pipeline.retrieve("sourdough").await.unwrap();
    assert_eq!(after.hits.len(), 1);
    assert_eq!(after.hits[0].metadata, DocMetadata::new("bread.pdf", 4));
}
