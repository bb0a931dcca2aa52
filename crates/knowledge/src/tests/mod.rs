//! End-to-end retrieval and answering tests, with in-process stand-ins for
//! the vector search and generation services.

mod pipeline;

use crate::types::{DocMetadata, Document, VectorMatch};
use crate::vector::VectorSearch;
use citerag_core::{AppError, AppResult};
use citerag_llm::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Three documents about machine learning and baking.
pub(crate) fn ml_corpus() -> Vec<Document> {
    vec![
        Document::new(
            "ml-intro",
            "machine learning basics for beginners",
            DocMetadata::new("ml.pdf", 1),
        ),
        Document::new(
            "ml-deep",
            "deep learning extends machine learning with neural networks",
            DocMetadata::new("ml.pdf", 7),
        ),
        Document::new(
            "baking",
            "bread baking basics and sourdough starters",
            DocMetadata::new("cooking.pdf", 1),
        ),
    ]
}

pub(crate) fn vector_match(source_file: &str, page_number: u32, text: &str, distance: f64) -> VectorMatch {
    VectorMatch {
        text: text.to_string(),
        metadata: serde_json::json!({"source_file": source_file, "page_number": page_number}),
        distance,
    }
}

/// Vector service returning fixed matches, or failing.
pub(crate) struct StubVectorSearch {
    matches: Vec<VectorMatch>,
    fail: bool,
}

impl StubVectorSearch {
    pub(crate) fn new(matches: Vec<VectorMatch>) -> Self {
        Self { matches, fail: false }
    }

    pub(crate) fn failing() -> Self {
        Self {
            matches: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait::async_trait]
impl VectorSearch for StubVectorSearch {
    fn name(&self) -> &str {
        "stub"
    }

    async fn query(&self, _text: &str, k: usize) -> AppResult<Vec<VectorMatch>> {
        if self.fail {
            return Err(AppError::Knowledge("vector service unreachable".to_string()));
        }
        Ok(self.matches.iter().take(k).cloned().collect())
    }
}

/// Generator answering with fixed fragments and recording prompts.
pub(crate) struct StubLlm {
    fragments: Vec<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<LlmRequest>>,
}

impl StubLlm {
    pub(crate) fn new(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_request(&self) -> Option<LlmRequest> {
        self.prompts.lock().unwrap().last().cloned()
    }

    fn record(&self, request: &LlmRequest) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.clone());
    }
}

#[async_trait::async_trait]
impl LlmClient for StubLlm {
    fn provider_name(&self) -> &str {
        "stub"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.record(request);
        Ok(LlmResponse {
            content: self.fragments.concat().trim().to_string(),
            model: request.model.clone(),
            usage: LlmUsage::new(120, 30),
            done: true,
        })
    }

    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        self.record(request);

        let mut chunks: Vec<AppResult<LlmStreamChunk>> = self
            .fragments
            .iter()
            .map(|content| {
                Ok(LlmStreamChunk {
                    content: content.clone(),
                    model: request.model.clone(),
                    done: false,
                    usage: None,
                })
            })
            .collect();
        chunks.push(Ok(LlmStreamChunk {
            content: String::new(),
            model: request.model.clone(),
            done: true,
            usage: Some(LlmUsage::new(120, 30)),
        }));

        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}
