//! RAG answering orchestration.
//!
//! Runs lexical and vector retrieval concurrently, merges the hits, assembles
//! a grounded context and hands the prompt to the generator.

use crate::bm25::Bm25Scorer;
use crate::corpus::CorpusSource;
use crate::index::SnapshotStore;
use crate::merge::HybridMerger;
use crate::rag::context::{approx_words, ContextAssembler};
use crate::rag::types::{GroundedRequest, Prepared, RagResponse, RetrievalOutcome};
use crate::types::Hit;
use crate::vector::{normalize_matches, VectorSearch};
use citerag_core::{AppError, AppResult, GenerationConfig, MergeStrategy, RetrievalConfig};
use citerag_llm::{LlmClient, LlmRequest, LlmStream};
use citerag_prompt::loader::default_grounded_prompt;
use citerag_prompt::PromptDefinition;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;

/// Hybrid retrieval and grounded answering over one corpus.
///
/// Configuration is passed in explicitly; nothing here reads the
/// environment. Every collaborator except the snapshot store is optional:
/// without a vector service only lexical hits are merged, without a corpus
/// a missing index cannot be rebuilt, and without a client only retrieval
/// and prompt preparation are available.
pub struct RagPipeline {
    retrieval: RetrievalConfig,
    generation: GenerationConfig,
    store: Arc<SnapshotStore>,
    corpus: Option<Arc<dyn CorpusSource>>,
    vector: Option<Arc<dyn VectorSearch>>,
    llm: Option<Arc<dyn LlmClient>>,
    prompt: PromptDefinition,
}

impl RagPipeline {
    /// Create a pipeline over the index in `store`.
    pub fn new(
        retrieval: RetrievalConfig,
        generation: GenerationConfig,
        store: Arc<SnapshotStore>,
    ) -> Self {
        Self {
            retrieval,
            generation,
            store,
            corpus: None,
            vector: None,
            llm: None,
            prompt: default_grounded_prompt(),
        }
    }

    /// Corpus used to build the index on demand when no snapshot exists.
    pub fn with_corpus(mut self, corpus: Arc<dyn CorpusSource>) -> Self {
        self.corpus = Some(corpus);
        self
    }

    /// Vector search service queried alongside the lexical index.
    pub fn with_vector_search(mut self, vector: Arc<dyn VectorSearch>) -> Self {
        self.vector = Some(vector);
        self
    }

    /// Generation client.
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Replace the grounded prompt definition.
    pub fn with_prompt(mut self, prompt: PromptDefinition) -> Self {
        self.prompt = prompt;
        self
    }

    /// Retrieval configuration in use.
    pub fn retrieval_config(&self) -> &RetrievalConfig {
        &self.retrieval
    }

    /// Retrieve and merge hits for `question`.
    ///
    /// Lexical scoring runs on the blocking pool while the vector service is
    /// queried. A failing side contributes no hits instead of failing the
    /// query.
    pub async fn retrieve(&self, question: &str) -> AppResult<RetrievalOutcome> {
        let start = Instant::now();

        let (lexical, vector) = tokio::join!(self.lexical_hits(question), self.vector_hits(question));

        let vector_count = vector.len();
        let lexical_count = lexical.len();
        let hits = HybridMerger::from_config(&self.retrieval).merge(vector, lexical);

        tracing::info!(
            vector_hits = vector_count,
            lexical_hits = lexical_count,
            merged = hits.len(),
            "Retrieval complete"
        );
        for (i, hit) in hits.iter().enumerate() {
            tracing::debug!(
                rank = i + 1,
                score = hit.score,
                origin = %hit.origin,
                source = %hit.metadata.label(),
                "Merged hit"
            );
        }

        Ok(RetrievalOutcome {
            question: question.to_string(),
            hits,
            vector_hits: vector_count,
            lexical_hits: lexical_count,
            elapsed_secs: start.elapsed().as_secs_f64(),
        })
    }

    /// Retrieve, then assemble the context and render the prompt.
    pub async fn prepare(&self, question: &str) -> AppResult<Prepared> {
        let retrieval = self.retrieve(question).await?;
        self.prepare_from(retrieval)
    }

    /// Assemble the context and render the prompt for a finished retrieval.
    ///
    /// Assembly is skipped when nothing was retrieved.
    pub fn prepare_from(&self, retrieval: RetrievalOutcome) -> AppResult<Prepared> {
        if retrieval.is_empty() {
            tracing::info!(question = %retrieval.question, "No results");
            return Ok(Prepared::NoResults(retrieval));
        }

        let min_score = self.relevance_threshold();
        let low_confidence = retrieval
            .best_score()
            .map_or(false, |best| best < min_score);
        if low_confidence {
            tracing::warn!(
                best_score = retrieval.best_score(),
                min_score,
                "Low confidence: no merged hit reaches the relevance threshold"
            );
        }

        let assembler = ContextAssembler::new(
            min_score,
            self.retrieval.context_char_budget,
            self.hybrid() && self.retrieval.label_origins,
        );
        let context = assembler.assemble(&retrieval.question, &retrieval.hits)?;

        let word_budget = self.hybrid().then(|| approx_words(self.generation.num_predict));
        let prompt = assembler.render(&context, &self.prompt, word_budget)?;

        Ok(Prepared::Ready(Box::new(GroundedRequest {
            retrieval,
            context,
            prompt,
            low_confidence,
        })))
    }

    /// Answer `question` with a single, non-streaming completion.
    pub async fn answer(&self, question: &str) -> AppResult<RagResponse> {
        match self.prepare(question).await? {
            Prepared::NoResults(retrieval) => Ok(RagResponse::no_results(retrieval)),
            Prepared::Ready(request) => self.generate(&request).await,
        }
    }

    /// Generate the answer for a prepared request in one completion.
    pub async fn generate(&self, request: &GroundedRequest) -> AppResult<RagResponse> {
        let llm = self.llm()?;
        let start = Instant::now();

        let response = llm.complete(&self.llm_request(request, false)).await?;

        Ok(RagResponse::answered(
            request,
            response.content,
            Some(response.usage),
            start.elapsed().as_secs_f64(),
        ))
    }

    /// Open a fragment stream for a prepared request.
    pub async fn stream(&self, request: &GroundedRequest) -> AppResult<LlmStream> {
        self.llm()?.stream(&self.llm_request(request, true)).await
    }

    /// Stream the answer for a prepared request, passing each fragment to
    /// `on_fragment` as it arrives.
    pub async fn generate_streaming<F>(
        &self,
        request: &GroundedRequest,
        mut on_fragment: F,
    ) -> AppResult<RagResponse>
    where
        F: FnMut(&str),
    {
        let start = Instant::now();
        let mut stream = self.stream(request).await?;

        let mut answer = String::new();
        let mut usage = None;
        while let Some(fragment) = stream.next().await {
            let fragment = fragment?;
            if !fragment.content.is_empty() {
                on_fragment(&fragment.content);
                answer.push_str(&fragment.content);
            }
            if fragment.usage.is_some() {
                usage = fragment.usage;
            }
            if fragment.done {
                break;
            }
        }

        Ok(RagResponse::answered(
            request,
            answer.trim(),
            usage,
            start.elapsed().as_secs_f64(),
        ))
    }

    /// Threshold for context filtering and the low-confidence flag.
    ///
    /// Fused RRF scores have no absolute meaning, so nothing is filtered
    /// under RRF.
    fn relevance_threshold(&self) -> f64 {
        match self.retrieval.merge_strategy {
            MergeStrategy::Raw => self.retrieval.min_score,
            MergeStrategy::Rrf { .. } => 0.0,
        }
    }

    fn hybrid(&self) -> bool {
        self.retrieval.lexical_enabled
    }

    fn llm(&self) -> AppResult<&Arc<dyn LlmClient>> {
        self.llm
            .as_ref()
            .ok_or_else(|| AppError::Config("No generation client configured".to_string()))
    }

    fn llm_request(&self, request: &GroundedRequest, streaming: bool) -> LlmRequest {
        let mut llm_request = LlmRequest::from_config(request.prompt.to_body(), &self.generation);
        llm_request.stream = streaming;
        llm_request
    }

    async fn vector_hits(&self, question: &str) -> Vec<Hit> {
        let Some(vector) = &self.vector else {
            return Vec::new();
        };

        match vector.query(question, self.retrieval.top_k).await {
            Ok(matches) => normalize_matches(matches),
            Err(e) => {
                tracing::warn!(service = vector.name(), error = %e, "Vector search failed, continuing without vector hits");
                Vec::new()
            }
        }
    }

    async fn lexical_hits(&self, question: &str) -> Vec<Hit> {
        if !self.retrieval.lexical_enabled {
            return Vec::new();
        }

        let store = Arc::clone(&self.store);
        let corpus = self.corpus.clone();
        let scorer = Bm25Scorer::new(self.retrieval.bm25);
        let top_k = self.retrieval.top_k;
        let question = question.to_string();

        let result = tokio::task::spawn_blocking(move || {
            lexical_search(&store, corpus.as_deref(), scorer, &question, top_k)
        })
        .await
        .map_err(|e| AppError::Knowledge(format!("Lexical search task failed: {}", e)))
        .and_then(|result| result);

        match result {
            Ok(hits) => hits,
            Err(e @ AppError::IndexCorrupt(_)) => {
                tracing::warn!(error = %e, "Lexical index is corrupt, continuing without lexical hits");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Lexical search failed, continuing without lexical hits");
                Vec::new()
            }
        }
    }
}

/// Score `question` against the published index, building it from the
/// corpus first when no snapshot exists.
fn lexical_search(
    store: &SnapshotStore,
    corpus: Option<&dyn CorpusSource>,
    scorer: Bm25Scorer,
    question: &str,
    top_k: usize,
) -> AppResult<Vec<Hit>> {
    let index = match store.lexical_index() {
        Ok(index) => index,
        Err(AppError::IndexUnavailable(reason)) => {
            let Some(corpus) = corpus else {
                return Err(AppError::IndexUnavailable(reason));
            };

            tracing::info!(corpus = %corpus.describe(), "No lexical index, building one");
            store.rebuild_if_unpublished(|| corpus.load())?
        }
        Err(e) => return Err(e),
    };

    Ok(scorer.search(question, &index, top_k))
}
