//! Vector search boundary.
//!
//! The vector search service returns `(text, metadata, distance)` triples
//! with untyped metadata. They become canonical [`Hit`]s here, or are
//! dropped with a warning when they cannot.

use crate::embeddings::EmbeddingProvider;
use crate::types::{DocMetadata, Document, Hit, HitOrigin, VectorMatch};
use citerag_core::{AppError, AppResult};
use serde_json::Value;
use std::sync::Arc;

/// A vector similarity search service.
#[async_trait::async_trait]
pub trait VectorSearch: Send + Sync {
    /// Service name for logging.
    fn name(&self) -> &str;

    /// The `k` nearest chunks to `text`, nearest first.
    async fn query(&self, text: &str, k: usize) -> AppResult<Vec<VectorMatch>>;
}

/// Normalize one vector match into a hit with similarity `1 - distance`.
///
/// # Errors
/// `MalformedHit` when metadata lacks a usable `source_file` or
/// `page_number`, or when the distance is not finite.
pub fn normalize_match(m: VectorMatch) -> AppResult<Hit> {
    if !m.distance.is_finite() {
        return Err(AppError::MalformedHit(format!(
            "non-finite distance {}",
            m.distance
        )));
    }

    let metadata = parse_metadata(&m.metadata)?;
    Ok(Hit::new(m.text, metadata, 1.0 - m.distance, HitOrigin::Vector))
}

/// Normalize a batch, dropping and logging anything malformed.
pub fn normalize_matches(matches: Vec<VectorMatch>) -> Vec<Hit> {
    matches
        .into_iter()
        .filter_map(|m| match normalize_match(m) {
            Ok(hit) => Some(hit),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping vector hit");
                None
            }
        })
        .collect()
}

/// Read `{source_file, page_number}` out of untyped metadata.
///
/// `page_number` may arrive as an integer, an integral float or a numeric
/// string; those unambiguous forms are accepted.
pub fn parse_metadata(value: &Value) -> AppResult<DocMetadata> {
    let source_file = match value.get("source_file") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(other) => {
            return Err(AppError::MalformedHit(format!(
                "source_file is not a non-empty string: {}",
                other
            )))
        }
        None => return Err(AppError::MalformedHit("missing source_file".to_string())),
    };

    let page_number = match value.get("page_number") {
        Some(page) => parse_page(page).ok_or_else(|| {
            AppError::MalformedHit(format!("unusable page_number {} for {}", page, source_file))
        })?,
        None => {
            return Err(AppError::MalformedHit(format!(
                "missing page_number for {}",
                source_file
            )))
        }
    };

    Ok(DocMetadata {
        source_file,
        page_number,
    })
}

fn parse_page(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => {
            if let Some(page) = n.as_u64() {
                return u32::try_from(page).ok();
            }
            let page = n.as_f64()?;
            (page.fract() == 0.0 && page >= 0.0 && page <= u32::MAX as f64).then_some(page as u32)
        }
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// In-memory vector store over the corpus.
///
/// Stands in for an external vector database: documents are embedded once
/// at construction and queries are ranked by cosine distance.
#[derive(Debug)]
pub struct MemoryVectorStore {
    provider: Arc<dyn EmbeddingProvider>,
    entries: Vec<Entry>,
}

#[derive(Debug)]
struct Entry {
    text: String,
    metadata: Value,
    embedding: Vec<f32>,
}

impl MemoryVectorStore {
    /// Embed `documents` with `provider`.
    pub async fn from_documents(
        documents: &[Document],
        provider: Arc<dyn EmbeddingProvider>,
    ) -> AppResult<Self> {
        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let embeddings = provider.embed_batch(&texts).await?;

        if embeddings.len() != documents.len() {
            return Err(AppError::Knowledge(format!(
                "Embedding provider returned {} vectors for {} documents",
                embeddings.len(),
                documents.len()
            )));
        }

        let entries = documents
            .iter()
            .zip(embeddings)
            .map(|(doc, embedding)| {
                Ok(Entry {
                    text: doc.text.clone(),
                    metadata: serde_json::to_value(&doc.metadata)?,
                    embedding,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        tracing::info!(
            documents = entries.len(),
            provider = provider.provider_name(),
            "Built in-memory vector store"
        );

        Ok(Self { provider, entries })
    }

    /// Number of stored chunks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait::async_trait]
impl VectorSearch for MemoryVectorStore {
    fn name(&self) -> &str {
        self.provider.provider_name()
    }

    async fn query(&self, text: &str, k: usize) -> AppResult<Vec<VectorMatch>> {
        let query = self.provider.embed(text).await?;

        let mut ranked: Vec<(usize, f64)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, 1.0 - cosine_similarity(&query, &entry.embedding)))
            .collect();

        // Stable, so equal distances keep corpus order
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
        ranked.truncate(k);

        Ok(ranked
            .into_iter()
            .map(|(i, distance)| VectorMatch {
                text: self.entries[i].text.clone(),
                metadata: self.entries[i].metadata.clone(),
                distance,
            })
            .collect())
    }
}

/// Cosine similarity; zero when either vector has no magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a.sqrt() * norm_b.sqrt())
    }
}
