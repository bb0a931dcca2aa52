//! Core types for the retrieval engine.

use serde::{Deserialize, Serialize};

/// Citation target of a document: the file and page it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocMetadata {
    /// Source file name (e.g., "handbook.pdf")
    pub source_file: String,

    /// 1-based page number within the source file
    pub page_number: u32,
}

impl DocMetadata {
    /// Create metadata for a page of a source file.
    pub fn new(source_file: impl Into<String>, page_number: u32) -> Self {
        Self {
            source_file: source_file.into(),
            page_number,
        }
    }

    /// The `(source_file, page_number)` locator used for deduplication.
    ///
    /// Overlapping chunks of one page share a locator.
    pub fn locator(&self) -> (&str, u32) {
        (&self.source_file, self.page_number)
    }

    /// Citation label: `"<source_file> p.<page_number>"`.
    pub fn label(&self) -> String {
        format!("{} p.{}", self.source_file, self.page_number)
    }
}

/// A chunk of the corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique document identifier
    pub id: String,

    /// Chunk text
    pub text: String,

    /// Citation target
    pub metadata: DocMetadata,
}

impl Document {
    /// Create a new document.
    pub fn new(id: impl Into<String>, text: impl Into<String>, metadata: DocMetadata) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata,
        }
    }
}

/// Which retriever produced a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HitOrigin {
    /// Vector similarity search
    Vector,

    /// BM25 lexical scoring
    Lexical,
}

impl HitOrigin {
    /// Short tag used in citation labels.
    pub fn tag(&self) -> &'static str {
        match self {
            HitOrigin::Vector => "vector",
            HitOrigin::Lexical => "bm25",
        }
    }

    /// Tie-break rank on equal scores; lower wins.
    pub fn priority(&self) -> u8 {
        match self {
            HitOrigin::Vector => 0,
            HitOrigin::Lexical => 1,
        }
    }
}

impl std::fmt::Display for HitOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// A retrieval result in canonical shape, whichever retriever produced it.
///
/// Scores are only comparable within one origin: vector hits carry a
/// similarity near `[0, 1]`, lexical hits an unbounded BM25 score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    /// Chunk text
    pub text: String,

    /// Citation target
    pub metadata: DocMetadata,

    /// Relevance score
    pub score: f64,

    /// Producing retriever
    pub origin: HitOrigin,
}

impl Hit {
    /// Create a new hit.
    pub fn new(text: impl Into<String>, metadata: DocMetadata, score: f64, origin: HitOrigin) -> Self {
        Self {
            text: text.into(),
            metadata,
            score,
            origin,
        }
    }

    /// Citation label, with `" [vector]"` / `" [bm25]"` appended when
    /// `with_origin` is set.
    pub fn label(&self, with_origin: bool) -> String {
        if with_origin {
            format!("{} [{}]", self.metadata.label(), self.origin.tag())
        } else {
            self.metadata.label()
        }
    }
}

/// A raw result from the vector search service.
///
/// Metadata arrives untyped and is only trusted after normalization into a
/// [`Hit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMatch {
    /// Chunk text
    pub text: String,

    /// Metadata as stored alongside the embedding
    pub metadata: serde_json::Value,

    /// Distance to the query; similarity is `1 - distance`
    pub distance: f64,
}
