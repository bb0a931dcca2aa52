//! Corpus statistics: build, persistence, validation and the in-memory
//! inverted index used for scoring.
//!
//! A snapshot is built once over a full corpus and never mutated. Rebuilds
//! produce a new snapshot that is written to a temporary file, renamed over
//! the old one, and then published by swapping an `Arc`, so a reader sees
//! either the old or the new snapshot in its entirety.

use crate::tokenizer::tokenize;
use crate::types::{DocMetadata, Document, Hit, HitOrigin};
use chrono::{DateTime, Utc};
use citerag_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

/// Persisted corpus statistics with passthrough lookup tables.
///
/// `ids`, `texts` and `metas` are parallel lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    /// Average document length in tokens
    pub avgdl: f64,

    /// Number of documents
    #[serde(rename = "N")]
    pub n: usize,

    /// Token count per document
    pub doc_len: BTreeMap<String, usize>,

    /// Per-document token counts
    pub tf: BTreeMap<String, BTreeMap<String, u32>>,

    /// Number of documents containing each token
    pub df: BTreeMap<String, u32>,

    /// Document identifiers
    pub ids: Vec<String>,

    /// Document texts
    pub texts: Vec<String>,

    /// Document metadata
    pub metas: Vec<DocMetadata>,
}

impl IndexSnapshot {
    /// Build statistics over the full corpus.
    ///
    /// Each document is tokenized once. A token counts toward `df` at most
    /// once per document however often it repeats.
    ///
    /// # Errors
    /// `EmptyCorpus` when there are no documents; `Knowledge` when two
    /// documents share an id.
    pub fn build(documents: &[Document]) -> AppResult<Self> {
        if documents.is_empty() {
            return Err(AppError::EmptyCorpus);
        }

        let n = documents.len();
        let mut doc_len = BTreeMap::new();
        let mut tf = BTreeMap::new();
        let mut df: BTreeMap<String, u32> = BTreeMap::new();
        let mut ids = Vec::with_capacity(n);
        let mut texts = Vec::with_capacity(n);
        let mut metas = Vec::with_capacity(n);
        let mut total_len = 0usize;

        for doc in documents {
            if doc_len.contains_key(&doc.id) {
                return Err(AppError::Knowledge(format!(
                    "Duplicate document id: {}",
                    doc.id
                )));
            }

            let tokens = tokenize(&doc.text);
            total_len += tokens.len();
            doc_len.insert(doc.id.clone(), tokens.len());

            let mut counts: BTreeMap<String, u32> = BTreeMap::new();
            let mut seen = HashSet::new();
            for token in tokens {
                if seen.insert(token.clone()) {
                    *df.entry(token.clone()).or_insert(0) += 1;
                }
                *counts.entry(token).or_insert(0) += 1;
            }
            tf.insert(doc.id.clone(), counts);

            ids.push(doc.id.clone());
            texts.push(doc.text.clone());
            metas.push(doc.metadata.clone());
        }

        let avgdl = total_len as f64 / n as f64;

        tracing::debug!(
            documents = n,
            vocabulary = df.len(),
            avgdl,
            "Built corpus statistics"
        );

        Ok(Self {
            avgdl,
            n,
            doc_len,
            tf,
            df,
            ids,
            texts,
            metas,
        })
    }

    /// Check the structural invariants of a loaded snapshot.
    ///
    /// # Errors
    /// `IndexCorrupt` describing the first violated invariant.
    pub fn validate(&self) -> AppResult<()> {
        let corrupt = |msg: String| Err(AppError::IndexCorrupt(msg));

        if self.n == 0 {
            return corrupt("snapshot holds no documents".to_string());
        }

        if self.ids.len() != self.n || self.texts.len() != self.n || self.metas.len() != self.n {
            return corrupt(format!(
                "N is {} but ids/texts/metas hold {}/{}/{}",
                self.n,
                self.ids.len(),
                self.texts.len(),
                self.metas.len()
            ));
        }

        let id_set: HashSet<&str> = self.ids.iter().map(String::as_str).collect();
        if id_set.len() != self.n {
            return corrupt("duplicate ids".to_string());
        }

        if self.doc_len.len() != self.n || !self.doc_len.keys().all(|id| id_set.contains(id.as_str())) {
            return corrupt("doc_len keys do not match ids".to_string());
        }

        let mut expected_df: HashMap<&str, u32> = HashMap::new();
        for (id, counts) in &self.tf {
            let Some(&len) = self.doc_len.get(id) else {
                return corrupt(format!("tf references unknown document {}", id));
            };

            let mut sum = 0usize;
            for (token, &count) in counts {
                if count == 0 {
                    return corrupt(format!("zero count for {:?} in {}", token, id));
                }
                sum += count as usize;
                *expected_df.entry(token.as_str()).or_insert(0) += 1;
            }

            if sum != len {
                return corrupt(format!(
                    "doc_len of {} is {} but its term counts sum to {}",
                    id, len, sum
                ));
            }
        }

        // Documents without tokens may be absent from tf
        if let Some((id, _)) = self
            .doc_len
            .iter()
            .find(|(id, len)| **len > 0 && !self.tf.contains_key(id.as_str()))
        {
            return corrupt(format!("tf is missing document {}", id));
        }

        if expected_df.len() != self.df.len()
            || self
                .df
                .iter()
                .any(|(token, &count)| expected_df.get(token.as_str()) != Some(&count))
        {
            return corrupt("df does not match per-document term counts".to_string());
        }

        let total: usize = self.doc_len.values().sum();
        let expected_avgdl = total as f64 / self.n as f64;
        if !self.avgdl.is_finite() || (self.avgdl - expected_avgdl).abs() > 1e-9 * expected_avgdl.max(1.0) {
            return corrupt(format!(
                "avgdl is {} but document lengths average {}",
                self.avgdl, expected_avgdl
            ));
        }

        Ok(())
    }
}

/// One entry of a token's posting list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    /// Position of the document in the snapshot's `ids`
    pub doc: usize,

    /// Occurrences of the token in that document
    pub tf: u32,
}

/// A validated snapshot with its inverted postings.
///
/// Postings are derived at load time so scoring only touches documents
/// that share a token with the query.
#[derive(Debug)]
pub struct LexicalIndex {
    snapshot: IndexSnapshot,
    postings: HashMap<String, Vec<Posting>>,
    doc_lens: Vec<usize>,
}

impl LexicalIndex {
    /// Validate a snapshot and invert its term counts.
    pub fn from_snapshot(snapshot: IndexSnapshot) -> AppResult<Self> {
        snapshot.validate()?;

        let mut postings: HashMap<String, Vec<Posting>> = HashMap::with_capacity(snapshot.df.len());
        let mut doc_lens = Vec::with_capacity(snapshot.n);

        for (doc, id) in snapshot.ids.iter().enumerate() {
            doc_lens.push(snapshot.doc_len.get(id).copied().unwrap_or(0));

            if let Some(counts) = snapshot.tf.get(id) {
                for (token, &tf) in counts {
                    postings
                        .entry(token.clone())
                        .or_default()
                        .push(Posting { doc, tf });
                }
            }
        }

        Ok(Self {
            snapshot,
            postings,
            doc_lens,
        })
    }

    /// Build directly from documents.
    pub fn build(documents: &[Document]) -> AppResult<Self> {
        Self::from_snapshot(IndexSnapshot::build(documents)?)
    }

    /// The underlying statistics.
    pub fn snapshot(&self) -> &IndexSnapshot {
        &self.snapshot
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.snapshot.n
    }

    /// Whether the index holds no documents. Never true for a validated index.
    pub fn is_empty(&self) -> bool {
        self.snapshot.n == 0
    }

    /// Average document length.
    pub fn avgdl(&self) -> f64 {
        self.snapshot.avgdl
    }

    /// Number of distinct tokens.
    pub fn vocabulary_size(&self) -> usize {
        self.snapshot.df.len()
    }

    /// Document frequency of a token.
    pub fn df(&self, token: &str) -> u32 {
        self.snapshot.df.get(token).copied().unwrap_or(0)
    }

    /// Postings of a token, in document order.
    pub fn postings(&self, token: &str) -> &[Posting] {
        self.postings.get(token).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Length in tokens of the document at `doc`.
    pub fn doc_len(&self, doc: usize) -> usize {
        self.doc_lens.get(doc).copied().unwrap_or(0)
    }

    /// Identifier of the document at `doc`.
    pub fn id(&self, doc: usize) -> &str {
        &self.snapshot.ids[doc]
    }

    /// A lexical hit for the document at `doc`.
    pub fn hit(&self, doc: usize, score: f64) -> Hit {
        Hit::new(
            self.snapshot.texts[doc].clone(),
            self.snapshot.metas[doc].clone(),
            score,
            HitOrigin::Lexical,
        )
    }
}

/// Summary of the published index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    /// Snapshot file
    pub path: PathBuf,

    /// Number of documents
    pub documents: usize,

    /// Number of distinct tokens
    pub vocabulary: usize,

    /// Average document length in tokens
    pub avgdl: f64,

    /// Snapshot file size
    pub size_bytes: u64,

    /// Last time the snapshot file was written
    pub modified: Option<DateTime<Utc>>,
}

/// Owner of the published lexical index.
///
/// Readers take an `Arc` to the current index and keep using it even if a
/// rebuild publishes a new one meanwhile.
pub struct SnapshotStore {
    path: PathBuf,
    current: RwLock<Option<Arc<LexicalIndex>>>,
    rebuild_lock: Mutex<()>,
}

impl SnapshotStore {
    /// Create a store backed by the snapshot file at `path`. Nothing is read yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            current: RwLock::new(None),
            rebuild_lock: Mutex::new(()),
        }
    }

    /// Snapshot file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The published index, if any has been loaded or built.
    pub fn current(&self) -> Option<Arc<LexicalIndex>> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// The published index, loading it from disk on first use.
    ///
    /// # Errors
    /// `IndexUnavailable` when there is no snapshot file; `IndexCorrupt`
    /// when it fails to parse or validate.
    pub fn lexical_index(&self) -> AppResult<Arc<LexicalIndex>> {
        match self.current() {
            Some(index) => Ok(index),
            None => self.load(),
        }
    }

    /// Read the snapshot file and publish it, unless an index was published
    /// meanwhile, in which case that one is returned.
    pub fn load(&self) -> AppResult<Arc<LexicalIndex>> {
        let _guard = self.lock_rebuilds();
        if let Some(index) = self.current() {
            return Ok(index);
        }

        let snapshot = read_snapshot(&self.path)?;
        let index = Arc::new(LexicalIndex::from_snapshot(snapshot)?);

        tracing::info!(
            path = %self.path.display(),
            documents = index.len(),
            "Loaded lexical index"
        );

        self.publish(Arc::clone(&index));
        Ok(index)
    }

    /// Build a new snapshot over `documents`, persist it atomically and
    /// publish it.
    ///
    /// On failure the previously published index stays in place.
    pub fn rebuild(&self, documents: &[Document]) -> AppResult<Arc<LexicalIndex>> {
        let _guard = self.lock_rebuilds();
        self.build_and_publish(documents)
    }

    /// Build the index from `load_documents` only if none is published yet.
    ///
    /// Concurrent callers wait for the first build and share its result, so
    /// the corpus is loaded and indexed once.
    pub fn rebuild_if_unpublished<F>(&self, load_documents: F) -> AppResult<Arc<LexicalIndex>>
    where
        F: FnOnce() -> AppResult<Vec<Document>>,
    {
        let _guard = self.lock_rebuilds();
        if let Some(index) = self.current() {
            return Ok(index);
        }

        let documents = load_documents()?;
        self.build_and_publish(&documents)
    }

    fn build_and_publish(&self, documents: &[Document]) -> AppResult<Arc<LexicalIndex>> {
        let snapshot = IndexSnapshot::build(documents)?;
        write_snapshot(&self.path, &snapshot)?;
        let index = Arc::new(LexicalIndex::from_snapshot(snapshot)?);

        tracing::info!(
            path = %self.path.display(),
            documents = index.len(),
            vocabulary = index.vocabulary_size(),
            "Published lexical index"
        );

        self.publish(Arc::clone(&index));
        Ok(index)
    }

    fn lock_rebuilds(&self) -> MutexGuard<'_, ()> {
        self.rebuild_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Statistics of the published index and its file.
    pub fn stats(&self) -> AppResult<IndexStats> {
        let index = self.lexical_index()?;
        let metadata = fs::metadata(&self.path)?;
        let modified = metadata.modified().ok().map(DateTime::<Utc>::from);

        Ok(IndexStats {
            path: self.path.clone(),
            documents: index.len(),
            vocabulary: index.vocabulary_size(),
            avgdl: index.avgdl(),
            size_bytes: metadata.len(),
            modified,
        })
    }

    fn publish(&self, index: Arc<LexicalIndex>) {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = Some(index);
    }
}

/// Read and parse a snapshot file. Validation happens in
/// [`LexicalIndex::from_snapshot`].
pub fn read_snapshot(path: &Path) -> AppResult<IndexSnapshot> {
    if !path.exists() {
        return Err(AppError::IndexUnavailable(format!(
            "no snapshot at {}",
            path.display()
        )));
    }

    let contents = fs::read(path)?;
    serde_json::from_slice(&contents).map_err(|e| {
        AppError::IndexCorrupt(format!("failed to parse {}: {}", path.display(), e))
    })
}

/// Write a snapshot to a temporary file and rename it over `path`.
pub fn write_snapshot(path: &Path, snapshot: &IndexSnapshot) -> AppResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let content = serde_json::to_vec(snapshot)?;

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(&content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| AppError::Io(e.error))?;

    Ok(())
}
