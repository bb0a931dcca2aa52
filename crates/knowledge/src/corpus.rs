//! Corpus sources for index builds.
//!
//! Chunking happens upstream; a corpus here is a set of ready chunks, each
//! a JSON line `{"id"?, "text", "metadata": {"source_file", "page_number"}}`.

use crate::types::Document;
use crate::vector::parse_metadata;
use citerag_core::{AppError, AppResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Something that can produce the full corpus snapshot.
pub trait CorpusSource: Send + Sync {
    /// Description for logging.
    fn describe(&self) -> String;

    /// Load every document.
    fn load(&self) -> AppResult<Vec<Document>>;
}

impl CorpusSource for Vec<Document> {
    fn describe(&self) -> String {
        format!("{} in-memory documents", self.len())
    }

    fn load(&self) -> AppResult<Vec<Document>> {
        Ok(self.clone())
    }
}

#[derive(Debug, Deserialize)]
struct ChunkRecord {
    #[serde(default)]
    id: Option<String>,
    text: String,
    metadata: serde_json::Value,
}

/// Chunks stored as JSON Lines, in one file or a directory tree of
/// `*.jsonl` files.
#[derive(Debug, Clone)]
pub struct JsonlCorpus {
    path: PathBuf,
}

impl JsonlCorpus {
    /// Create a corpus rooted at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Corpus location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn files(&self) -> AppResult<Vec<PathBuf>> {
        if self.path.is_file() {
            return Ok(vec![self.path.clone()]);
        }

        if !self.path.is_dir() {
            return Err(AppError::Knowledge(format!(
                "Corpus not found: {}",
                self.path.display()
            )));
        }

        let mut files: Vec<PathBuf> = WalkDir::new(&self.path)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| p.is_file() && p.extension().and_then(|s| s.to_str()) == Some("jsonl"))
            .collect();

        // Stable document order across platforms
        files.sort();
        Ok(files)
    }
}

impl CorpusSource for JsonlCorpus {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> AppResult<Vec<Document>> {
        let mut documents = Vec::new();

        for file in self.files()? {
            let contents = std::fs::read_to_string(&file)?;
            let before = documents.len();
            parse_jsonl(&file, &contents, &mut documents)?;

            tracing::debug!(
                file = %file.display(),
                documents = documents.len() - before,
                "Loaded corpus file"
            );
        }

        tracing::info!(
            corpus = %self.path.display(),
            documents = documents.len(),
            "Loaded corpus"
        );

        Ok(documents)
    }
}

fn parse_jsonl(file: &Path, contents: &str, documents: &mut Vec<Document>) -> AppResult<()> {
    for (line_no, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let at = || format!("{}:{}", file.display(), line_no + 1);

        let record: ChunkRecord = serde_json::from_str(line)
            .map_err(|e| AppError::Knowledge(format!("{}: invalid chunk record: {}", at(), e)))?;

        if record.text.trim().is_empty() {
            tracing::debug!(location = %at(), "Skipping chunk without text");
            continue;
        }

        let metadata = parse_metadata(&record.metadata)
            .map_err(|e| AppError::Knowledge(format!("{}: {}", at(), e)))?;

        let id = record
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        documents.push(Document {
            id,
            text: record.text,
            metadata,
        });
    }

    Ok(())
}
