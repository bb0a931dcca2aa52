//! Configuration management for citerag.
//!
//! Configuration is merged from, in increasing precedence:
//! - built-in defaults
//! - the YAML config file (`.citerag/config.yaml` or an explicit path)
//! - environment variables
//! - command-line flags
//!
//! Only this module reads the process environment. The retrieval engine
//! receives the resulting [`RetrievalConfig`] as an explicit value.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Name of the per-workspace state directory.
pub const STATE_DIR: &str = ".citerag";

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .citerag/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Ranking, fusion and assembly parameters
    pub retrieval: RetrievalConfig,

    /// Generation service parameters
    pub generation: GenerationConfig,

    /// Index and corpus locations
    pub paths: PathsConfig,

    /// Local vector adapter parameters
    pub vector: VectorConfig,
}

/// BM25 hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bm25Params {
    /// Term frequency saturation
    pub k1: f64,

    /// Length normalization strength, in `[0, 1]`
    pub b: f64,

    /// Additive term applied to the frequency inside the normalized TF
    pub delta: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: 1.5,
            b: 0.75,
            delta: 1.0,
        }
    }
}

/// How vector and lexical hits are combined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Sort the deduplicated hits on their raw scores.
    ///
    /// Vector similarities and BM25 scores are not on a common scale; this is
    /// a known limitation kept for compatibility.
    #[default]
    Raw,

    /// Reciprocal rank fusion: each hit scores `1 / (k + rank)` per list.
    Rrf {
        #[serde(default = "default_rrf_k")]
        k: u32,
    },
}

fn default_rrf_k() -> u32 {
    60
}

impl MergeStrategy {
    /// RRF with the conventional smoothing constant.
    pub fn rrf() -> Self {
        Self::Rrf { k: default_rrf_k() }
    }
}

/// Retrieval parameters passed explicitly into the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of hits requested from each retriever and kept after merging
    pub top_k: usize,

    /// Minimum score for a hit to enter the prompt context
    pub min_score: f64,

    /// Maximum characters of assembled context
    pub context_char_budget: usize,

    /// BM25 hyperparameters
    pub bm25: Bm25Params,

    /// Fusion strategy for vector and lexical hits
    pub merge_strategy: MergeStrategy,

    /// Suffix citation labels with the hit origin (`[vector]` / `[bm25]`)
    pub label_origins: bool,

    /// Run the lexical retriever alongside vector search
    pub lexical_enabled: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            min_score: 0.25,
            context_char_budget: 8000,
            bm25: Bm25Params::default(),
            merge_strategy: MergeStrategy::Raw,
            label_origins: true,
            lexical_enabled: true,
        }
    }
}

impl RetrievalConfig {
    /// Reject parameter combinations the engine cannot score with.
    pub fn validate(&self) -> AppResult<()> {
        if self.top_k == 0 {
            return Err(AppError::Config("retrieval.top_k must be at least 1".to_string()));
        }

        if self.context_char_budget == 0 {
            return Err(AppError::Config(
                "retrieval.context_char_budget must be at least 1".to_string(),
            ));
        }

        if !self.min_score.is_finite() {
            return Err(AppError::Config(format!(
                "retrieval.min_score must be finite, got {}",
                self.min_score
            )));
        }

        let bm25 = &self.bm25;
        if !bm25.k1.is_finite() || bm25.k1 < 0.0 {
            return Err(AppError::Config(format!(
                "retrieval.bm25.k1 must be a non-negative number, got {}",
                bm25.k1
            )));
        }

        if !(0.0..=1.0).contains(&bm25.b) {
            return Err(AppError::Config(format!(
                "retrieval.bm25.b must be within [0, 1], got {}",
                bm25.b
            )));
        }

        if !bm25.delta.is_finite() || bm25.delta < 0.0 {
            return Err(AppError::Config(format!(
                "retrieval.bm25.delta must be a non-negative number, got {}",
                bm25.delta
            )));
        }

        if let MergeStrategy::Rrf { k: 0 } = self.merge_strategy {
            return Err(AppError::Config(
                "retrieval.merge_strategy.k must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Generation service parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Provider identifier ("ollama")
    pub provider: String,

    /// Provider base URL
    pub endpoint: String,

    /// Model identifier
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum tokens to generate
    pub num_predict: u32,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Stream fragments as they are generated
    pub stream: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            model: "gemma:2b".to_string(),
            temperature: 0.2,
            num_predict: 350,
            timeout_secs: 600,
            stream: true,
        }
    }
}

/// Index and corpus locations, relative paths resolved against the workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Persisted lexical index snapshot
    pub index_path: PathBuf,

    /// JSONL corpus file or directory of JSONL files
    pub corpus_path: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from("data/bm25_index.json"),
            corpus_path: PathBuf::from("data/corpus"),
        }
    }
}

/// Local vector adapter parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorConfig {
    /// Embedding provider ("trigram" or "ollama")
    pub provider: String,

    /// Embedding model for providers that take one
    pub model: String,

    /// Embedding dimensions
    pub dimensions: usize,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "nomic-embed-text".to_string(),
            dimensions: 384,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    retrieval: Option<RetrievalConfig>,
    generation: Option<GenerationConfig>,
    paths: Option<PathsConfig>,
    vector: Option<VectorConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            log_level: None,
            verbose: false,
            no_color: false,
            retrieval: RetrievalConfig::default(),
            generation: GenerationConfig::default(),
            paths: PathsConfig::default(),
            vector: VectorConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration for a workspace.
    ///
    /// `workspace` and `config_file` come from the command line (which also
    /// reads `CITERAG_WORKSPACE` / `CITERAG_CONFIG`). Other environment
    /// variables:
    /// - `CITERAG_TOP_K`: retrieval top-K
    /// - `CITERAG_MIN_SCORE`: relevance threshold
    /// - `CITERAG_MODEL`: generation model
    /// - `OLLAMA_URL`: generation endpoint
    /// - `RUST_LOG`: log level
    /// - `NO_COLOR`: disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use citerag_core::config::AppConfig;
    ///
    /// let config = AppConfig::load(None, None).expect("Failed to load config");
    /// println!("Index: {:?}", config.index_path());
    /// ```
    pub fn load(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace {
            config.workspace = workspace;
        }
        config.config_file = config_file;

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.state_dir().join("config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file does not exist: {:?}",
                config_path
            )));
        }

        config.apply_env(|key| std::env::var(key).ok())?;
        config.retrieval.validate()?;

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();
        result.merge_yaml_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        tracing::debug!("Merged config file {:?}", path);
        Ok(result)
    }

    fn merge_yaml_str(&mut self, contents: &str) -> AppResult<()> {
        let file: ConfigFile = serde_yaml::from_str(contents)?;

        if let Some(retrieval) = file.retrieval {
            self.retrieval = retrieval;
        }
        if let Some(generation) = file.generation {
            self.generation = generation;
        }
        if let Some(paths) = file.paths {
            self.paths = paths;
        }
        if let Some(vector) = file.vector {
            self.vector = vector;
        }
        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                self.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                self.no_color = !color;
            }
        }

        Ok(())
    }

    /// Apply environment overrides through `lookup`.
    fn apply_env<F>(&mut self, lookup: F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(top_k) = lookup("CITERAG_TOP_K") {
            self.retrieval.top_k = top_k.trim().parse().map_err(|_| {
                AppError::Config(format!("CITERAG_TOP_K is not a valid count: {}", top_k))
            })?;
        }

        if let Some(min_score) = lookup("CITERAG_MIN_SCORE") {
            self.retrieval.min_score = min_score.trim().parse().map_err(|_| {
                AppError::Config(format!("CITERAG_MIN_SCORE is not a number: {}", min_score))
            })?;
        }

        if let Some(model) = lookup("CITERAG_MODEL") {
            self.generation.model = model;
        }

        if let Some(endpoint) = lookup("OLLAMA_URL") {
            self.generation.endpoint = endpoint;
        }

        if let Some(level) = lookup("RUST_LOG") {
            self.log_level = Some(level);
        }

        if lookup("NO_COLOR").is_some() {
            self.no_color = true;
        }

        Ok(())
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment variables.
    pub fn with_overrides(mut self, log_level: Option<String>, verbose: bool, no_color: bool) -> Self {
        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .citerag directory.
    pub fn state_dir(&self) -> PathBuf {
        self.workspace.join(STATE_DIR)
    }

    /// Ensure the .citerag directory exists.
    pub fn ensure_state_dir(&self) -> AppResult<()> {
        let state_dir = self.state_dir();
        if !state_dir.exists() {
            std::fs::create_dir_all(&state_dir).map_err(|e| {
                AppError::Config(format!("Failed to create {} directory: {}", STATE_DIR, e))
            })?;
        }
        Ok(())
    }

    /// Absolute path of the index snapshot.
    pub fn index_path(&self) -> PathBuf {
        self.resolve(&self.paths.index_path)
    }

    /// Absolute path of the corpus file or directory.
    pub fn corpus_path(&self) -> PathBuf {
        self.resolve(&self.paths.corpus_path)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        }
    }
}
