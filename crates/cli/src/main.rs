//! citerag CLI
//!
//! Main entry point for the citerag command-line tool: build the lexical
//! index, inspect it, and ask questions answered from the corpus with
//! inline citations.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, IndexCommand, SearchCommand, StatsCommand};
use citerag_core::{config::AppConfig, logging, AppError, AppResult};
use std::path::PathBuf;

/// citerag - grounded answers over a document corpus
#[derive(Parser, Debug)]
#[command(name = "citerag")]
#[command(about = "Hybrid BM25 + vector retrieval with cited, grounded answers", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "CITERAG_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "CITERAG_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the lexical index from the corpus
    Index(IndexCommand),

    /// Retrieve matching passages without generating an answer
    Search(SearchCommand),

    /// Answer a question from the corpus with citations
    Ask(AskCommand),

    /// Show index statistics
    Stats(StatsCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Defaults, config file, then environment
    let config = AppConfig::load(cli.workspace, cli.config)?;

    // Apply CLI overrides
    let config = config.with_overrides(cli.log_level, cli.verbose, cli.no_color);

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("citerag starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Index: {:?}", config.index_path());
    tracing::debug!("Model: {}", config.generation.model);

    config.ensure_state_dir()?;

    let command_name = match &cli.command {
        Commands::Index(_) => "index",
        Commands::Search(_) => "search",
        Commands::Ask(_) => "ask",
        Commands::Stats(_) => "stats",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    // Route to command handlers
    let result = match cli.command {
        Commands::Index(cmd) => cmd.execute(&config).await,
        Commands::Search(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Stats(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => {
            tracing::error!("Command failed: {}", e);
            if let Some(hint) = failure_hint(e) {
                eprintln!("{}", hint);
            }
        }
    }

    result
}

/// Next step to suggest when a command fails on the index lifecycle.
fn failure_hint(error: &AppError) -> Option<&'static str> {
    if !error.is_index_error() {
        return None;
    }

    Some(match error {
        AppError::EmptyCorpus => "The corpus has no documents; check paths.corpus_path.",
        AppError::IndexCorrupt(_) => "The lexical index is unreadable; rebuild it with `citerag index`.",
        _ => "No lexical index yet; build one with `citerag index`.",
    })
}
