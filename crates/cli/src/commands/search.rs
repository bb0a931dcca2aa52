//! Search command handler.
//!
//! Runs hybrid retrieval only and lists the merged matches.

use super::{build_pipeline, match_line, preview, print_json, retrieval_config};
use clap::Args;
use citerag_core::{config::AppConfig, AppResult};
use citerag_knowledge::NO_RESULTS_MESSAGE;

/// Characters of chunk text shown per match.
const PREVIEW_CHARS: usize = 300;

/// Retrieve matching passages without generating an answer
#[derive(Args, Debug)]
pub struct SearchCommand {
    /// The question to search for
    pub question: String,

    /// Number of hits to retrieve and keep
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing search command");
        tracing::debug!("Search options: {:?}", self);

        let retrieval = retrieval_config(config, self.top_k, None)?;
        let pipeline = build_pipeline(config, retrieval).await?;
        let outcome = pipeline.retrieve(&self.question).await?;

        if self.json {
            return print_json(&outcome);
        }

        if outcome.is_empty() {
            println!("{}", NO_RESULTS_MESSAGE);
            return Ok(());
        }

        for (i, hit) in outcome.hits.iter().enumerate() {
            println!("{}", match_line(i + 1, hit));
            println!("    {}", preview(&hit.text, PREVIEW_CHARS));
            println!();
        }
        println!(
            "{} matches ({} vector, {} lexical) in {:.2}s",
            outcome.hits.len(),
            outcome.vector_hits,
            outcome.lexical_hits,
            outcome.elapsed_secs
        );

        Ok(())
    }
}
