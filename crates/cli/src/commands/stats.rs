//! Stats command handler.
//!
//! Shows statistics of the published lexical index.

use super::print_json;
use clap::Args;
use citerag_core::{config::AppConfig, AppResult};
use citerag_knowledge::SnapshotStore;

/// Show index statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let store = SnapshotStore::new(config.index_path());
        let stats = store.stats()?;

        if self.json {
            return print_json(&stats);
        }

        println!("Index:      {}", stats.path.display());
        println!("Documents:  {}", stats.documents);
        println!("Vocabulary: {}", stats.vocabulary);
        println!("Avg length: {:.2} tokens", stats.avgdl);
        println!("Size:       {} bytes", stats.size_bytes);
        if let Some(modified) = stats.modified {
            println!("Modified:   {}", modified.format("%Y-%m-%d %H:%M:%S UTC"));
        }

        Ok(())
    }
}
