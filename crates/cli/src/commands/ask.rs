//! Ask command handler.
//!
//! Answers a question from the corpus: hybrid retrieval, grounded prompt,
//! then a streamed or single-shot completion.

use super::{build_pipeline, match_line, print_json, retrieval_config};
use clap::Args;
use citerag_core::{config::AppConfig, AppResult, MergeStrategy};
use citerag_knowledge::{Prepared, RagResponse, NO_RESULTS_MESSAGE};
use citerag_llm::create_client;
use std::io::Write;

/// Answer a question from the corpus with citations
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Number of hits to retrieve and keep
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Minimum score for a hit to enter the context
    #[arg(long)]
    pub min_score: Option<f64>,

    /// Disable streaming
    #[arg(long)]
    pub no_stream: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Fuse vector and lexical hits with reciprocal rank fusion
    #[arg(long)]
    pub rrf: bool,

    /// Skip lexical retrieval
    #[arg(long)]
    pub vector_only: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let mut retrieval = retrieval_config(config, self.top_k, self.min_score)?;
        if self.rrf {
            retrieval.merge_strategy = MergeStrategy::rrf();
        }
        if self.vector_only {
            retrieval.lexical_enabled = false;
        }

        let client = create_client(&config.generation)?;
        let pipeline = build_pipeline(config, retrieval).await?.with_llm(client);

        let request = match pipeline.prepare(&self.question).await? {
            Prepared::NoResults(outcome) => {
                if self.json {
                    return print_json(&RagResponse::no_results(outcome));
                }
                println!("{}", NO_RESULTS_MESSAGE);
                return Ok(());
            }
            Prepared::Ready(request) => request,
        };

        if request.low_confidence && !self.json {
            eprintln!("Warning: low confidence, no match reached the relevance threshold.");
        }

        let response = if self.is_streaming(config) {
            let mut stdout = std::io::stdout();
            let response = pipeline
                .generate_streaming(&request, |fragment| {
                    print!("{}", fragment);
                    stdout.flush().ok();
                })
                .await?;
            println!();
            response
        } else {
            let response = pipeline.generate(&request).await?;
            if !self.json {
                println!("{}", response.answer);
            }
            response
        };

        if self.json {
            return print_json(&response);
        }

        print_report(&response);
        Ok(())
    }

    /// Streaming is on unless disabled in configuration, by flag, or by
    /// JSON output.
    pub fn is_streaming(&self, config: &AppConfig) -> bool {
        config.generation.stream && !self.no_stream && !self.json
    }
}

/// Top matches and the timing summary.
fn print_report(response: &RagResponse) {
    println!();
    println!("Top matches:");
    for (i, hit) in response.matches.iter().enumerate() {
        println!("  {}", match_line(i + 1, hit));
    }
    if response.context_truncated {
        println!("  (context truncated to fit the character budget)");
    }

    println!();
    println!("{}", timing_summary(response));
}

fn timing_summary(response: &RagResponse) -> String {
    let mut summary = format!(
        "Retrieval: {:.2}s | Generation: {:.2}s",
        response.timing.retrieval_secs, response.timing.generation_secs
    );
    if let Some(usage) = &response.usage {
        summary.push_str(&format!(
            " | Tokens: {} prompt, {} completion",
            usage.prompt_tokens, usage.completion_tokens
        ));
        if let Some(eval_secs) = usage.eval_secs.filter(|secs| *secs > 0.0) {
            summary.push_str(&format!(
                " ({:.1} tok/s)",
                usage.completion_tokens as f64 / eval_secs
            ));
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use citerag_knowledge::{RetrievalOutcome, Timing};
    use citerag_llm::LlmUsage;

    fn command(no_stream: bool, json: bool) -> AskCommand {
        AskCommand {
            question: "q".to_string(),
            top_k: None,
            min_score: None,
            no_stream,
            json,
            rrf: false,
            vector_only: false,
        }
    }

    #[test]
    fn test_streaming_selection() {
        let config = AppConfig::default();
        assert!(command(false, false).is_streaming(&config));
        assert!(!command(true, false).is_streaming(&config));
        assert!(!command(false, true).is_streaming(&config));
    }

    #[test]
    fn test_timing_summary() {
        let mut response = RagResponse::no_results(RetrievalOutcome {
            question: "q".to_string(),
            hits: Vec::new(),
            vector_hits: 0,
            lexical_hits: 0,
            elapsed_secs: 0.25,
        });
        response.timing = Timing {
            retrieval_secs: 0.25,
            generation_secs: 2.0,
        };
        assert_eq!(timing_summary(&response), "Retrieval: 0.25s | Generation: 2.00s");

        response.usage = Some(LlmUsage {
            eval_secs: Some(2.0),
            ..LlmUsage::new(100, 40)
        });
        assert_eq!(
            timing_summary(&response),
            "Retrieval: 0.25s | Generation: 2.00s | Tokens: 100 prompt, 40 completion (20.0 tok/s)"
        );
    }
}
