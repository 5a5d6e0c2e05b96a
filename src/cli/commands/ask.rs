//! Ask command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::RagPipeline;
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(
    question: &str,
    top_k: Option<usize>,
    model: Option<String>,
    mut settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ask) {
        Output::error(&e.to_string());
        return Err(e.into());
    }

    if let Some(model) = model {
        settings.llm.model = model;
    }
    let top_k = top_k.unwrap_or(settings.search.top_k);
    let pipeline = RagPipeline::from_settings(settings)?;

    let spinner = Output::spinner("Searching transcripts...");
    let result = pipeline.query(question, top_k).await;
    spinner.finish_and_clear();

    match result {
        Ok(response) => {
            println!("\n{}\n", response.answer);

            if !response.hits.is_empty() {
                Output::header("Sources");
                for (i, hit) in response.hits.iter().enumerate() {
                    Output::hit(i + 1, hit);
                }
            }
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Retrieval failed: {}", e));
            Err(e.into())
        }
    }
}
