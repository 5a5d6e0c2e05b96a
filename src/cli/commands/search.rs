//! Search command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::RagPipeline;
use crate::vector_index::SearchFilter;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(
    query: &str,
    limit: Option<usize>,
    tags: &[String],
    min_importance: Option<f32>,
    doc_id: Option<String>,
    json: bool,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Search) {
        Output::error(&e.to_string());
        return Err(e.into());
    }

    let limit = limit.unwrap_or(settings.search.top_k);
    let filter = SearchFilter {
        tags: tags.to_vec(),
        min_importance,
        doc_id,
    };

    let pipeline = RagPipeline::from_settings(settings)?;

    let spinner = Output::spinner("Searching...");
    let results = pipeline.retrieve(query, limit, &filter).await;
    spinner.finish_and_clear();

    let hits = match results {
        Ok(hits) => hits,
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
    } else if hits.is_empty() {
        Output::warning("No results found matching your query.");
    } else {
        Output::success(&format!("Found {} results", hits.len()));
        for (i, hit) in hits.iter().enumerate() {
            Output::hit(i + 1, hit);
        }
    }

    Ok(())
}
