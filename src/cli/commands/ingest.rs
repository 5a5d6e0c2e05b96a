//! Ingest command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::RagError;
use crate::ingest::IngestOptions;
use crate::pipeline::RagPipeline;
use anyhow::Result;
use std::path::Path;

/// Run the ingest command.
pub async fn run_ingest(
    dir: &Path,
    tags: &[String],
    recreate: bool,
    dry_run: bool,
    workers: Option<usize>,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ingest) {
        Output::error(&e.to_string());
        return Err(e.into());
    }

    let mut options = IngestOptions::from(&settings.ingestion);
    options.dry_run = dry_run;
    if let Some(workers) = workers {
        options.workers = workers.max(1);
    }

    let pipeline = RagPipeline::from_settings(settings)?;

    if recreate && !dry_run {
        Output::warning(&format!("Recreating collection '{}'", pipeline.collection()));
        pipeline.recreate_collection().await?;
    }

    let spinner = Output::spinner(&format!("Ingesting transcripts from {}...", dir.display()));
    let result = pipeline.ingest_folder(dir, tags, &options).await;
    spinner.finish_and_clear();

    match result {
        Ok(stats) => {
            if dry_run {
                Output::success("Dry run complete, nothing was written");
            } else {
                Output::success(&format!(
                    "Ingested into '{}'",
                    pipeline.collection()
                ));
            }
            Output::ingest_stats(&stats, dry_run);
            Ok(())
        }
        Err(RagError::IngestInterrupted { stats, source }) => {
            Output::error(&format!("Ingestion interrupted: {}", source));
            Output::info("Points written before the failure are kept; re-running is safe.");
            Output::ingest_stats(&stats, dry_run);
            Err(anyhow::anyhow!("ingestion interrupted: {}", source))
        }
        Err(e) => {
            Output::error(&format!("Ingestion failed: {}", e));
            Err(e.into())
        }
    }
}
