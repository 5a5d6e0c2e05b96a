//! Collection command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::{CollectionAction, Output};
use crate::config::Settings;
use crate::pipeline::RagPipeline;
use crate::vector_index::CollectionStatus;
use anyhow::Result;

/// Run the collection command.
pub async fn run_collection(action: &CollectionAction, settings: Settings) -> Result<()> {
    preflight::check(Operation::Collection)?;
    let pipeline = RagPipeline::from_settings(settings)?;
    let name = pipeline.collection().to_string();

    match action {
        CollectionAction::Create => match pipeline.ensure_collection().await? {
            CollectionStatus::Created => Output::success(&format!("Created collection '{}'", name)),
            CollectionStatus::Existing => Output::info(&format!("Collection '{}' already exists", name)),
        },

        CollectionAction::Recreate { yes } => {
            if !yes {
                Output::warning(&format!(
                    "This deletes every point in '{}'. Re-run with --yes to confirm.",
                    name
                ));
                return Ok(());
            }
            pipeline.recreate_collection().await?;
            Output::success(&format!("Recreated collection '{}'", name));
        }

        CollectionAction::Drop { yes } => {
            if !yes {
                Output::warning(&format!(
                    "This deletes collection '{}'. Re-run with --yes to confirm.",
                    name
                ));
                return Ok(());
            }
            if let Err(e) = pipeline.manager().drop(&name).await {
                Output::error(&format!("Failed to drop '{}': {}", name, e));
                return Err(e.into());
            }
            Output::success(&format!("Dropped collection '{}'", name));
        }

        CollectionAction::Info => {
            let info = pipeline.collection_info().await?;
            Output::header(&format!("Collection '{}'", info.name));
            Output::kv("Dimension", &info.dimension.to_string());
            Output::kv("Distance", &info.distance.to_string());
            Output::kv("Points", &info.points.to_string());
            Output::kv("Provider", &pipeline.settings().index.provider);
        }
    }

    Ok(())
}
