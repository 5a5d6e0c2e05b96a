//! ragtube CLI entry point.

use anyhow::Result;
use clap::Parser;
use ragtube::cli::{commands, Cli, Commands};
use ragtube::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("ragtube={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let config_path = cli.config.as_ref().map(std::path::PathBuf::from);
    let mut settings = Settings::load_from(config_path.as_ref())?;
    if let Some(collection) = &cli.collection {
        settings.index.collection = collection.clone();
    }

    std::fs::create_dir_all(settings.data_dir())?;

    match &cli.command {
        Commands::Ingest {
            dir,
            tag,
            recreate,
            dry_run,
            workers,
        } => {
            commands::run_ingest(dir, tag, *recreate, *dry_run, *workers, settings).await?;
        }

        Commands::Search {
            query,
            limit,
            tag,
            min_importance,
            doc_id,
            json,
        } => {
            commands::run_search(query, *limit, tag, *min_importance, doc_id.clone(), *json, settings).await?;
        }

        Commands::Ask { question, top_k, model } => {
            commands::run_ask(question, *top_k, model.clone(), settings).await?;
        }

        Commands::Collection { action } => {
            commands::run_collection(action, settings).await?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host.clone(), *port, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, config_path.as_ref(), settings)?;
        }
    }

    Ok(())
}
