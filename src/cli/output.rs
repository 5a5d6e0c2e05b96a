//! CLI output formatting utilities.

use crate::ingest::IngestStats;
use crate::vector_index::RetrievedHit;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print one ranked search hit.
    pub fn hit(rank: usize, hit: &RetrievedHit) {
        let p = &hit.payload;
        println!(
            "\n{} {} {} [{}/{}] (score: {:.3}, importance: {:.1})",
            style(format!("{}.", rank)).green(),
            style(&p.title).bold(),
            style(&p.doc_id).dim(),
            p.chunk_index + 1,
            p.total_chunks,
            hit.score,
            p.importance
        );
        println!("   {}", content_preview(&p.text, 200));
        println!("   {}", style(&p.source_url).dim());
    }

    /// Print the summary of an ingestion run.
    pub fn ingest_stats(stats: &IngestStats, dry_run: bool) {
        Output::kv("Documents", &stats.documents.to_string());
        Output::kv("Chunks", &stats.chunks.to_string());
        if dry_run {
            Output::kv("Upserted", "0 (dry run)");
        } else {
            Output::kv("Upserted", &stats.upserted.to_string());
        }
        Output::kv("Skipped", &stats.skipped.to_string());
        Output::kv("Failed", &stats.failed.len().to_string());
        Output::kv("Elapsed", &format!("{:.1}s", stats.elapsed.as_secs_f64()));
        for failure in &stats.failed {
            Output::warning(&format!("{}: {}", failure.doc_id, failure.error));
        }
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Single-line preview of at most `max_chars` characters.
fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() <= max_chars {
        content
    } else {
        let cut: String = content.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
