//! Pre-flight checks before expensive operations.
//!
//! Validates that required credentials are available before starting
//! operations that would otherwise fail midway.

use crate::error::{RagError, Result};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Ingestion embeds every chunk.
    Ingest,
    /// Search embeds the query.
    Search,
    /// Asking embeds the query and calls the LLM.
    Ask,
    /// The server does all of the above.
    Serve,
    /// Collection management only talks to the index.
    Collection,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation) -> Result<()> {
    match operation {
        Operation::Ingest | Operation::Search | Operation::Ask | Operation::Serve => {
            check_api_key(std::env::var("OPENAI_API_KEY").ok().as_deref())
        }
        Operation::Collection => Ok(()),
    }
}

fn check_api_key(key: Option<&str>) -> Result<()> {
    match key {
        Some(key) if !key.trim().is_empty() => Ok(()),
        Some(_) => Err(RagError::Config(
            "OPENAI_API_KEY is empty. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
        None => Err(RagError::Config(
            "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
    }
}
