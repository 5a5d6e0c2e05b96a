//! CLI command implementations.

mod ask;
mod collection;
mod config;
mod ingest;
mod search;
mod serve;

pub use ask::run_ask;
pub use collection::run_collection;
pub use config::run_config;
pub use ingest::run_ingest;
pub use search::run_search;
pub use serve::{router, run_serve};
