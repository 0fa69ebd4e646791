//! Search command implementation.

use crate::config;
use anyhow::Result;
use glimpse_core::search::{SearchEngine, SearchMode, SearchResult};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Performs a search against the on-disk corpus.
///
/// Opens the store, builds the query embedder from the environment, and runs
/// the requested mode. The engine itself never fails; backend problems
/// surface as an empty result list plus logged detail.
pub async fn execute_search(
    query: &str,
    mode: SearchMode,
    limit: usize,
    data_dir: Option<&PathBuf>,
) -> Result<Vec<SearchResult>> {
    let store = config::open_store(data_dir)?;
    let client = Arc::new(config::model_client());

    info!("Searching for: \"{}\" ({:?})", query, mode);
    let engine = SearchEngine::new(store, client);
    let results = engine.search(query, mode, limit).await;
    info!("Found {} result(s)", results.len());

    Ok(results)
}
