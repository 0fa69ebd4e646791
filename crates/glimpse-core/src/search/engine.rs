//! Search orchestration: semantic and keyword paths, fusion, ranking.

use super::types::{ImageId, ResultKind, SearchError, SearchMode, SearchResult};
use crate::config::MIN_SIMILARITY;
use crate::model::TextEmbedder;
use crate::storage::ImageStore;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};
use unicode_normalization::UnicodeNormalization;

/// Hybrid search engine.
///
/// Holds the store and the query embedder; constructed once at process start
/// and shared by reference. Queries are read-only and need no coordination
/// between concurrent callers.
pub struct SearchEngine<S: ImageStore> {
    store: S,
    embedder: Arc<dyn TextEmbedder>,
}

impl<S: ImageStore> SearchEngine<S> {
    /// Creates a search engine over the given store and query embedder.
    pub fn new(store: S, embedder: Arc<dyn TextEmbedder>) -> Self {
        Self { store, embedder }
    }

    /// Searches the corpus.
    ///
    /// Never fails: any backend error is logged and an empty result list
    /// returned. Results are ordered by descending score (semantic and hybrid
    /// modes deduplicate by image, keeping the higher-scored entry); keyword
    /// mode returns matches in their natural store order.
    pub async fn search(&self, query: &str, mode: SearchMode, limit: usize) -> Vec<SearchResult> {
        match self.try_search(query, mode, limit).await {
            Ok(results) => results,
            Err(e) => {
                error!("Search failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn try_search(
        &self,
        query: &str,
        mode: SearchMode,
        limit: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        // Canonical composition so diacritic-carrying scripts match the same
        // regardless of the input's encoding form.
        let query: String = query.nfc().collect();

        if query.trim().is_empty() {
            return Err(SearchError::InvalidQuery(
                "Query cannot be empty".to_string(),
            ));
        }
        if limit == 0 {
            return Err(SearchError::InvalidQuery(
                "Result limit must be greater than 0".to_string(),
            ));
        }

        let mut results: Vec<SearchResult> = Vec::new();

        if matches!(mode, SearchMode::Semantic | SearchMode::Hybrid) {
            match self.embedder.embed(&query).await {
                Ok(Some(embedding)) => {
                    let hits = self
                        .store
                        .top_k_by_similarity(&embedding, limit, MIN_SIMILARITY)
                        .await?;
                    debug!("Semantic path found {} images", hits.len());
                    for hit in hits {
                        let score = hit.similarity.clamp(0.0, 1.0);
                        if let Some(result) = self
                            .hydrate(hit.image_id, score, ResultKind::Semantic)
                            .await?
                        {
                            results.push(result);
                        }
                    }
                }
                Ok(None) => debug!("Query produced no embedding; semantic path skipped"),
                Err(e) => warn!("Query embedding failed: {} (semantic path skipped)", e),
            }
        }

        if matches!(mode, SearchMode::Keyword | SearchMode::Hybrid) {
            let ids = self.store.find_matching_text(&query, limit).await?;
            debug!("Keyword path found {} images", ids.len());
            for id in ids {
                if let Some(result) = self.hydrate(id, 1.0, ResultKind::Keyword).await? {
                    results.push(result);
                }
            }
        }

        // Keyword hits are not ranked against each other and keep their
        // natural order; the other modes dedup and rank by score.
        if mode != SearchMode::Keyword {
            results = fuse(results);
        }
        results.truncate(limit);
        Ok(results)
    }

    /// Builds a full result record from the image and OCR rows.
    ///
    /// Returns `Ok(None)` when the image row has vanished (stale hit), which
    /// is skipped rather than failing the whole query.
    async fn hydrate(
        &self,
        id: ImageId,
        score: f32,
        kind: ResultKind,
    ) -> Result<Option<SearchResult>, SearchError> {
        let image = match self.store.get_image(id).await? {
            Some(image) => image,
            None => {
                warn!("Image {} missing during hydration, skipping", id);
                return Ok(None);
            }
        };
        let ocr = self.store.get_ocr_result(id).await?;

        Ok(Some(SearchResult {
            id,
            filename: image.filename,
            filepath: image.filepath,
            timestamp: image.timestamp,
            text: ocr.as_ref().map(|o| o.text.clone()).unwrap_or_default(),
            confidence: ocr.map(|o| o.confidence).unwrap_or(0.0),
            score,
            description: image.ai_description,
            kind,
        }))
    }
}

/// Deduplicates by image id keeping the higher-scored entry, then sorts by
/// score descending with ascending id as tiebreak so repeated queries return
/// identical orderings.
fn fuse(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut best: HashMap<u64, SearchResult> = HashMap::new();
    for result in results {
        match best.get(&result.id.as_u64()) {
            Some(kept) if kept.score >= result.score => {}
            _ => {
                best.insert(result.id.as_u64(), result);
            }
        }
    }

    let mut fused: Vec<SearchResult> = best.into_values().collect();
    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    fused
}
