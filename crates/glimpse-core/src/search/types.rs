//! Core record and result types shared by storage, ingestion, and search.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returns the current Unix timestamp (seconds since UNIX_EPOCH).
///
/// If the system clock is before UNIX_EPOCH (extremely unlikely), returns 0
/// instead of panicking.
pub fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Unique image identifier.
///
/// IDs are allocated by the store (monotonic per database), so records keep
/// their identity across process restarts.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ImageId(u64);

impl ImageId {
    /// Creates an ImageId from a raw u64 value.
    pub fn from_u64(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw u64 value of this ID.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ImageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stored image record.
///
/// Created once per distinct filepath; `ai_description` and `model_name` are
/// the only fields ever updated in place (by description regeneration).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Unique image identifier
    pub id: ImageId,
    /// Original file name
    pub filename: String,
    /// Absolute file path - the dedup key, unique across the corpus
    pub filepath: String,
    /// File modification time (Unix seconds), not ingestion time
    pub timestamp: u64,
    /// AI-generated description, if one was produced
    pub ai_description: Option<String>,
    /// Identifier of the model that produced the description
    pub model_name: Option<String>,
}

/// Fields for a not-yet-inserted image record.
#[derive(Debug, Clone)]
pub struct NewImage {
    /// Original file name
    pub filename: String,
    /// Absolute file path
    pub filepath: String,
    /// File modification time (Unix seconds)
    pub timestamp: u64,
    /// AI-generated description, if one was produced
    pub ai_description: Option<String>,
    /// Identifier of the model that produced the description
    pub model_name: Option<String>,
}

/// Extracted-text record; exactly one per image, immutable after ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrRecord {
    /// Owning image
    pub image_id: ImageId,
    /// Extracted text, or the no-text sentinel
    pub text: String,
    /// Extraction confidence in [0, 1]
    pub confidence: f32,
}

/// One image from a vector similarity query.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityHit {
    /// Matching image
    pub image_id: ImageId,
    /// Best cosine similarity across the image's embeddings, in [-1, 1]
    pub similarity: f32,
}

/// Which retrieval paths a search runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Vector similarity only
    Semantic,
    /// Substring matching only
    Keyword,
    /// Both paths, fused and deduplicated
    Hybrid,
}

/// Which path produced a search result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    /// Matched by vector similarity
    Semantic,
    /// Matched by substring
    Keyword,
}

impl ResultKind {
    /// Stable lowercase label for display and serialization.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultKind::Semantic => "semantic",
            ResultKind::Keyword => "keyword",
        }
    }
}

/// A ranked search result.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Matching image
    pub id: ImageId,
    /// Original file name
    pub filename: String,
    /// Absolute file path
    pub filepath: String,
    /// File modification time (Unix seconds)
    pub timestamp: u64,
    /// Extracted text (empty when the image has no OCR row)
    pub text: String,
    /// Extraction confidence in [0, 1]
    pub confidence: f32,
    /// Relevance score in [0, 1]: cosine similarity for semantic hits,
    /// fixed 1.0 for keyword hits
    pub score: f32,
    /// AI-generated description, if any
    pub description: Option<String>,
    /// Which path produced this result
    pub kind: ResultKind,
}

/// Error types for search operations.
#[derive(Debug, Clone, Error)]
pub enum SearchError {
    /// Storage backend error
    #[error("Storage error: {0}")]
    Storage(String),
    /// Query embedding failed
    #[error("Embedding error: {0}")]
    Embedding(String),
    /// Vector dimension mismatch (expected vs actual)
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected embedding dimension
        expected: usize,
        /// Actual embedding dimension received
        actual: usize,
    },
    /// Invalid search query
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

impl From<crate::storage::StoreError> for SearchError {
    fn from(e: crate::storage::StoreError) -> Self {
        SearchError::Storage(e.to_string())
    }
}
