//! Local inference endpoint abstractions.
//!
//! The endpoint provides two capabilities: a vision chat call (image + prompt
//! in, streamed text out) and an embeddings call (text in, fixed-length
//! vector out). [`OllamaClient`] implements both; the traits exist so the
//! pipeline and search engine can be exercised without a live backend.

mod ollama;

pub use ollama::OllamaClient;

use crate::chunking::chunk_text;
use crate::error::ModelError;
use tracing::{debug, warn};

/// A generated image description together with the model that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Description {
    /// Natural-language summary of the image
    pub text: String,
    /// Identifier of the generating model
    pub model: String,
}

/// Trait for text embedding backends.
#[async_trait::async_trait(?Send)]
pub trait TextEmbedder: Send + Sync {
    /// Embeds text into a fixed-dimension vector.
    ///
    /// Returns `Ok(None)` for empty or whitespace-only input (nothing to
    /// embed) and `Err` when the backend fails. Callers treat both as "no
    /// embedding produced" but the distinction keeps failures observable.
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>, ModelError>;
}

/// Trait for vision-model description generation.
#[async_trait::async_trait(?Send)]
pub trait VisionDescriber: Send + Sync {
    /// Produces a natural-language summary of the image.
    async fn describe(&self, image_bytes: &[u8]) -> Result<Description, ModelError>;
}

/// Chunks text and embeds each chunk independently.
///
/// Returns `(chunk_index, vector)` pairs with indices starting at 0. Chunks
/// whose embedding fails are logged and omitted, so index gaps are possible
/// and consumers must tolerate them.
pub async fn chunk_embed(embedder: &dyn TextEmbedder, text: &str) -> Vec<(i32, Vec<f32>)> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let chunks = chunk_text(text);
    debug!("Text divided into {} chunks", chunks.len());

    let mut embeddings = Vec::with_capacity(chunks.len());
    for (index, chunk) in chunks.iter().enumerate() {
        match embedder.embed(chunk).await {
            Ok(Some(vector)) => embeddings.push((index as i32, vector)),
            Ok(None) => {}
            Err(e) => warn!("Embedding failed for chunk {}: {} (skipping)", index, e),
        }
    }
    embeddings
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Embedder that fails for chunks containing a marker string.
    struct FlakyEmbedder {
        poison: &'static str,
    }

    #[async_trait::async_trait(?Send)]
    impl TextEmbedder for FlakyEmbedder {
        async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>, ModelError> {
            if text.trim().is_empty() {
                return Ok(None);
            }
            if text.contains(self.poison) {
                return Err(ModelError::InvalidResponse("backend down".to_string()));
            }
            Ok(Some(vec![text.len() as f32, 1.0]))
        }
    }

    #[tokio::test]
    async fn test_chunk_embed_empty_text() {
        let embedder = FlakyEmbedder { poison: "!" };
        assert!(chunk_embed(&embedder, "").await.is_empty());
        assert!(chunk_embed(&embedder, "   \n ").await.is_empty());
    }

    #[tokio::test]
    async fn test_chunk_embed_short_text_single_index() {
        let embedder = FlakyEmbedder { poison: "!" };
        let result = chunk_embed(&embedder, "hello world").await;
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].0, 0);
    }

    #[tokio::test]
    async fn test_chunk_embed_skips_failed_chunks_leaving_gaps() {
        // Three windows; the middle one carries the poison marker. Stored
        // indices must contain 0 and 2 but not 1.
        let good = "a".repeat(900);
        let bad = format!("{}POISON{}", "b".repeat(450), "b".repeat(450));
        let tail = "c".repeat(900);
        let text = format!("{}\n\n{}\n\n{}", good, bad, tail);

        let embedder = FlakyEmbedder { poison: "POISON" };
        let result = chunk_embed(&embedder, &text).await;

        let indices: Vec<i32> = result.iter().map(|(i, _)| *i).collect();
        assert!(indices.contains(&0));
        assert!(!indices.contains(&1));
        assert!(indices.contains(&2));
    }

    #[tokio::test]
    async fn test_chunk_embed_indices_are_ordered() {
        let embedder = FlakyEmbedder { poison: "!" };
        let text = "word ".repeat(600);
        let result = chunk_embed(&embedder, &text).await;

        assert!(result.len() >= 2);
        for pair in result.windows(2) {
            assert!(pair[0].0 < pair[1].0);
        }
    }
}
