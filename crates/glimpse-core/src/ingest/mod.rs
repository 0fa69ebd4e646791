//! Per-image ingestion: dedup check, extraction, description, embedding,
//! persistence.
//!
//! The pipeline is a linear state machine with early exits (see
//! [`IngestPipeline::process_image`]). Extraction and description failures
//! degrade to empty data; only their joint failure, or a persistence failure,
//! aborts the run. Every terminal state is a closed [`IngestOutcome`] variant
//! so callers can handle outcomes exhaustively.
//!
//! Ingestion is sequential per image but safe to invoke concurrently for
//! different images: the only shared mutable state is the store, and the
//! filepath uniqueness constraint in [`ImageStore::insert_image`] serializes
//! the one racy step.

use crate::config::{DESCRIPTION_CHUNK_INDEX, NO_TEXT_PLACEHOLDER};
use crate::error::RegenerateError;
use crate::extract::{join_lines, mean_confidence, TextExtractor};
use crate::model::{chunk_embed, TextEmbedder, VisionDescriber};
use crate::search::types::{current_timestamp, ImageId, NewImage};
use crate::storage::{ImageStore, StoreError};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Terminal state of one ingestion run.
///
/// `Duplicate` and `Success` are successes; the rest are failures that a
/// caller may retry by re-invoking [`IngestPipeline::process_image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The filepath is already ingested; nothing was done
    Duplicate,
    /// All derived artifacts were stored
    Success,
    /// Both extraction and description came back empty
    ExtractionFailed,
    /// A required persistence write failed
    DatabaseError,
    /// No embedding could be produced, so the image is invisible to
    /// semantic search; an image row exists but the run is reported failed
    NoEmbeddings,
}

impl IngestOutcome {
    /// Whether this outcome counts as a successful run.
    pub fn is_success(&self) -> bool {
        matches!(self, IngestOutcome::Duplicate | IngestOutcome::Success)
    }

    /// Stable snake_case label for logs and reports.
    pub fn label(&self) -> &'static str {
        match self {
            IngestOutcome::Duplicate => "duplicate",
            IngestOutcome::Success => "success",
            IngestOutcome::ExtractionFailed => "extraction_failed",
            IngestOutcome::DatabaseError => "database_error",
            IngestOutcome::NoEmbeddings => "no_embeddings",
        }
    }

    /// Human-readable reason for operator-facing reports.
    pub fn reason(&self) -> &'static str {
        match self {
            IngestOutcome::Duplicate => "already ingested",
            IngestOutcome::Success => "processed",
            IngestOutcome::ExtractionFailed => "no text or description could be produced",
            IngestOutcome::DatabaseError => "a database write failed",
            IngestOutcome::NoEmbeddings => "no embeddings could be produced",
        }
    }
}

impl std::fmt::Display for IngestOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Orchestrates ingestion of single images.
///
/// Constructed once at process start with its collaborators and shared by
/// reference; holds no per-image state.
pub struct IngestPipeline<S: ImageStore> {
    store: S,
    extractor: Arc<dyn TextExtractor>,
    describer: Arc<dyn VisionDescriber>,
    embedder: Arc<dyn TextEmbedder>,
}

impl<S: ImageStore> IngestPipeline<S> {
    /// Creates a pipeline over the given store and model services.
    pub fn new(
        store: S,
        extractor: Arc<dyn TextExtractor>,
        describer: Arc<dyn VisionDescriber>,
        embedder: Arc<dyn TextEmbedder>,
    ) -> Self {
        Self {
            store,
            extractor,
            describer,
            embedder,
        }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Ingests one image file.
    ///
    /// Steps: dedup check, text extraction, description generation, the
    /// both-empty gate, image row insert, OCR row insert, embedding, and
    /// embedding persistence. Re-invocation after any failure retries cleanly
    /// from the dedup check; re-invocation after success is a no-op
    /// (`Duplicate`).
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn process_image<P: AsRef<Path>>(&self, path: P) -> IngestOutcome {
        let path = path.as_ref();
        let filepath = path.to_string_lossy().into_owned();

        // 1. Dedup check. A read failure degrades to "not found": the
        // uniqueness constraint at step 5 still prevents a duplicate row.
        match self.store.find_image_by_filepath(&filepath).await {
            Ok(Some(existing)) => {
                info!("Skipping duplicate image: {} (image {})", filepath, existing);
                return IngestOutcome::Duplicate;
            }
            Ok(None) => {}
            Err(e) => warn!("Dedup check failed: {} (continuing)", e),
        }

        // Read the file once as raw bytes; extraction and description are
        // pure functions of these bytes.
        let image_bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to read {}: {}", filepath, e);
                Vec::new()
            }
        };

        // 2. Extract. Failure yields empty text and the run continues.
        let lines = match self.extractor.extract(&image_bytes).await {
            Ok(lines) => lines,
            Err(e) => {
                warn!("Text extraction failed: {} (continuing without text)", e);
                Vec::new()
            }
        };
        let text = join_lines(&lines);
        let confidence = mean_confidence(&lines);
        debug!("Extracted {} lines ({} chars)", lines.len(), text.len());

        // 3. Describe. Failure yields an empty description.
        let (description, model_name) = match self.describer.describe(&image_bytes).await {
            Ok(description) => (description.text.trim().to_string(), description.model),
            Err(e) => {
                warn!("Description generation failed: {} (continuing)", e);
                (String::new(), String::new())
            }
        };

        // 4. Gate: with neither text nor description there is nothing to
        // index and nothing worth persisting.
        if text.trim().is_empty() && description.is_empty() {
            warn!("Both extraction and description came back empty for {}", filepath);
            return IngestOutcome::ExtractionFailed;
        }

        let timestamp = file_mtime(path);
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| filepath.clone());

        // 5. Persist the image record.
        let new_image = NewImage {
            filename,
            filepath: filepath.clone(),
            timestamp,
            ai_description: (!description.is_empty()).then(|| description.clone()),
            model_name: (!model_name.is_empty()).then(|| model_name.clone()),
        };
        let image_id = match self.store.insert_image(&new_image).await {
            Ok(id) => id,
            Err(StoreError::DuplicateFilepath { existing, .. }) => {
                // A concurrent ingestion won the insert; treat like the
                // dedup check firing.
                info!("Skipping duplicate image: {} (image {})", filepath, existing);
                return IngestOutcome::Duplicate;
            }
            Err(e) => {
                warn!("Failed to store image record: {}", e);
                return IngestOutcome::DatabaseError;
            }
        };
        info!("Stored image record {}", image_id);

        // 6. Persist OCR. A write failure here is logged but does not abort:
        // the image row already exists and embeddings may still succeed.
        let ocr_write = if text.trim().is_empty() {
            self.store
                .insert_ocr_result(image_id, NO_TEXT_PLACEHOLDER, 0.0)
                .await
        } else {
            self.store
                .insert_ocr_result(image_id, &text, confidence)
                .await
        };
        if let Err(e) = ocr_write {
            warn!("Failed to store OCR result for {}: {} (continuing)", image_id, e);
        }

        // 7. Embed: the description as the reserved -1 chunk, then the OCR
        // text as chunks 0..N.
        let mut embeddings: Vec<(i32, Vec<f32>)> = Vec::new();
        if !description.is_empty() {
            match self.embedder.embed(&description).await {
                Ok(Some(vector)) => embeddings.push((DESCRIPTION_CHUNK_INDEX, vector)),
                Ok(None) => {}
                Err(e) => warn!("Description embedding failed: {} (skipping)", e),
            }
        }
        if !text.trim().is_empty() {
            embeddings.extend(chunk_embed(self.embedder.as_ref(), &text).await);
        }

        // 8. Persist embeddings.
        if embeddings.is_empty() {
            warn!("No embeddings generated for image {}", image_id);
            return IngestOutcome::NoEmbeddings;
        }
        match self
            .store
            .insert_chunk_embeddings(image_id, &embeddings)
            .await
        {
            Ok(()) => {
                info!("Stored {} embeddings for image {}", embeddings.len(), image_id);
                IngestOutcome::Success
            }
            Err(e) => {
                warn!("Failed to store embeddings for {}: {}", image_id, e);
                IngestOutcome::DatabaseError
            }
        }
    }

    /// Regenerates the description of an already-ingested image.
    ///
    /// Overwrites `ai_description`/`model_name` in place and upserts the
    /// reserved `-1` embedding row; OCR text and chunk embeddings are
    /// untouched.
    #[instrument(skip(self))]
    pub async fn regenerate_description(&self, id: ImageId) -> Result<(), RegenerateError> {
        let image = self
            .store
            .get_image(id)
            .await?
            .ok_or(RegenerateError::NotFound(id.as_u64()))?;

        let image_bytes = tokio::fs::read(&image.filepath).await?;
        let description = self.describer.describe(&image_bytes).await?;
        let text = description.text.trim().to_string();
        if text.is_empty() {
            return Err(RegenerateError::Describe(
                "model returned an empty description".to_string(),
            ));
        }

        self.store
            .update_description(id, &text, &description.model)
            .await?;

        match self.embedder.embed(&text).await {
            Ok(Some(vector)) => {
                self.store.upsert_description_embedding(id, &vector).await?;
            }
            Ok(None) => {}
            Err(e) => warn!(
                "Embedding regenerated description failed: {} (description updated anyway)",
                e
            ),
        }

        info!("Regenerated description for image {}", id);
        Ok(())
    }
}

/// File modification time as Unix seconds, falling back to the current time
/// when metadata is unavailable.
fn file_mtime(path: &Path) -> u64 {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or_else(current_timestamp)
}
