//! Durable store of image records, extracted text, and per-chunk embeddings.
//!
//! The [`ImageStore`] trait abstracts over storage backends and carries the
//! two query capabilities search depends on: a cosine-similarity scan over
//! embeddings and a case-insensitive substring scan over OCR text and
//! descriptions.
//!
//! Filepath uniqueness is the dedup invariant of the whole system.
//! [`ImageStore::insert_image`] enforces it atomically and reports
//! [`StoreError::DuplicateFilepath`], so two concurrent ingestions of the
//! same new file cannot both insert even if both passed the pre-check.

mod redb_store;

pub use redb_store::RedbImageStore;

use crate::search::similarity::{cosine_similarity, validate_dimension};
use crate::search::types::{ImageId, ImageRecord, NewImage, OcrRecord, SimilarityHit};
use std::collections::BTreeMap;
use std::sync::RwLock;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The filepath is already ingested; carries the existing image's id
    #[error("Duplicate filepath: {filepath} (image {existing})")]
    DuplicateFilepath {
        /// The conflicting filepath
        filepath: String,
        /// The image that already owns it
        existing: ImageId,
    },

    /// Referenced record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Database error (redb transaction/table failure, poisoned lock)
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Embedding vector has the wrong dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected embedding dimension
        expected: usize,
        /// Actual embedding dimension received
        actual: usize,
    },
}

/// Persistent store for images, OCR results, and embeddings.
///
/// Implementations:
/// - [`RedbImageStore`] - redb B-tree database for production use
/// - [`InMemoryImageStore`] - HashMap-backed store for tests
#[async_trait::async_trait(?Send)]
pub trait ImageStore {
    // =========================================================================
    // Image Operations
    // =========================================================================

    /// Looks up an image id by its filepath (the dedup check).
    async fn find_image_by_filepath(&self, filepath: &str) -> Result<Option<ImageId>, StoreError>;

    /// Inserts a new image record and returns its assigned id.
    ///
    /// Enforces filepath uniqueness atomically; returns
    /// [`StoreError::DuplicateFilepath`] when the path is already ingested.
    async fn insert_image(&self, image: &NewImage) -> Result<ImageId, StoreError>;

    /// Retrieves an image record by id.
    async fn get_image(&self, id: ImageId) -> Result<Option<ImageRecord>, StoreError>;

    /// Overwrites an image's description and generating-model fields.
    async fn update_description(
        &self,
        id: ImageId,
        description: &str,
        model_name: &str,
    ) -> Result<(), StoreError>;

    // =========================================================================
    // OCR Operations
    // =========================================================================

    /// Stores the extracted text for an image (one row per image).
    async fn insert_ocr_result(
        &self,
        id: ImageId,
        text: &str,
        confidence: f32,
    ) -> Result<(), StoreError>;

    /// Retrieves the OCR row for an image.
    async fn get_ocr_result(&self, id: ImageId) -> Result<Option<OcrRecord>, StoreError>;

    // =========================================================================
    // Embedding Operations
    // =========================================================================

    /// Inserts or replaces the description embedding (reserved chunk index -1).
    async fn upsert_description_embedding(
        &self,
        id: ImageId,
        embedding: &[f32],
    ) -> Result<(), StoreError>;

    /// Inserts embedding rows keyed by `(image_id, chunk_index)`.
    ///
    /// Indices may have gaps (chunks whose embedding failed are omitted
    /// upstream).
    async fn insert_chunk_embeddings(
        &self,
        id: ImageId,
        embeddings: &[(i32, Vec<f32>)],
    ) -> Result<(), StoreError>;

    /// Retrieves one embedding row.
    async fn get_embedding(
        &self,
        id: ImageId,
        chunk_index: i32,
    ) -> Result<Option<Vec<f32>>, StoreError>;

    /// Returns the stored chunk indices for an image, ascending.
    async fn embedding_indices(&self, id: ImageId) -> Result<Vec<i32>, StoreError>;

    // =========================================================================
    // Query Operations
    // =========================================================================

    /// Returns up to `k` images by best cosine similarity against `query`,
    /// descending, keeping only images at or above `min_similarity`.
    async fn top_k_by_similarity(
        &self,
        query: &[f32],
        k: usize,
        min_similarity: f32,
    ) -> Result<Vec<SimilarityHit>, StoreError>;

    /// Returns up to `limit` image ids whose OCR text or description contains
    /// `pattern`, case-insensitively, in id order.
    async fn find_matching_text(
        &self,
        pattern: &str,
        limit: usize,
    ) -> Result<Vec<ImageId>, StoreError>;

    // =========================================================================
    // Stats
    // =========================================================================

    /// Number of image records.
    async fn image_count(&self) -> Result<usize, StoreError>;

    /// Number of OCR rows.
    async fn ocr_count(&self) -> Result<usize, StoreError>;

    /// Total number of embedding rows.
    async fn embedding_count(&self) -> Result<usize, StoreError>;
}

/// In-memory image store for tests.
///
/// Stores everything in BTreeMaps (deterministic iteration order) and
/// persists nothing.
pub struct InMemoryImageStore {
    images: RwLock<BTreeMap<u64, ImageRecord>>,
    filepaths: RwLock<BTreeMap<String, u64>>,
    ocr_results: RwLock<BTreeMap<u64, OcrRecord>>,
    embeddings: RwLock<BTreeMap<(u64, i32), Vec<f32>>>,
    embedding_dim: usize,
}

impl InMemoryImageStore {
    /// Creates an empty store expecting embeddings of the given dimension.
    pub fn new(embedding_dim: usize) -> Self {
        Self {
            images: RwLock::new(BTreeMap::new()),
            filepaths: RwLock::new(BTreeMap::new()),
            ocr_results: RwLock::new(BTreeMap::new()),
            embeddings: RwLock::new(BTreeMap::new()),
            embedding_dim,
        }
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::DatabaseError("lock poisoned".to_string())
}

#[async_trait::async_trait(?Send)]
impl ImageStore for InMemoryImageStore {
    async fn find_image_by_filepath(&self, filepath: &str) -> Result<Option<ImageId>, StoreError> {
        let filepaths = self.filepaths.read().map_err(poisoned)?;
        Ok(filepaths.get(filepath).map(|&id| ImageId::from_u64(id)))
    }

    async fn insert_image(&self, image: &NewImage) -> Result<ImageId, StoreError> {
        // The filepaths lock is held across check and insert, so concurrent
        // inserts of the same path serialize here.
        let mut filepaths = self.filepaths.write().map_err(poisoned)?;
        if let Some(&existing) = filepaths.get(&image.filepath) {
            return Err(StoreError::DuplicateFilepath {
                filepath: image.filepath.clone(),
                existing: ImageId::from_u64(existing),
            });
        }

        let mut images = self.images.write().map_err(poisoned)?;
        let next = images.keys().next_back().map_or(1, |&max| max + 1);
        let record = ImageRecord {
            id: ImageId::from_u64(next),
            filename: image.filename.clone(),
            filepath: image.filepath.clone(),
            timestamp: image.timestamp,
            ai_description: image.ai_description.clone(),
            model_name: image.model_name.clone(),
        };
        images.insert(next, record);
        filepaths.insert(image.filepath.clone(), next);
        Ok(ImageId::from_u64(next))
    }

    async fn get_image(&self, id: ImageId) -> Result<Option<ImageRecord>, StoreError> {
        let images = self.images.read().map_err(poisoned)?;
        Ok(images.get(&id.as_u64()).cloned())
    }

    async fn update_description(
        &self,
        id: ImageId,
        description: &str,
        model_name: &str,
    ) -> Result<(), StoreError> {
        let mut images = self.images.write().map_err(poisoned)?;
        let record = images
            .get_mut(&id.as_u64())
            .ok_or_else(|| StoreError::NotFound(format!("image {}", id)))?;
        record.ai_description = Some(description.to_string());
        record.model_name = Some(model_name.to_string());
        Ok(())
    }

    async fn insert_ocr_result(
        &self,
        id: ImageId,
        text: &str,
        confidence: f32,
    ) -> Result<(), StoreError> {
        let mut ocr = self.ocr_results.write().map_err(poisoned)?;
        ocr.insert(
            id.as_u64(),
            OcrRecord {
                image_id: id,
                text: text.to_string(),
                confidence,
            },
        );
        Ok(())
    }

    async fn get_ocr_result(&self, id: ImageId) -> Result<Option<OcrRecord>, StoreError> {
        let ocr = self.ocr_results.read().map_err(poisoned)?;
        Ok(ocr.get(&id.as_u64()).cloned())
    }

    async fn upsert_description_embedding(
        &self,
        id: ImageId,
        embedding: &[f32],
    ) -> Result<(), StoreError> {
        validate_dimension(self.embedding_dim, embedding.len())?;
        let mut embeddings = self.embeddings.write().map_err(poisoned)?;
        embeddings.insert(
            (id.as_u64(), crate::config::DESCRIPTION_CHUNK_INDEX),
            embedding.to_vec(),
        );
        Ok(())
    }

    async fn insert_chunk_embeddings(
        &self,
        id: ImageId,
        pairs: &[(i32, Vec<f32>)],
    ) -> Result<(), StoreError> {
        for (_, embedding) in pairs {
            validate_dimension(self.embedding_dim, embedding.len())?;
        }
        let mut embeddings = self.embeddings.write().map_err(poisoned)?;
        for (chunk_index, embedding) in pairs {
            embeddings.insert((id.as_u64(), *chunk_index), embedding.clone());
        }
        Ok(())
    }

    async fn get_embedding(
        &self,
        id: ImageId,
        chunk_index: i32,
    ) -> Result<Option<Vec<f32>>, StoreError> {
        let embeddings = self.embeddings.read().map_err(poisoned)?;
        Ok(embeddings.get(&(id.as_u64(), chunk_index)).cloned())
    }

    async fn embedding_indices(&self, id: ImageId) -> Result<Vec<i32>, StoreError> {
        let embeddings = self.embeddings.read().map_err(poisoned)?;
        let mut indices: Vec<i32> = embeddings
            .keys()
            .filter(|(image, _)| *image == id.as_u64())
            .map(|(_, index)| *index)
            .collect();
        indices.sort_unstable();
        Ok(indices)
    }

    async fn top_k_by_similarity(
        &self,
        query: &[f32],
        k: usize,
        min_similarity: f32,
    ) -> Result<Vec<SimilarityHit>, StoreError> {
        validate_dimension(self.embedding_dim, query.len())?;
        let embeddings = self.embeddings.read().map_err(poisoned)?;

        let mut best: BTreeMap<u64, f32> = BTreeMap::new();
        for ((image, _), embedding) in embeddings.iter() {
            let similarity = cosine_similarity(query, embedding);
            let entry = best.entry(*image).or_insert(f32::MIN);
            if similarity > *entry {
                *entry = similarity;
            }
        }

        Ok(rank_hits(best, k, min_similarity))
    }

    async fn find_matching_text(
        &self,
        pattern: &str,
        limit: usize,
    ) -> Result<Vec<ImageId>, StoreError> {
        let needle = pattern.to_lowercase();
        let images = self.images.read().map_err(poisoned)?;
        let ocr = self.ocr_results.read().map_err(poisoned)?;

        let mut matches = Vec::new();
        for (id, record) in images.iter() {
            if matches.len() >= limit {
                break;
            }
            let in_text = ocr
                .get(id)
                .is_some_and(|o| o.text.to_lowercase().contains(&needle));
            let in_description = record
                .ai_description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle));
            if in_text || in_description {
                matches.push(ImageId::from_u64(*id));
            }
        }
        Ok(matches)
    }

    async fn image_count(&self) -> Result<usize, StoreError> {
        Ok(self.images.read().map_err(poisoned)?.len())
    }

    async fn ocr_count(&self) -> Result<usize, StoreError> {
        Ok(self.ocr_results.read().map_err(poisoned)?.len())
    }

    async fn embedding_count(&self) -> Result<usize, StoreError> {
        Ok(self.embeddings.read().map_err(poisoned)?.len())
    }
}

/// Filters per-image best similarities by threshold and ranks them
/// descending, breaking ties by ascending image id for determinism.
pub(crate) fn rank_hits(
    best: BTreeMap<u64, f32>,
    k: usize,
    min_similarity: f32,
) -> Vec<SimilarityHit> {
    let mut hits: Vec<SimilarityHit> = best
        .into_iter()
        .filter(|(_, similarity)| *similarity >= min_similarity)
        .map(|(image, similarity)| SimilarityHit {
            image_id: ImageId::from_u64(image),
            similarity,
        })
        .collect();

    hits.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.image_id.cmp(&b.image_id))
    });
    hits.truncate(k);
    hits
}

// Blanket implementation for Arc<T>, so one store can back the ingestion
// pipeline and the search engine simultaneously.
#[async_trait::async_trait(?Send)]
impl<T: ImageStore> ImageStore for std::sync::Arc<T> {
    async fn find_image_by_filepath(&self, filepath: &str) -> Result<Option<ImageId>, StoreError> {
        (**self).find_image_by_filepath(filepath).await
    }

    async fn insert_image(&self, image: &NewImage) -> Result<ImageId, StoreError> {
        (**self).insert_image(image).await
    }

    async fn get_image(&self, id: ImageId) -> Result<Option<ImageRecord>, StoreError> {
        (**self).get_image(id).await
    }

    async fn update_description(
        &self,
        id: ImageId,
        description: &str,
        model_name: &str,
    ) -> Result<(), StoreError> {
        (**self).update_description(id, description, model_name).await
    }

    async fn insert_ocr_result(
        &self,
        id: ImageId,
        text: &str,
        confidence: f32,
    ) -> Result<(), StoreError> {
        (**self).insert_ocr_result(id, text, confidence).await
    }

    async fn get_ocr_result(&self, id: ImageId) -> Result<Option<OcrRecord>, StoreError> {
        (**self).get_ocr_result(id).await
    }

    async fn upsert_description_embedding(
        &self,
        id: ImageId,
        embedding: &[f32],
    ) -> Result<(), StoreError> {
        (**self).upsert_description_embedding(id, embedding).await
    }

    async fn insert_chunk_embeddings(
        &self,
        id: ImageId,
        embeddings: &[(i32, Vec<f32>)],
    ) -> Result<(), StoreError> {
        (**self).insert_chunk_embeddings(id, embeddings).await
    }

    async fn get_embedding(
        &self,
        id: ImageId,
        chunk_index: i32,
    ) -> Result<Option<Vec<f32>>, StoreError> {
        (**self).get_embedding(id, chunk_index).await
    }

    async fn embedding_indices(&self, id: ImageId) -> Result<Vec<i32>, StoreError> {
        (**self).embedding_indices(id).await
    }

    async fn top_k_by_similarity(
        &self,
        query: &[f32],
        k: usize,
        min_similarity: f32,
    ) -> Result<Vec<SimilarityHit>, StoreError> {
        (**self).top_k_by_similarity(query, k, min_similarity).await
    }

    async fn find_matching_text(
        &self,
        pattern: &str,
        limit: usize,
    ) -> Result<Vec<ImageId>, StoreError> {
        (**self).find_matching_text(pattern, limit).await
    }

    async fn image_count(&self) -> Result<usize, StoreError> {
        (**self).image_count().await
    }

    async fn ocr_count(&self) -> Result<usize, StoreError> {
        (**self).ocr_count().await
    }

    async fn embedding_count(&self) -> Result<usize, StoreError> {
        (**self).embedding_count().await
    }
}
