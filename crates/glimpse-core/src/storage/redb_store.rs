//! Redb-backed image store.
//!
//! Uses [redb](https://github.com/cberner/redb) - a pure Rust, ACID-compliant,
//! embedded B-tree database.
//!
//! # Tables
//!
//! - `images`: image id (u64) -> ImageRecord (JSON)
//! - `filepaths`: filepath (string) -> image id - the uniqueness index
//! - `ocr_results`: image id (u64) -> OcrRecord (JSON)
//! - `text_embedding`: (image id, chunk index) -> `Vec<f32>` (raw bytes,
//!   little-endian)
//!
//! `insert_image` checks and updates the `filepaths` index inside one write
//! transaction; redb serializes writers, so the check-then-insert race on a
//! filepath cannot produce two rows.

use super::{rank_hits, ImageStore, StoreError};
use crate::search::similarity::{cosine_similarity, validate_dimension};
use crate::search::types::{ImageId, ImageRecord, NewImage, OcrRecord, SimilarityHit};
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

const IMAGES_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("images");
const FILEPATHS_TABLE: TableDefinition<&str, u64> = TableDefinition::new("filepaths");
const OCR_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("ocr_results");
const EMBEDDINGS_TABLE: TableDefinition<(u64, i32), &[u8]> =
    TableDefinition::new("text_embedding");

/// Redb-backed image store.
pub struct RedbImageStore {
    db: Arc<Database>,
    embedding_dim: usize,
}

impl RedbImageStore {
    /// Opens or creates a redb database at the given path.
    ///
    /// Creates all required tables if they don't exist. `embedding_dim` is
    /// the fixed vector dimension enforced on every write and query.
    pub fn open<P: AsRef<Path>>(path: P, embedding_dim: usize) -> Result<Self, StoreError> {
        let db = Database::create(path.as_ref())
            .map_err(|e| StoreError::DatabaseError(format!("Failed to open database: {}", e)))?;

        {
            let write_txn = db.begin_write().map_err(|e| {
                StoreError::DatabaseError(format!("Failed to begin write transaction: {}", e))
            })?;

            write_txn.open_table(IMAGES_TABLE).map_err(|e| {
                StoreError::DatabaseError(format!("Failed to create images table: {}", e))
            })?;
            write_txn.open_table(FILEPATHS_TABLE).map_err(|e| {
                StoreError::DatabaseError(format!("Failed to create filepaths table: {}", e))
            })?;
            write_txn.open_table(OCR_TABLE).map_err(|e| {
                StoreError::DatabaseError(format!("Failed to create ocr_results table: {}", e))
            })?;
            write_txn.open_table(EMBEDDINGS_TABLE).map_err(|e| {
                StoreError::DatabaseError(format!("Failed to create text_embedding table: {}", e))
            })?;

            write_txn.commit().map_err(|e| {
                StoreError::DatabaseError(format!("Failed to commit table creation: {}", e))
            })?;
        }

        Ok(Self {
            db: Arc::new(db),
            embedding_dim,
        })
    }

    fn serialize_image(record: &ImageRecord) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(record).map_err(|e| {
            StoreError::SerializationError(format!("Failed to serialize image: {}", e))
        })
    }

    fn deserialize_image(bytes: &[u8]) -> Result<ImageRecord, StoreError> {
        serde_json::from_slice(bytes).map_err(|e| {
            StoreError::SerializationError(format!("Failed to deserialize image: {}", e))
        })
    }

    fn serialize_ocr(record: &OcrRecord) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(record)
            .map_err(|e| StoreError::SerializationError(format!("Failed to serialize OCR: {}", e)))
    }

    fn deserialize_ocr(bytes: &[u8]) -> Result<OcrRecord, StoreError> {
        serde_json::from_slice(bytes).map_err(|e| {
            StoreError::SerializationError(format!("Failed to deserialize OCR: {}", e))
        })
    }

    /// Serializes an embedding to raw bytes.
    ///
    /// Format: little-endian f32 values packed sequentially (4 bytes per
    /// value) - embeddings are large (1024 dims = 4KB) and JSON would bloat
    /// them severalfold.
    ///
    /// NOTE: endianness MUST match `deserialize_embedding()`.
    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(embedding.len() * 4);
        for &val in embedding {
            bytes.extend_from_slice(&val.to_le_bytes());
        }
        bytes
    }

    /// Deserializes an embedding from raw little-endian f32 bytes.
    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn begin_read(&self) -> Result<redb::ReadTransaction, StoreError> {
        self.db.begin_read().map_err(|e| {
            StoreError::DatabaseError(format!("Failed to begin read transaction: {}", e))
        })
    }

    fn begin_write(&self) -> Result<redb::WriteTransaction, StoreError> {
        self.db.begin_write().map_err(|e| {
            StoreError::DatabaseError(format!("Failed to begin write transaction: {}", e))
        })
    }
}

fn table_err(name: &str, e: impl std::fmt::Display) -> StoreError {
    StoreError::DatabaseError(format!("Failed to open {} table: {}", name, e))
}

fn commit_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::DatabaseError(format!("Failed to commit: {}", e))
}

#[async_trait::async_trait(?Send)]
impl ImageStore for RedbImageStore {
    async fn find_image_by_filepath(&self, filepath: &str) -> Result<Option<ImageId>, StoreError> {
        let read_txn = self.begin_read()?;
        let table = read_txn
            .open_table(FILEPATHS_TABLE)
            .map_err(|e| table_err("filepaths", e))?;

        match table.get(filepath) {
            Ok(Some(guard)) => Ok(Some(ImageId::from_u64(guard.value()))),
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::DatabaseError(format!(
                "Failed to look up filepath: {}",
                e
            ))),
        }
    }

    async fn insert_image(&self, image: &NewImage) -> Result<ImageId, StoreError> {
        let write_txn = self.begin_write()?;
        let image_id;
        {
            let mut filepaths = write_txn
                .open_table(FILEPATHS_TABLE)
                .map_err(|e| table_err("filepaths", e))?;

            // Uniqueness check and insert happen inside this transaction;
            // dropping the transaction without commit aborts on conflict.
            let existing = filepaths
                .get(image.filepath.as_str())
                .map_err(|e| {
                    StoreError::DatabaseError(format!("Failed to look up filepath: {}", e))
                })?
                .map(|guard| guard.value());
            if let Some(existing) = existing {
                return Err(StoreError::DuplicateFilepath {
                    filepath: image.filepath.clone(),
                    existing: ImageId::from_u64(existing),
                });
            }

            let mut images = write_txn
                .open_table(IMAGES_TABLE)
                .map_err(|e| table_err("images", e))?;

            let next = images
                .last()
                .map_err(|e| StoreError::DatabaseError(format!("Failed to read last id: {}", e)))?
                .map_or(1, |(key, _)| key.value() + 1);

            let record = ImageRecord {
                id: ImageId::from_u64(next),
                filename: image.filename.clone(),
                filepath: image.filepath.clone(),
                timestamp: image.timestamp,
                ai_description: image.ai_description.clone(),
                model_name: image.model_name.clone(),
            };
            let bytes = Self::serialize_image(&record)?;

            images
                .insert(next, bytes.as_slice())
                .map_err(|e| StoreError::DatabaseError(format!("Failed to insert image: {}", e)))?;
            filepaths
                .insert(image.filepath.as_str(), next)
                .map_err(|e| {
                    StoreError::DatabaseError(format!("Failed to index filepath: {}", e))
                })?;
            image_id = ImageId::from_u64(next);
        }
        write_txn.commit().map_err(commit_err)?;
        Ok(image_id)
    }

    async fn get_image(&self, id: ImageId) -> Result<Option<ImageRecord>, StoreError> {
        let read_txn = self.begin_read()?;
        let table = read_txn
            .open_table(IMAGES_TABLE)
            .map_err(|e| table_err("images", e))?;

        match table.get(id.as_u64()) {
            Ok(Some(guard)) => Ok(Some(Self::deserialize_image(guard.value())?)),
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::DatabaseError(format!(
                "Failed to get image: {}",
                e
            ))),
        }
    }

    async fn update_description(
        &self,
        id: ImageId,
        description: &str,
        model_name: &str,
    ) -> Result<(), StoreError> {
        let write_txn = self.begin_write()?;
        {
            let mut images = write_txn
                .open_table(IMAGES_TABLE)
                .map_err(|e| table_err("images", e))?;

            let mut record = match images.get(id.as_u64()) {
                Ok(Some(guard)) => Self::deserialize_image(guard.value())?,
                Ok(None) => return Err(StoreError::NotFound(format!("image {}", id))),
                Err(e) => {
                    return Err(StoreError::DatabaseError(format!(
                        "Failed to get image: {}",
                        e
                    )))
                }
            };
            record.ai_description = Some(description.to_string());
            record.model_name = Some(model_name.to_string());

            let bytes = Self::serialize_image(&record)?;
            images
                .insert(id.as_u64(), bytes.as_slice())
                .map_err(|e| StoreError::DatabaseError(format!("Failed to update image: {}", e)))?;
        }
        write_txn.commit().map_err(commit_err)
    }

    async fn insert_ocr_result(
        &self,
        id: ImageId,
        text: &str,
        confidence: f32,
    ) -> Result<(), StoreError> {
        let record = OcrRecord {
            image_id: id,
            text: text.to_string(),
            confidence,
        };
        let bytes = Self::serialize_ocr(&record)?;

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn
                .open_table(OCR_TABLE)
                .map_err(|e| table_err("ocr_results", e))?;
            table
                .insert(id.as_u64(), bytes.as_slice())
                .map_err(|e| StoreError::DatabaseError(format!("Failed to insert OCR: {}", e)))?;
        }
        write_txn.commit().map_err(commit_err)
    }

    async fn get_ocr_result(&self, id: ImageId) -> Result<Option<OcrRecord>, StoreError> {
        let read_txn = self.begin_read()?;
        let table = read_txn
            .open_table(OCR_TABLE)
            .map_err(|e| table_err("ocr_results", e))?;

        match table.get(id.as_u64()) {
            Ok(Some(guard)) => Ok(Some(Self::deserialize_ocr(guard.value())?)),
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::DatabaseError(format!(
                "Failed to get OCR: {}",
                e
            ))),
        }
    }

    async fn upsert_description_embedding(
        &self,
        id: ImageId,
        embedding: &[f32],
    ) -> Result<(), StoreError> {
        validate_dimension(self.embedding_dim, embedding.len())?;
        let bytes = Self::serialize_embedding(embedding);

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn
                .open_table(EMBEDDINGS_TABLE)
                .map_err(|e| table_err("text_embedding", e))?;
            // Insert on an existing key replaces the value - the upsert.
            table
                .insert(
                    (id.as_u64(), crate::config::DESCRIPTION_CHUNK_INDEX),
                    bytes.as_slice(),
                )
                .map_err(|e| {
                    StoreError::DatabaseError(format!("Failed to upsert embedding: {}", e))
                })?;
        }
        write_txn.commit().map_err(commit_err)
    }

    async fn insert_chunk_embeddings(
        &self,
        id: ImageId,
        embeddings: &[(i32, Vec<f32>)],
    ) -> Result<(), StoreError> {
        for (_, embedding) in embeddings {
            validate_dimension(self.embedding_dim, embedding.len())?;
        }

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn
                .open_table(EMBEDDINGS_TABLE)
                .map_err(|e| table_err("text_embedding", e))?;
            for (chunk_index, embedding) in embeddings {
                let bytes = Self::serialize_embedding(embedding);
                table
                    .insert((id.as_u64(), *chunk_index), bytes.as_slice())
                    .map_err(|e| {
                        StoreError::DatabaseError(format!("Failed to insert embedding: {}", e))
                    })?;
            }
        }
        write_txn.commit().map_err(commit_err)
    }

    async fn get_embedding(
        &self,
        id: ImageId,
        chunk_index: i32,
    ) -> Result<Option<Vec<f32>>, StoreError> {
        let read_txn = self.begin_read()?;
        let table = read_txn
            .open_table(EMBEDDINGS_TABLE)
            .map_err(|e| table_err("text_embedding", e))?;

        match table.get((id.as_u64(), chunk_index)) {
            Ok(Some(guard)) => Ok(Some(Self::deserialize_embedding(guard.value()))),
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::DatabaseError(format!(
                "Failed to get embedding: {}",
                e
            ))),
        }
    }

    async fn embedding_indices(&self, id: ImageId) -> Result<Vec<i32>, StoreError> {
        let read_txn = self.begin_read()?;
        let table = read_txn
            .open_table(EMBEDDINGS_TABLE)
            .map_err(|e| table_err("text_embedding", e))?;

        // Composite keys sort by image id first, so this is a range scan.
        let range = table
            .range((id.as_u64(), i32::MIN)..=(id.as_u64(), i32::MAX))
            .map_err(|e| {
                StoreError::DatabaseError(format!("Failed to scan embeddings: {}", e))
            })?;

        let mut indices = Vec::new();
        for entry in range {
            let (key, _) = entry.map_err(|e| {
                StoreError::DatabaseError(format!("Failed to read embedding entry: {}", e))
            })?;
            indices.push(key.value().1);
        }
        Ok(indices)
    }

    async fn top_k_by_similarity(
        &self,
        query: &[f32],
        k: usize,
        min_similarity: f32,
    ) -> Result<Vec<SimilarityHit>, StoreError> {
        validate_dimension(self.embedding_dim, query.len())?;

        let read_txn = self.begin_read()?;
        let table = read_txn
            .open_table(EMBEDDINGS_TABLE)
            .map_err(|e| table_err("text_embedding", e))?;

        let iter = table.iter().map_err(|e| {
            StoreError::DatabaseError(format!("Failed to iterate embeddings: {}", e))
        })?;

        let mut best: BTreeMap<u64, f32> = BTreeMap::new();
        for entry in iter {
            let (key, value) = entry.map_err(|e| {
                StoreError::DatabaseError(format!("Failed to read embedding entry: {}", e))
            })?;
            let (image, _) = key.value();
            let embedding = Self::deserialize_embedding(value.value());
            let similarity = cosine_similarity(query, &embedding);
            let slot = best.entry(image).or_insert(f32::MIN);
            if similarity > *slot {
                *slot = similarity;
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

        let read_txn = self.begin_read()?;
        let images = read_txn
            .open_table(IMAGES_TABLE)
            .map_err(|e| table_err("images", e))?;
        let ocr = read_txn
            .open_table(OCR_TABLE)
            .map_err(|e| table_err("ocr_results", e))?;

        let iter = images
            .iter()
            .map_err(|e| StoreError::DatabaseError(format!("Failed to iterate images: {}", e)))?;

        let mut matches = Vec::new();
        for entry in iter {
            if matches.len() >= limit {
                break;
            }
            let (key, value) = entry.map_err(|e| {
                StoreError::DatabaseError(format!("Failed to read image entry: {}", e))
            })?;
            let record = Self::deserialize_image(value.value())?;

            let in_description = record
                .ai_description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle));

            let in_text = match ocr.get(key.value()) {
                Ok(Some(guard)) => Self::deserialize_ocr(guard.value())?
                    .text
                    .to_lowercase()
                    .contains(&needle),
                Ok(None) => false,
                Err(e) => {
                    return Err(StoreError::DatabaseError(format!(
                        "Failed to get OCR: {}",
                        e
                    )))
                }
            };

            if in_text || in_description {
                matches.push(record.id);
            }
        }
        Ok(matches)
    }

    async fn image_count(&self) -> Result<usize, StoreError> {
        let read_txn = self.begin_read()?;
        let table = read_txn
            .open_table(IMAGES_TABLE)
            .map_err(|e| table_err("images", e))?;
        let count = table
            .len()
            .map_err(|e| StoreError::DatabaseError(format!("Failed to count images: {}", e)))?;
        Ok(count as usize)
    }

    async fn ocr_count(&self) -> Result<usize, StoreError> {
        let read_txn = self.begin_read()?;
        let table = read_txn
            .open_table(OCR_TABLE)
            .map_err(|e| table_err("ocr_results", e))?;
        let count = table
            .len()
            .map_err(|e| StoreError::DatabaseError(format!("Failed to count OCR rows: {}", e)))?;
        Ok(count as usize)
    }

    async fn embedding_count(&self) -> Result<usize, StoreError> {
        let read_txn = self.begin_read()?;
        let table = read_txn
            .open_table(EMBEDDINGS_TABLE)
            .map_err(|e| table_err("text_embedding", e))?;
        let count = table.len().map_err(|e| {
            StoreError::DatabaseError(format!("Failed to count embeddings: {}", e))
        })?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (RedbImageStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.redb");
        let store = RedbImageStore::open(&db_path, 3).unwrap();
        (store, temp_dir)
    }

    fn make_image(filepath: &str) -> NewImage {
        NewImage {
            filename: filepath.rsplit('/').next().unwrap_or(filepath).to_string(),
            filepath: filepath.to_string(),
            timestamp: 1700000000,
            ai_description: None,
            model_name: None,
        }
    }

    #[tokio::test]
    async fn test_image_crud() {
        let (store, _temp) = create_test_store();

        assert!(store
            .find_image_by_filepath("/shots/a.png")
            .await
            .unwrap()
            .is_none());

        let id = store
            .insert_image(&make_image("/shots/a.png"))
            .await
            .unwrap();
        assert_eq!(
            store.find_image_by_filepath("/shots/a.png").await.unwrap(),
            Some(id)
        );

        let record = store.get_image(id).await.unwrap().unwrap();
        assert_eq!(record.filename, "a.png");
        assert_eq!(record.timestamp, 1700000000);
    }

    #[tokio::test]
    async fn test_duplicate_filepath_constraint() {
        let (store, _temp) = create_test_store();
        let first = store
            .insert_image(&make_image("/shots/a.png"))
            .await
            .unwrap();

        let err = store
            .insert_image(&make_image("/shots/a.png"))
            .await
            .unwrap_err();
        match err {
            StoreError::DuplicateFilepath { existing, .. } => assert_eq!(existing, first),
            other => panic!("expected DuplicateFilepath, got {:?}", other),
        }

        // The aborted transaction must not have left a second row.
        assert_eq!(store.image_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_description() {
        let (store, _temp) = create_test_store();
        let id = store
            .insert_image(&make_image("/shots/a.png"))
            .await
            .unwrap();

        store
            .update_description(id, "terminal with build output", "qwen3-vl:30b")
            .await
            .unwrap();

        let record = store.get_image(id).await.unwrap().unwrap();
        assert_eq!(
            record.ai_description.as_deref(),
            Some("terminal with build output")
        );
        assert_eq!(record.model_name.as_deref(), Some("qwen3-vl:30b"));
    }

    #[tokio::test]
    async fn test_ocr_roundtrip_with_unicode() {
        let (store, _temp) = create_test_store();
        let id = store
            .insert_image(&make_image("/shots/스크린샷.png"))
            .await
            .unwrap();

        store
            .insert_ocr_result(id, "결제 완료 합계 42.00", 0.88)
            .await
            .unwrap();
        let record = store.get_ocr_result(id).await.unwrap().unwrap();
        assert_eq!(record.text, "결제 완료 합계 42.00");
    }

    #[tokio::test]
    async fn test_embedding_roundtrip_and_indices() {
        let (store, _temp) = create_test_store();
        let id = store
            .insert_image(&make_image("/shots/a.png"))
            .await
            .unwrap();

        store
            .upsert_description_embedding(id, &[0.1, 0.2, 0.3])
            .await
            .unwrap();
        store
            .insert_chunk_embeddings(
                id,
                &[(0, vec![1.0, 0.0, 0.0]), (2, vec![0.0, 0.0, 1.0])],
            )
            .await
            .unwrap();

        assert_eq!(
            store.get_embedding(id, -1).await.unwrap().unwrap(),
            vec![0.1, 0.2, 0.3]
        );
        assert_eq!(store.embedding_indices(id).await.unwrap(), vec![-1, 0, 2]);
    }

    #[tokio::test]
    async fn test_description_embedding_upsert_keeps_one_row() {
        let (store, _temp) = create_test_store();
        let id = store
            .insert_image(&make_image("/shots/a.png"))
            .await
            .unwrap();

        store
            .upsert_description_embedding(id, &[1.0, 0.0, 0.0])
            .await
            .unwrap();
        store
            .upsert_description_embedding(id, &[0.0, 1.0, 0.0])
            .await
            .unwrap();

        assert_eq!(store.embedding_count().await.unwrap(), 1);
        assert_eq!(
            store.get_embedding(id, -1).await.unwrap().unwrap(),
            vec![0.0, 1.0, 0.0]
        );
    }

    #[tokio::test]
    async fn test_top_k_threshold_and_order() {
        let (store, _temp) = create_test_store();
        let a = store
            .insert_image(&make_image("/shots/a.png"))
            .await
            .unwrap();
        let b = store
            .insert_image(&make_image("/shots/b.png"))
            .await
            .unwrap();
        let c = store
            .insert_image(&make_image("/shots/c.png"))
            .await
            .unwrap();

        store
            .insert_chunk_embeddings(a, &[(0, vec![1.0, 0.0, 0.0])])
            .await
            .unwrap();
        store
            .insert_chunk_embeddings(b, &[(0, vec![0.8, 0.6, 0.0])])
            .await
            .unwrap();
        // Orthogonal - below any sensible threshold.
        store
            .insert_chunk_embeddings(c, &[(0, vec![0.0, 0.0, 1.0])])
            .await
            .unwrap();

        let hits = store
            .top_k_by_similarity(&[1.0, 0.0, 0.0], 10, 0.35)
            .await
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].image_id, a);
        assert_eq!(hits[1].image_id, b);
        for hit in &hits {
            assert!(hit.similarity >= 0.35);
        }
    }

    #[tokio::test]
    async fn test_find_matching_text() {
        let (store, _temp) = create_test_store();

        let a = store
            .insert_image(&make_image("/shots/a.png"))
            .await
            .unwrap();
        store
            .insert_ocr_result(a, "invoice total 42.00", 1.0)
            .await
            .unwrap();

        let mut described = make_image("/shots/b.png");
        described.ai_description = Some("A spreadsheet showing quarterly revenue".to_string());
        let b = store.insert_image(&described).await.unwrap();

        assert_eq!(
            store.find_matching_text("INVOICE", 10).await.unwrap(),
            vec![a]
        );
        assert_eq!(
            store.find_matching_text("revenue", 10).await.unwrap(),
            vec![b]
        );
    }

    #[tokio::test]
    async fn test_persistence_across_reopens() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("persist.redb");

        let id = {
            let store = RedbImageStore::open(&db_path, 3).unwrap();
            let id = store
                .insert_image(&make_image("/shots/a.png"))
                .await
                .unwrap();
            store.insert_ocr_result(id, "persisted", 1.0).await.unwrap();
            store
                .insert_chunk_embeddings(id, &[(0, vec![1.0, 2.0, 3.0])])
                .await
                .unwrap();
            id
        };

        {
            let store = RedbImageStore::open(&db_path, 3).unwrap();
            assert_eq!(
                store.find_image_by_filepath("/shots/a.png").await.unwrap(),
                Some(id)
            );
            assert_eq!(
                store.get_ocr_result(id).await.unwrap().unwrap().text,
                "persisted"
            );
            assert_eq!(
                store.get_embedding(id, 0).await.unwrap().unwrap(),
                vec![1.0, 2.0, 3.0]
            );
        }
    }

    #[tokio::test]
    async fn test_ids_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("ids.redb");

        let first = {
            let store = RedbImageStore::open(&db_path, 3).unwrap();
            store
                .insert_image(&make_image("/shots/a.png"))
                .await
                .unwrap()
        };

        let store = RedbImageStore::open(&db_path, 3).unwrap();
        let second = store
            .insert_image(&make_image("/shots/b.png"))
            .await
            .unwrap();
        assert!(second.as_u64() > first.as_u64());
    }

    #[test]
    fn test_embedding_byte_roundtrip() {
        let embedding = vec![1.5, -2.25, 0.0, f32::MAX];
        let bytes = RedbImageStore::serialize_embedding(&embedding);
        assert_eq!(bytes.len(), 16);
        assert_eq!(RedbImageStore::deserialize_embedding(&bytes), embedding);
    }
}
