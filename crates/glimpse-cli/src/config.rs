//! Configuration and path resolution for the CLI.
//!
//! The data directory follows the platform standard location unless
//! overridden; the inference endpoint and model names come from environment
//! variables so they match however the local backend is deployed.

use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use glimpse_core::config::EMBEDDING_DIM;
use glimpse_core::extract::TextExtractor;
use glimpse_core::model::OllamaClient;
use glimpse_core::storage::RedbImageStore;
use std::path::PathBuf;
use std::sync::Arc;

/// Database file name inside the data directory.
const DATABASE_FILENAME: &str = "glimpse.redb";

/// Inference endpoint base URL.
const MODEL_URL_ENV: &str = "GLIMPSE_MODEL_URL";
/// Vision model override.
const VISION_MODEL_ENV: &str = "GLIMPSE_VISION_MODEL";
/// Embedding model override.
const EMBEDDING_MODEL_ENV: &str = "GLIMPSE_EMBEDDING_MODEL";

const DEFAULT_MODEL_URL: &str = "http://localhost:11434";

/// Returns the data directory.
///
/// - macOS: `~/Library/Application Support/dev.errorsignal.Glimpse/`
/// - Linux: `~/.local/share/glimpse/`
/// - Windows: `%APPDATA%\errorsignal\Glimpse\data\`
pub fn get_data_dir(custom_dir: Option<&PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = custom_dir {
        return Ok(dir.clone());
    }

    ProjectDirs::from("dev", "errorsignal", "Glimpse")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| anyhow!("Could not determine data directory"))
}

/// Returns the path to the database file, creating the data directory.
pub fn database_path(custom_dir: Option<&PathBuf>) -> Result<PathBuf> {
    let data_dir = get_data_dir(custom_dir)?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    Ok(data_dir.join(DATABASE_FILENAME))
}

/// Opens (or creates) the on-disk image store.
pub fn open_store(custom_dir: Option<&PathBuf>) -> Result<RedbImageStore> {
    let db_path = database_path(custom_dir)?;
    RedbImageStore::open(&db_path, EMBEDDING_DIM)
        .with_context(|| format!("Failed to open database: {}", db_path.display()))
}

/// Builds the inference client from the environment.
pub fn model_client() -> OllamaClient {
    let host = std::env::var(MODEL_URL_ENV).unwrap_or_else(|_| DEFAULT_MODEL_URL.to_string());
    let mut client = OllamaClient::new(host);
    if let Ok(model) = std::env::var(VISION_MODEL_ENV) {
        client = client.with_vision_model(model);
    }
    if let Ok(model) = std::env::var(EMBEDDING_MODEL_ENV) {
        client = client.with_embedding_model(model);
    }
    client
}

/// Builds the text extractor: local Tesseract when compiled in, otherwise the
/// vision endpoint doubles as the OCR engine.
#[cfg(feature = "ocr-tesseract")]
pub fn extractor(_client: Arc<OllamaClient>) -> Arc<dyn TextExtractor> {
    let datapath = std::env::var("GLIMPSE_TESSDATA").ok();
    let language = std::env::var("GLIMPSE_OCR_LANG").unwrap_or_else(|_| "eng".to_string());
    Arc::new(glimpse_core::extract::TesseractExtractor::new(
        datapath, language,
    ))
}

/// Builds the text extractor: local Tesseract when compiled in, otherwise the
/// vision endpoint doubles as the OCR engine.
#[cfg(not(feature = "ocr-tesseract"))]
pub fn extractor(client: Arc<OllamaClient>) -> Arc<dyn TextExtractor> {
    Arc::new(glimpse_core::extract::VisionExtractor::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_data_dir_wins() {
        let custom = PathBuf::from("/tmp/custom-glimpse-data");
        let dir = get_data_dir(Some(&custom)).unwrap();
        assert_eq!(dir, custom);
    }

    #[test]
    fn test_default_data_dir_resolves() {
        let dir = get_data_dir(None).unwrap();
        let dir_str = dir.to_string_lossy().to_lowercase();
        assert!(
            dir_str.contains("glimpse") || dir_str.contains("errorsignal"),
            "Data dir should use the project identifier: {}",
            dir_str
        );
    }

    #[test]
    fn test_database_path_under_data_dir() {
        let temp = tempfile::TempDir::new().unwrap();
        let custom = temp.path().to_path_buf();
        let path = database_path(Some(&custom)).unwrap();
        assert!(path.starts_with(&custom));
        assert!(path.ends_with(DATABASE_FILENAME));
    }
}
