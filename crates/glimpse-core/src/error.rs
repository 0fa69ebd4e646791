//! Error types for glimpse-core.
//!
//! Storage and search errors live next to their modules ([`crate::storage`]
//! and [`crate::search`]); this module holds the error types shared by the
//! extraction and model-client layers.

use thiserror::Error;

/// Errors that can occur during text extraction.
#[derive(Debug, Clone, Error)]
pub enum ExtractionError {
    /// Image bytes could not be decoded
    #[error("Failed to decode image: {0}")]
    Decode(String),
    /// The OCR engine failed or is unavailable
    #[error("OCR engine error: {0}")]
    Engine(String),
}

/// Errors that can occur when calling the local inference endpoint.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Transport-level failure (connection refused, timeout, etc.)
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The endpoint answered with a non-success status
    #[error("Backend error ({status}): {message}")]
    Backend {
        /// HTTP status code returned by the endpoint
        status: u16,
        /// Response body, truncated for logging
        message: String,
    },
    /// The response body did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    /// The image payload could not be prepared for the request
    #[error("Failed to prepare image: {0}")]
    ImagePreparation(String),
}

/// Errors that can occur while regenerating an image description.
#[derive(Debug, Error)]
pub enum RegenerateError {
    /// No image record with the given id
    #[error("Image {0} not found")]
    NotFound(u64),
    /// The source file could not be read
    #[error("Failed to read image file: {0}")]
    Io(#[from] std::io::Error),
    /// The vision model returned an error or an empty description
    #[error("Description generation failed: {0}")]
    Describe(String),
    /// A storage write failed
    #[error("Storage error: {0}")]
    Store(#[from] crate::storage::StoreError),
}

impl From<ModelError> for RegenerateError {
    fn from(err: ModelError) -> Self {
        RegenerateError::Describe(err.to_string())
    }
}
