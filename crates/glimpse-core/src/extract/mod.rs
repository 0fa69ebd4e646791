//! Text extraction from screenshot bytes.
//!
//! Extraction is a pure function of image bytes: callers read the file
//! themselves (raw bytes, never path-string APIs, so non-Latin filenames
//! work) and hand the bytes to a [`TextExtractor`].
//!
//! Two providers are available:
//!
//! - [`VisionExtractor`] - transcribes text through the local vision
//!   endpoint; always built.
//! - [`TesseractExtractor`] - local Tesseract engine; behind the
//!   `ocr-tesseract` feature since it needs system libraries.
//!
//! Extraction failure is never fatal to ingestion; callers log the error and
//! proceed with empty text.

#[cfg(feature = "ocr-tesseract")]
mod tesseract;

#[cfg(feature = "ocr-tesseract")]
pub use tesseract::TesseractExtractor;

use crate::error::{ExtractionError, ModelError};
use crate::model::OllamaClient;
use std::sync::Arc;
use tracing::debug;

/// A single recognized line of text.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrLine {
    /// Recognized text, trimmed
    pub text: String,
    /// Recognition confidence in [0, 1]
    pub confidence: f32,
}

/// Trait for OCR engines.
///
/// Implementations return recognized lines in reading order, or an error when
/// the image cannot be decoded or the engine fails. An empty vector is a
/// valid result ("no text found").
#[async_trait::async_trait(?Send)]
pub trait TextExtractor: Send + Sync {
    /// Extracts ordered text lines with per-line confidence from image bytes.
    async fn extract(&self, image_bytes: &[u8]) -> Result<Vec<OcrLine>, ExtractionError>;
}

/// Joins extracted lines into the flat text stored with the image.
pub fn join_lines(lines: &[OcrLine]) -> String {
    lines
        .iter()
        .map(|l| l.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Mean confidence across extracted lines, 0.0 when empty.
pub fn mean_confidence(lines: &[OcrLine]) -> f32 {
    if lines.is_empty() {
        return 0.0;
    }
    lines.iter().map(|l| l.confidence).sum::<f32>() / lines.len() as f32
}

/// OCR via the local vision endpoint.
///
/// Sends the screenshot with a transcription prompt and splits the response
/// into lines. The endpoint exposes no recognition confidence, so every line
/// reports 1.0.
pub struct VisionExtractor {
    client: Arc<OllamaClient>,
}

impl VisionExtractor {
    /// Creates an extractor backed by the given inference client.
    pub fn new(client: Arc<OllamaClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait(?Send)]
impl TextExtractor for VisionExtractor {
    async fn extract(&self, image_bytes: &[u8]) -> Result<Vec<OcrLine>, ExtractionError> {
        let text = self
            .client
            .transcribe(image_bytes)
            .await
            .map_err(|e| match e {
                ModelError::ImagePreparation(msg) => ExtractionError::Decode(msg),
                other => ExtractionError::Engine(other.to_string()),
            })?;

        let lines: Vec<OcrLine> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| OcrLine {
                text: l.to_string(),
                confidence: 1.0,
            })
            .collect();

        debug!("Vision transcription returned {} lines", lines.len());
        Ok(lines)
    }
}
