//! Tesseract-backed text extraction.
//!
//! Requires system libtesseract and libleptonica plus trained data for the
//! configured language, which is why this provider sits behind the
//! `ocr-tesseract` feature.

use super::{OcrLine, TextExtractor};
use crate::error::ExtractionError;
use tracing::debug;

/// Local Tesseract OCR engine.
///
/// The engine itself is not thread-safe, so a fresh handle is created per
/// extraction; initialization is cheap next to recognition time.
pub struct TesseractExtractor {
    /// Directory containing `*.traineddata`, or `None` for the system default
    datapath: Option<String>,
    /// Tesseract language code, e.g. "eng" or "kor"
    language: String,
}

impl TesseractExtractor {
    /// Creates an extractor for the given language.
    pub fn new(datapath: Option<String>, language: impl Into<String>) -> Self {
        Self {
            datapath,
            language: language.into(),
        }
    }
}

#[async_trait::async_trait(?Send)]
impl TextExtractor for TesseractExtractor {
    async fn extract(&self, image_bytes: &[u8]) -> Result<Vec<OcrLine>, ExtractionError> {
        let mut engine = leptess::LepTess::new(self.datapath.as_deref(), &self.language)
            .map_err(|e| ExtractionError::Engine(e.to_string()))?;

        engine
            .set_image_from_mem(image_bytes)
            .map_err(|e| ExtractionError::Decode(e.to_string()))?;

        let text = engine
            .get_utf8_text()
            .map_err(|e| ExtractionError::Engine(e.to_string()))?;

        // Tesseract reports mean confidence 0-100 for the whole page.
        let confidence = (engine.mean_text_conf() as f32 / 100.0).clamp(0.0, 1.0);

        let lines: Vec<OcrLine> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| OcrLine {
                text: l.to_string(),
                confidence,
            })
            .collect();

        debug!(
            "Tesseract recognized {} lines (confidence {:.2})",
            lines.len(),
            confidence
        );
        Ok(lines)
    }
}
