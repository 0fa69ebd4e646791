//! Production configuration constants.
//!
//! These values define the production configuration for Glimpse and are used
//! throughout the codebase and in tests to ensure consistency.

// =============================================================================
// Embedding Model Configuration
// =============================================================================

/// Embedding vector dimension.
///
/// bge-m3 produces 1024-dimensional embeddings. Mixing dimensions corrupts
/// similarity queries, so every write and query is validated against this.
pub const EMBEDDING_DIM: usize = 1024;

/// Default embedding model served by the local inference endpoint.
pub const DEFAULT_EMBEDDING_MODEL: &str = "bge-m3:latest";

/// Default vision model used for descriptions and vision-backed OCR.
pub const DEFAULT_VISION_MODEL: &str = "qwen3-vl:30b";

/// Context window requested for embedding calls.
pub const EMBED_NUM_CTX: u32 = 2048;

/// Context window requested for vision chat calls.
pub const CHAT_NUM_CTX: u32 = 4096;

/// How long the endpoint should keep models resident between calls.
pub const MODEL_KEEP_ALIVE: &str = "10m";

/// Maximum concurrent in-flight requests against the inference endpoint.
///
/// Extraction, description, and embedding calls all block for seconds on a
/// local backend; unbounded concurrency overwhelms it.
pub const MAX_INFLIGHT_MODEL_CALLS: usize = 2;

// =============================================================================
// Text Chunking Configuration
// =============================================================================

/// Maximum characters per OCR-text chunk.
pub const MAX_CHUNK_CHARS: usize = 1000;

/// Overlap in characters between consecutive chunks.
pub const CHUNK_OVERLAP: usize = 100;

// =============================================================================
// Ingestion Configuration
// =============================================================================

/// Sentinel OCR text stored when extraction yields nothing.
///
/// Every successfully ingested image has exactly one OCR row; this keeps that
/// invariant when there is no text to store.
pub const NO_TEXT_PLACEHOLDER: &str = "[No text extracted]";

/// Reserved chunk index for the embedding of the AI-generated description.
///
/// Indices `0..N` are OCR-text chunks; this row is the only one ever
/// replaced (on description regeneration).
pub const DESCRIPTION_CHUNK_INDEX: i32 = -1;

/// Longest allowed image edge for vision calls, in pixels.
///
/// Images are downscaled to this cap before being sent to the vision model
/// to bound request latency and cost.
pub const MAX_VISION_EDGE: u32 = 1620;

/// Instructional prompt for description generation.
pub const DESCRIPTION_PROMPT: &str = "Provide a clear and professional summary of this screenshot in 8-10 sentences as well as texts up to 100 words. \
     Identify the primary application(s) visible and describe the user's main activity. \
     Highlight key on-screen content with specificity. \
     Ensure the description is accurate, concise, and contextually informative.";

/// Instructional prompt for vision-backed text extraction.
pub const TRANSCRIBE_PROMPT: &str = "Transcribe all text visible in this screenshot. \
     Output one line of transcribed text per visible line, top to bottom, with no commentary. \
     If no text is visible, output nothing.";

// =============================================================================
// Search Configuration
// =============================================================================

/// Minimum cosine similarity for a semantic result to be returned.
pub const MIN_SIMILARITY: f32 = 0.35;
