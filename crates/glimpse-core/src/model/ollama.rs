//! Ollama-compatible inference endpoint client.
//!
//! Speaks the endpoint's HTTP API: `/api/embeddings` for vectors,
//! `/api/chat` for vision calls (streamed for descriptions, single-shot for
//! transcription), and `/api/tags` for the model listing used as a health
//! check.
//!
//! All calls share a semaphore so a batch ingestion cannot pile more
//! concurrent requests onto the local backend than it can serve.

use super::{Description, TextEmbedder, VisionDescriber};
use crate::config::{
    CHAT_NUM_CTX, DEFAULT_EMBEDDING_MODEL, DEFAULT_VISION_MODEL, DESCRIPTION_PROMPT,
    EMBED_NUM_CTX, MAX_INFLIGHT_MODEL_CALLS, MAX_VISION_EDGE, MODEL_KEEP_ALIVE, TRANSCRIBE_PROMPT,
};
use crate::error::ModelError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use futures::StreamExt;
use serde::Deserialize;
use std::io::Cursor;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{debug, instrument};

/// Maximum characters of an error body kept for logging.
const ERROR_BODY_MAX_LEN: usize = 200;

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// One NDJSON line of a chat response.
#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChatMessage>,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

/// Client for an Ollama-compatible local inference endpoint.
pub struct OllamaClient {
    http: reqwest::Client,
    host: String,
    vision_model: String,
    embedding_model: String,
    permits: Semaphore,
}

impl OllamaClient {
    /// Creates a client for the endpoint at `host` (e.g. `http://localhost:11434`).
    pub fn new(host: impl Into<String>) -> Self {
        let host = host.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            host,
            vision_model: DEFAULT_VISION_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            permits: Semaphore::new(MAX_INFLIGHT_MODEL_CALLS),
        }
    }

    /// Overrides the vision model.
    pub fn with_vision_model(mut self, model: impl Into<String>) -> Self {
        self.vision_model = model.into();
        self
    }

    /// Overrides the embedding model.
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = model.into();
        self
    }

    /// Returns the configured vision model identifier.
    pub fn vision_model(&self) -> &str {
        &self.vision_model
    }

    /// Lists models available on the endpoint.
    pub async fn list_models(&self) -> Result<Vec<String>, ModelError> {
        let resp = self
            .http
            .get(format!("{}/api/tags", self.host))
            .send()
            .await?;
        let resp = check_status(resp).await?;
        let tags: TagsResponse = resp
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Reports whether the endpoint is reachable.
    pub async fn is_available(&self) -> bool {
        self.list_models().await.is_ok()
    }

    /// Transcribes on-screen text via the vision model (single-shot call).
    #[instrument(skip_all, fields(bytes = image_bytes.len()))]
    pub async fn transcribe(&self, image_bytes: &[u8]) -> Result<String, ModelError> {
        let payload = encode_image_payload(image_bytes)?;
        let _permit = self.permit().await?;

        let body = serde_json::json!({
            "model": self.vision_model,
            "messages": [{
                "role": "user",
                "content": TRANSCRIBE_PROMPT,
                "images": [payload],
            }],
            "options": { "num_ctx": CHAT_NUM_CTX },
            "keep_alive": MODEL_KEEP_ALIVE,
            "stream": false,
        });

        let resp = self
            .http
            .post(format!("{}/api/chat", self.host))
            .json(&body)
            .send()
            .await?;
        let resp = check_status(resp).await?;

        let chunk: ChatChunk = resp
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
        Ok(chunk.message.map(|m| m.content).unwrap_or_default())
    }

    async fn permit(&self) -> Result<SemaphorePermit<'_>, ModelError> {
        self.permits
            .acquire()
            .await
            .map_err(|_| ModelError::InvalidResponse("request semaphore closed".to_string()))
    }
}

#[async_trait::async_trait(?Send)]
impl TextEmbedder for OllamaClient {
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>, ModelError> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let _permit = self.permit().await?;

        let body = serde_json::json!({
            "model": self.embedding_model,
            "prompt": text,
            "options": { "num_ctx": EMBED_NUM_CTX },
            "keep_alive": MODEL_KEEP_ALIVE,
        });

        let resp = self
            .http
            .post(format!("{}/api/embeddings", self.host))
            .json(&body)
            .send()
            .await?;
        let resp = check_status(resp).await?;

        let parsed: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
        if parsed.embedding.is_empty() {
            return Err(ModelError::InvalidResponse(
                "endpoint returned an empty embedding".to_string(),
            ));
        }
        Ok(Some(parsed.embedding))
    }
}

#[async_trait::async_trait(?Send)]
impl VisionDescriber for OllamaClient {
    #[instrument(skip_all, fields(bytes = image_bytes.len(), model = %self.vision_model))]
    async fn describe(&self, image_bytes: &[u8]) -> Result<Description, ModelError> {
        let payload = encode_image_payload(image_bytes)?;
        let _permit = self.permit().await?;

        let body = serde_json::json!({
            "model": self.vision_model,
            "messages": [{
                "role": "user",
                "content": DESCRIPTION_PROMPT,
                "images": [payload],
            }],
            "options": { "num_ctx": CHAT_NUM_CTX },
            "keep_alive": MODEL_KEEP_ALIVE,
            "stream": true,
        });

        let resp = self
            .http
            .post(format!("{}/api/chat", self.host))
            .json(&body)
            .send()
            .await?;
        let resp = check_status(resp).await?;

        // The endpoint streams NDJSON; concatenate the message content of
        // every line until the final `done` marker.
        let mut stream = resp.bytes_stream();
        let mut buffer = String::new();
        let mut description = String::new();

        while let Some(chunk) = stream.next().await {
            let bytes = chunk?;
            buffer.push_str(&String::from_utf8_lossy(&bytes));

            while let Some(newline) = buffer.find('\n') {
                let line: String = buffer.drain(..=newline).collect();
                append_stream_line(line.trim(), &mut description)?;
            }
        }
        if !buffer.trim().is_empty() {
            append_stream_line(buffer.trim(), &mut description)?;
        }

        debug!("Streamed description of {} chars", description.len());
        Ok(Description {
            text: description.trim().to_string(),
            model: self.vision_model.clone(),
        })
    }
}

/// Parses one NDJSON chat line, appending its content. Returns `true` on the
/// terminal line.
fn append_stream_line(line: &str, out: &mut String) -> Result<bool, ModelError> {
    if line.is_empty() {
        return Ok(false);
    }
    let chunk: ChatChunk =
        serde_json::from_str(line).map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
    if let Some(message) = chunk.message {
        out.push_str(&message.content);
    }
    Ok(chunk.done)
}

/// Decodes, downscales, and base64-encodes an image for a vision call.
///
/// The longest side is capped at [`MAX_VISION_EDGE`] to bound request latency
/// and cost; aspect ratio is preserved and the result re-encoded as PNG.
fn encode_image_payload(image_bytes: &[u8]) -> Result<String, ModelError> {
    let img = image::load_from_memory(image_bytes)
        .map_err(|e| ModelError::ImagePreparation(e.to_string()))?;

    let longest = img.width().max(img.height());
    let img = if longest > MAX_VISION_EDGE {
        img.resize(
            MAX_VISION_EDGE,
            MAX_VISION_EDGE,
            image::imageops::FilterType::Lanczos3,
        )
    } else {
        img
    };

    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| ModelError::ImagePreparation(e.to_string()))?;
    Ok(STANDARD.encode(&buf))
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ModelError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    let message: String = body.chars().take(ERROR_BODY_MAX_LEN).collect();
    Err(ModelError::Backend { status, message })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::DynamicImage::new_rgb8(width, height);
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_encode_image_payload_downscales_large_images() {
        let payload = encode_image_payload(&png_bytes(3240, 1080)).unwrap();
        let decoded = STANDARD.decode(payload).unwrap();
        let img = image::load_from_memory(&decoded).unwrap();
        assert_eq!(img.width().max(img.height()), MAX_VISION_EDGE);
    }

    #[test]
    fn test_encode_image_payload_keeps_small_images() {
        let payload = encode_image_payload(&png_bytes(800, 600)).unwrap();
        let decoded = STANDARD.decode(payload).unwrap();
        let img = image::load_from_memory(&decoded).unwrap();
        assert_eq!((img.width(), img.height()), (800, 600));
    }

    #[test]
    fn test_encode_image_payload_rejects_garbage() {
        let result = encode_image_payload(b"not an image");
        assert!(matches!(result, Err(ModelError::ImagePreparation(_))));
    }

    #[test]
    fn test_append_stream_line_accumulates_content() {
        let mut out = String::new();
        let done =
            append_stream_line(r#"{"message":{"content":"Hello "},"done":false}"#, &mut out)
                .unwrap();
        assert!(!done);
        let done =
            append_stream_line(r#"{"message":{"content":"world"},"done":false}"#, &mut out)
                .unwrap();
        assert!(!done);
        let done = append_stream_line(r#"{"message":{"content":""},"done":true}"#, &mut out)
            .unwrap();
        assert!(done);
        assert_eq!(out, "Hello world");
    }

    #[test]
    fn test_append_stream_line_skips_blank_lines() {
        let mut out = String::new();
        assert!(!append_stream_line("", &mut out).unwrap());
        assert!(out.is_empty());
    }

    #[test]
    fn test_append_stream_line_rejects_malformed_json() {
        let mut out = String::new();
        assert!(append_stream_line("{not json", &mut out).is_err());
    }

    #[test]
    fn test_embedding_response_parsing() {
        let parsed: EmbeddingResponse =
            serde_json::from_str(r#"{"embedding":[0.1,0.2,0.3]}"#).unwrap();
        assert_eq!(parsed.embedding.len(), 3);
    }

    #[test]
    fn test_tags_response_parsing() {
        let parsed: TagsResponse = serde_json::from_str(
            r#"{"models":[{"name":"bge-m3:latest","size":1234},{"name":"qwen3-vl:30b"}]}"#,
        )
        .unwrap();
        let names: Vec<String> = parsed.models.into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["bge-m3:latest", "qwen3-vl:30b"]);
    }

    #[test]
    fn test_host_trailing_slash_is_trimmed() {
        let client = OllamaClient::new("http://localhost:11434/");
        assert_eq!(client.host, "http://localhost:11434");
    }
}
