//! Output formatting for search results.
//!
//! Supports both human-readable terminal output and JSON for scripting.

use glimpse_core::search::{SearchMode, SearchResult};
use serde::Serialize;

/// Maximum characters shown in a text or description snippet.
const SNIPPET_MAX_LEN: usize = 200;

/// JSON output envelope.
#[derive(Serialize)]
pub struct JsonOutput {
    pub query: String,
    pub mode: String,
    pub results: Vec<JsonResult>,
}

/// One search result in JSON form.
#[derive(Serialize)]
pub struct JsonResult {
    pub id: u64,
    pub filename: String,
    pub filepath: String,
    pub timestamp: u64,
    pub score: f32,
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
    pub confidence: f32,
    pub description: Option<String>,
}

impl From<&SearchResult> for JsonResult {
    fn from(result: &SearchResult) -> Self {
        Self {
            id: result.id.as_u64(),
            filename: result.filename.clone(),
            filepath: result.filepath.clone(),
            timestamp: result.timestamp,
            score: result.score,
            kind: result.kind.as_str().to_string(),
            text: result.text.clone(),
            confidence: result.confidence,
            description: result.description.clone(),
        }
    }
}

/// Formats search results as JSON.
pub fn format_json(query: &str, mode: SearchMode, results: &[SearchResult]) -> String {
    let output = JsonOutput {
        query: query.to_string(),
        mode: format!("{:?}", mode).to_lowercase(),
        results: results.iter().map(JsonResult::from).collect(),
    };
    serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
}

/// Formats search results for human-readable terminal output.
pub fn format_human(query: &str, results: &[SearchResult]) -> String {
    if results.is_empty() {
        return format!("No results found for \"{}\"", query);
    }

    let mut output = String::new();
    output.push_str(&format!(
        "Found {} result{} for \"{}\":\n\n",
        results.len(),
        if results.len() == 1 { "" } else { "s" },
        query
    ));

    for (i, result) in results.iter().enumerate() {
        output.push_str(&format!(
            "{}. {} (score: {:.2}, {})\n",
            i + 1,
            result.filename,
            result.score,
            result.kind.as_str()
        ));
        output.push_str(&format!("   Path: {}\n", result.filepath));

        if let Some(description) = &result.description {
            output.push_str(&format!(
                "   {}\n",
                truncate_text(description, SNIPPET_MAX_LEN)
            ));
        }
        if !result.text.is_empty() {
            output.push_str(&format!(
                "   Text: {}\n",
                truncate_text(&result.text, SNIPPET_MAX_LEN)
            ));
        }

        output.push('\n');
    }

    output.trim_end().to_string()
}

/// Truncates text to a maximum length at a word boundary, adding an ellipsis.
fn truncate_text(text: &str, max_len: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_len {
        return text.to_string();
    }

    let truncated: String = text.chars().take(max_len).collect();
    if let Some(last_space) = truncated.rfind(' ') {
        format!("{}...", &truncated[..last_space])
    } else {
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glimpse_core::search::{ImageId, ResultKind};

    fn make_result(id: u64, filename: &str, score: f32, kind: ResultKind) -> SearchResult {
        SearchResult {
            id: ImageId::from_u64(id),
            filename: filename.to_string(),
            filepath: format!("/shots/{}", filename),
            timestamp: 1700000000,
            text: "invoice total 42.00".to_string(),
            confidence: 0.9,
            score,
            description: Some("a billing screen".to_string()),
            kind,
        }
    }

    #[test]
    fn test_format_human_empty() {
        let output = format_human("nothing", &[]);
        assert!(output.contains("No results found"));
    }

    #[test]
    fn test_format_human_single() {
        let results = vec![make_result(1, "a.png", 0.87, ResultKind::Semantic)];
        let output = format_human("invoice", &results);
        assert!(output.contains("1 result"));
        assert!(output.contains("a.png"));
        assert!(output.contains("0.87"));
        assert!(output.contains("semantic"));
        assert!(output.contains("/shots/a.png"));
    }

    #[test]
    fn test_format_json_fields() {
        let results = vec![make_result(7, "b.png", 1.0, ResultKind::Keyword)];
        let output = format_json("invoice", SearchMode::Keyword, &results);
        assert!(output.contains("\"query\": \"invoice\""));
        assert!(output.contains("\"mode\": \"keyword\""));
        assert!(output.contains("\"id\": 7"));
        assert!(output.contains("\"type\": \"keyword\""));
        assert!(output.contains("\"filepath\": \"/shots/b.png\""));
    }

    #[test]
    fn test_truncate_text() {
        let short = "Short text";
        assert_eq!(truncate_text(short, 50), short);

        let long = "This is a much longer text that should be truncated at a word boundary";
        let truncated = truncate_text(long, 30);
        assert!(truncated.ends_with("..."));
        assert!(truncated.chars().count() <= 33);
    }

    #[test]
    fn test_truncate_text_multibyte_safe() {
        let text = "스크린샷 검색은 한국어 텍스트도 안전하게 자른다";
        let truncated = truncate_text(text, 10);
        assert!(truncated.ends_with("..."));
    }
}
