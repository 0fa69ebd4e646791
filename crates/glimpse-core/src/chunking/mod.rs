//! Overlapping character-window chunking for long OCR text.
//!
//! The embedding backend accepts bounded inputs, so long extracted text is
//! split into overlapping windows before embedding. Cut points prefer natural
//! boundaries (paragraph breaks, line breaks, sentence ends, clause commas)
//! over raw character offsets so chunks stay coherent.
//!
//! All sizes are in characters, not bytes; OCR text is frequently non-Latin
//! and slicing mid-codepoint would panic.

use crate::config::{CHUNK_OVERLAP, MAX_CHUNK_CHARS};

/// Preferred break tokens, highest priority first.
///
/// The window is cut at the last occurrence of the first token found at or
/// past the window midpoint.
const BREAK_TOKENS: [&str; 4] = ["\n\n", "\n", ". ", ", "];

/// Splits text into overlapping chunks using the production window sizes.
pub fn chunk_text(text: &str) -> Vec<String> {
    chunk_text_with(text, MAX_CHUNK_CHARS, CHUNK_OVERLAP)
}

/// Splits text into overlapping chunks of at most `max_size` characters.
///
/// Behavior:
/// - Empty input yields no chunks; input of `max_size` characters or fewer
///   is returned whole as a single chunk.
/// - Otherwise a window of `max_size` characters slides over the text. Before
///   cutting, the last occurrence of a preferred break token at or past the
///   window midpoint is searched in priority order and the cut moves there,
///   keeping the token with the leading chunk.
/// - The next window starts `overlap` characters before the previous cut, so
///   consecutive chunks share `overlap` characters of context.
/// - Chunks that are empty after trimming are dropped.
pub fn chunk_text_with(text: &str, max_size: usize, overlap: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    // Char-index -> byte-offset table, with a trailing sentinel for the end.
    let byte_of: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total_chars = byte_of.len() - 1;

    if total_chars <= max_size {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < total_chars {
        let mut end = (start + max_size).min(total_chars);

        if start + max_size < total_chars {
            if let Some(break_end) = find_break(text, &byte_of, start, max_size) {
                end = break_end;
            }
        }

        let chunk = text[byte_of[start]..byte_of[end]].trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }

        if end >= total_chars {
            break;
        }

        // Overlap the next window with the tail of this one. The break search
        // never cuts before the midpoint, so this always advances.
        let next = end.saturating_sub(overlap);
        start = if next > start { next } else { end };
    }

    chunks
}

/// Searches backward from the window edge for a preferred break token.
///
/// Only the region from the window midpoint to the window edge is considered,
/// so a break never produces a chunk shorter than `max_size / 2`. Returns the
/// char index just past the break token, or `None` if no token occurs.
fn find_break(text: &str, byte_of: &[usize], start: usize, max_size: usize) -> Option<usize> {
    let lo = start + max_size / 2;
    let hi = start + max_size;
    let window = &text[byte_of[lo]..byte_of[hi]];

    for token in BREAK_TOKENS {
        if let Some(pos) = window.rfind(token) {
            // Break tokens are ASCII, so byte and char lengths coincide;
            // the offset within the window still needs char counting.
            let chars_before = window[..pos].chars().count();
            return Some(lo + chars_before + token.len());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(chunk_text_with("", 100, 10).is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunk_text_with("hello world", 100, 10);
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn test_text_at_exact_limit_single_chunk() {
        let text = "a".repeat(100);
        let chunks = chunk_text_with(&text, 100, 10);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_long_text_produces_multiple_bounded_chunks() {
        let text = "word ".repeat(500); // 2500 chars
        let chunks = chunk_text_with(&text, 1000, 100);

        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(
                chunk.chars().count() <= 1000,
                "chunk exceeds window: {} chars",
                chunk.chars().count()
            );
        }
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        // Uniform text with no break tokens: cuts land on raw boundaries,
        // so each chunk must start with the last `overlap` chars of the
        // previous window.
        let text = "abcdefghij".repeat(30); // 300 chars
        let chunks = chunk_text_with(&text, 100, 20);

        assert!(chunks.len() >= 2);
        for pair in chunks.windows(2) {
            let prev_tail: String = pair[0]
                .chars()
                .skip(pair[0].chars().count().saturating_sub(20))
                .collect();
            assert!(
                pair[1].starts_with(&prev_tail),
                "chunks do not overlap: ...{:?} then {:?}...",
                prev_tail,
                &pair[1][..20.min(pair[1].len())]
            );
        }
    }

    #[test]
    fn test_coverage_has_no_gaps() {
        let text: String = (0..150)
            .map(|i| format!("token{} ", i))
            .collect::<String>();
        let chunks = chunk_text_with(&text, 200, 40);

        // Every token of the original text must appear in some chunk.
        for i in 0..150 {
            let token = format!("token{}", i);
            assert!(
                chunks.iter().any(|c| c.contains(&token)),
                "{} missing from all chunks",
                token
            );
        }
    }

    #[test]
    fn test_prefers_paragraph_break() {
        // Paragraph break sits past the midpoint of the first window; the
        // cut should land right after it rather than at the raw boundary.
        let first = "a".repeat(70);
        let second = "b".repeat(100);
        let text = format!("{}\n\n{}", first, second);
        let chunks = chunk_text_with(&text, 100, 10);

        assert!(chunks.len() >= 2);
        assert_eq!(chunks[0], first);
        assert!(chunks[1].contains('b'));
    }

    #[test]
    fn test_prefers_sentence_break_over_comma() {
        let text = format!("{}. {}, {}", "a".repeat(60), "b".repeat(20), "c".repeat(60));
        let chunks = chunk_text_with(&text, 100, 10);

        // The sentence terminator at char 60 is past the midpoint (50) and
        // outranks the comma break.
        assert_eq!(chunks[0], "a".repeat(60) + ".");
    }

    #[test]
    fn test_break_before_midpoint_is_ignored() {
        // Only break token sits before the midpoint; the cut stays at the
        // raw window boundary.
        let text = format!("{}\n\n{}", "a".repeat(10), "b".repeat(200));
        let chunks = chunk_text_with(&text, 100, 10);

        assert!(chunks[0].chars().count() == 100);
    }

    #[test]
    fn test_multibyte_text_is_not_split_mid_char() {
        // Hangul text: 3 bytes per char. A byte-based window would panic.
        let text = "스크린샷 검색 엔진 ".repeat(60);
        let chunks = chunk_text_with(&text, 100, 20);

        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100);
        }
    }

    #[test]
    fn test_whitespace_only_windows_are_dropped() {
        let text = format!("{}{}{}", "a".repeat(90), " ".repeat(120), "b".repeat(90));
        let chunks = chunk_text_with(&text, 100, 10);

        for chunk in &chunks {
            assert!(!chunk.trim().is_empty());
        }
    }

    #[test]
    fn test_default_sizes_match_config() {
        let text = "x".repeat(1001);
        let chunks = chunk_text(&text);
        assert!(chunks.len() >= 2);

        let short = chunk_text("short text");
        assert_eq!(short.len(), 1);
    }
}
