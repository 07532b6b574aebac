//! Citation records and inline citation labels.

use crate::types::{Citation, SourceChunk};

/// Maximum snippet length for citations, ellipsis included.
pub const MAX_SNIPPET_CHARS: usize = 150;

/// Maximum excerpt length inside an inline citation label, ellipsis excluded.
const LABEL_EXCERPT_CHARS: usize = 100;

/// One citation per chunk, in rank order.
pub fn build_citations(chunks: &[SourceChunk]) -> Vec<Citation> {
    chunks
        .iter()
        .map(|chunk| Citation {
            filename: chunk.filename.clone(),
            page_number: chunk.page_number,
            snippet: truncate_snippet(&chunk.text, MAX_SNIPPET_CHARS),
            relevance_score: chunk.score,
        })
        .collect()
}

impl SourceChunk {
    /// Inline citation: `[Source: file.pdf, Page 3, "leading text..."]`.
    pub fn citation_label(&self) -> String {
        let excerpt: String = self.text.chars().take(LABEL_EXCERPT_CHARS).collect();
        let ellipsis = if self.text.chars().count() > LABEL_EXCERPT_CHARS {
            "..."
        } else {
            ""
        };
        format!(
            "[Source: {}, Page {}, \"{}{}\"]",
            self.filename, self.page_number, excerpt, ellipsis
        )
    }
}

/// Truncate to at most `max_chars` characters, ending in `...` when cut.
fn truncate_snippet(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str, score: f32) -> SourceChunk {
        SourceChunk {
            text: text.to_string(),
            filename: "manual.pdf".to_string(),
            page_number: 7,
            chunk_index: 2,
            score,
        }
    }

    #[test]
    fn test_citations_keep_rank_order_and_scores() {
        let citations = build_citations(&[chunk("first", 0.9), chunk("second", 0.5)]);
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].snippet, "first");
        assert_eq!(citations[0].relevance_score, 0.9);
        assert_eq!(citations[1].snippet, "second");
        assert_eq!(citations[1].page_number, 7);
    }

    #[test]
    fn test_long_snippet_is_truncated_to_limit() {
        let text = "word ".repeat(100);
        let citation = &build_citations(&[chunk(&text, 0.4)])[0];
        assert_eq!(citation.snippet.chars().count(), MAX_SNIPPET_CHARS);
        assert!(citation.snippet.ends_with("..."));
    }

    #[test]
    fn test_snippet_at_limit_is_untouched() {
        let text = "a".repeat(MAX_SNIPPET_CHARS);
        assert_eq!(build_citations(&[chunk(&text, 0.4)])[0].snippet, text);
    }

    #[test]
    fn test_truncation_respects_multibyte_chars() {
        let text = "ü".repeat(200);
        let snippet = truncate_snippet(&text, MAX_SNIPPET_CHARS);
        assert_eq!(snippet.chars().count(), MAX_SNIPPET_CHARS);
    }

    #[test]
    fn test_citation_label() {
        assert_eq!(
            chunk("Short text", 0.8).citation_label(),
            "[Source: manual.pdf, Page 7, \"Short text\"]"
        );

        let label = chunk(&"x".repeat(120), 0.8).citation_label();
        assert!(label.ends_with(&format!("{}...\"]", "x".repeat(100))));
    }

    #[test]
    fn test_no_chunks_no_citations() {
        assert!(build_citations(&[]).is_empty());
    }
}
