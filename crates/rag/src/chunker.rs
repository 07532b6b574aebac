//! Page text chunking with configurable size and overlap.
//!
//! Sizes and offsets are counted in characters, never bytes, so multi-byte
//! text is never cut inside a code point.

use docqa_core::{AppResult, ChunkSettings};
use std::ops::Range;

/// How far back from a window's nominal end to look for a sentence or line break.
const BOUNDARY_LOOKBACK: usize = 100;

/// Split `text` into overlapping chunks, preferring to cut after `.` or `\n`.
///
/// Each chunk is trimmed; empty chunks are dropped. Text no longer than
/// `chunk_size` characters yields a single trimmed chunk.
///
/// # Errors
/// `AppError::Config` if `chunk_size == 0` or `overlap >= chunk_size`.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> AppResult<Vec<String>> {
    let chunks: Vec<String> = chunk_spans(text, chunk_size, overlap)?
        .into_iter()
        .map(|span| text[span].trim().to_string())
        .filter(|chunk| !chunk.is_empty())
        .collect();

    tracing::debug!(
        "Chunked text into {} chunks (size: {}, overlap: {})",
        chunks.len(),
        chunk_size,
        overlap
    );

    Ok(chunks)
}

/// Byte ranges of the untrimmed chunk windows, in order.
///
/// Consecutive windows overlap, so together they cover every character of
/// `text`.
pub fn chunk_spans(text: &str, chunk_size: usize, overlap: usize) -> AppResult<Vec<Range<usize>>> {
    ChunkSettings {
        chunk_size,
        overlap,
    }
    .validate()?;

    if text.is_empty() {
        return Ok(Vec::new());
    }

    // offsets[i] is the byte offset of character i; the final entry is text.len().
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_len = offsets.len() - 1;

    if char_len <= chunk_size {
        return Ok(vec![0..text.len()]);
    }

    let mut spans = Vec::new();
    let mut start = 0usize;

    while start < char_len {
        let nominal_end = start + chunk_size;
        if nominal_end >= char_len {
            spans.push(offsets[start]..text.len());
            break;
        }

        let end = match last_boundary(text, &offsets, start + overlap.max(1), nominal_end) {
            Some(boundary) => boundary + 1,
            None => nominal_end,
        };
        spans.push(offsets[start]..offsets[end]);

        // `end - overlap > start` holds for both cut kinds, so the cursor always advances.
        start = end - overlap;
    }

    Ok(spans)
}

/// Character index of the last `.` or `\n` in the lookback window before `end`,
/// no earlier than `min_index`.
///
/// Callers pass `start + overlap` (at least `start + 1`) so that cutting after
/// the boundary still leaves the next window starting past `start`.
fn last_boundary(text: &str, offsets: &[usize], min_index: usize, end: usize) -> Option<usize> {
    let lo = end.saturating_sub(BOUNDARY_LOOKBACK).max(min_index);
    if lo >= end {
        return None;
    }

    let window = &text[offsets[lo]..offsets[end]];
    window
        .chars()
        .rev()
        .position(|c| c == '.' || c == '\n')
        .map(|from_back| end - 1 - from_back)
}

/// Chunk with settings taken from configuration.
pub fn chunk_with(text: &str, settings: &ChunkSettings) -> AppResult<Vec<String>> {
    chunk_text(text, settings.chunk_size, settings.overlap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_core::AppError;
    use proptest::prelude::*;

    #[test]
    fn test_chunk_text_empty() {
        assert!(chunk_text("", 100, 10).unwrap().is_empty());
    }

    #[test]
    fn test_short_text_is_single_trimmed_chunk() {
        let chunks = chunk_text("  The capital of France is Paris.  \n", 500, 50).unwrap();
        assert_eq!(chunks, vec!["The capital of France is Paris.".to_string()]);
    }

    #[test]
    fn test_whitespace_only_text_yields_nothing() {
        assert!(chunk_text("   \n\t ", 500, 50).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_overlap_not_below_chunk_size() {
        let err = chunk_text("some text", 100, 100).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert!(chunk_text("some text", 100, 150).is_err());
        assert!(chunk_text("some text", 0, 0).is_err());
    }

    #[test]
    fn test_chunk_text_no_overlap() {
        let text = "a".repeat(300);
        let chunks = chunk_text(&text, 100, 0).unwrap();
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() == 100));
    }

    #[test]
    fn test_breaks_after_sentence_terminator() {
        // 60 chars of sentence, then filler well past the window end.
        let sentence = format!("{}.", "x".repeat(59));
        let text = format!("{}{}", sentence, "y".repeat(200));
        let chunks = chunk_text(&text, 100, 10).unwrap();

        assert_eq!(chunks[0], sentence);
        // Next window starts `overlap` characters before the cut.
        assert!(chunks[1].starts_with(&format!("{}.", "x".repeat(9))));
    }

    #[test]
    fn test_breaks_after_newline() {
        let text = format!("{}\n{}", "a".repeat(80), "b".repeat(200));
        let spans = chunk_spans(&text, 100, 0).unwrap();
        assert_eq!(spans[0], 0..81);
    }

    #[test]
    fn test_boundary_outside_lookback_is_ignored() {
        // The only period sits at index 10, more than 100 chars before the window end.
        let text = format!("{}.{}", "a".repeat(10), "b".repeat(400));
        let spans = chunk_spans(&text, 200, 0).unwrap();
        assert_eq!(spans[0], 0..200);
    }

    #[test]
    fn test_multibyte_text_is_split_on_char_boundaries() {
        let text = "é".repeat(250);
        let chunks = chunk_text(&text, 100, 10).unwrap();
        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 100));
    }

    #[test]
    fn test_small_chunk_size_with_early_boundary_terminates() {
        let text = "a.".repeat(200);
        let spans = chunk_spans(&text, 20, 15).unwrap();
        assert!(!spans.is_empty());
        assert_eq!(spans.last().unwrap().end, text.len());
    }

    #[test]
    fn test_chunk_with_settings() {
        let settings = ChunkSettings {
            chunk_size: 10,
            overlap: 10,
        };
        assert!(chunk_with("hello world", &settings).is_err());
    }

    proptest! {
        #[test]
        fn proptest_short_text_is_one_trimmed_chunk(text in "[a-z .\\n]{1,200}") {
            let chunks = chunk_text(&text, 200, 20).unwrap();
            let trimmed = text.trim();
            if trimmed.is_empty() {
                prop_assert!(chunks.is_empty());
            } else {
                prop_assert_eq!(chunks, vec![trimmed.to_string()]);
            }
        }

        #[test]
        fn proptest_spans_cover_text_without_gaps(
            text in "[a-zA-Z .\\n]{0,2000}",
            chunk_size in 1usize..400,
            overlap_seed in 0usize..400,
        ) {
            let overlap = overlap_seed % chunk_size;
            let spans = chunk_spans(&text, chunk_size, overlap).unwrap();

            if text.is_empty() {
                prop_assert!(spans.is_empty());
            } else {
                prop_assert_eq!(spans[0].start, 0);
                prop_assert_eq!(spans.last().unwrap().end, text.len());
                for pair in spans.windows(2) {
                    // Each window starts inside or at the end of the previous one and moves forward.
                    prop_assert!(pair[1].start <= pair[0].end);
                    prop_assert!(pair[1].start > pair[0].start);
                }
            }
        }
    }
}
