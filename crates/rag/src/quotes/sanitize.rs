//! Removal of unverified quotes from answers.

use std::ops::Range;

/// Marker left where an unverified quote was removed.
pub const UNVERIFIED_SENTINEL: &str = "[UNVERIFIED QUOTE REMOVED]";

/// Appended to an answer after at least one quote was removed.
pub const UNVERIFIED_DISCLAIMER: &str =
    "\n\n⚠️ Note: Some quoted text could not be verified against sources and was removed.";

/// Replace each byte span of `answer` with [`UNVERIFIED_SENTINEL`].
///
/// Spans may arrive in any order. Overlapping spans are merged first so each
/// removed region gets exactly one marker; spans outside the answer or not on
/// character boundaries are ignored. Text outside the spans is kept verbatim.
pub fn sanitize_spans(answer: &str, spans: &[Range<usize>]) -> String {
    let merged = merge_spans(answer, spans);
    if merged.is_empty() {
        return answer.to_string();
    }

    let mut out = String::with_capacity(answer.len());
    let mut cursor = 0;
    for span in merged {
        out.push_str(&answer[cursor..span.start]);
        out.push_str(UNVERIFIED_SENTINEL);
        cursor = span.end;
    }
    out.push_str(&answer[cursor..]);
    out
}

/// Replace every literal `"quote"` and `'quote'` occurrence with the sentinel.
///
/// Matching is exact: a quote whose casing or spacing differs in the answer
/// is left in place. Prefer [`sanitize_spans`] with the spans recorded during
/// verification.
pub fn remove_unverified_quotes(answer: &str, unverified_quotes: &[String]) -> String {
    let spans: Vec<Range<usize>> = unverified_quotes
        .iter()
        .flat_map(|quote| {
            let double = format!("\"{}\"", quote);
            let single = format!("'{}'", quote);
            let mut found: Vec<Range<usize>> = answer
                .match_indices(&double)
                .map(|(at, m)| at..at + m.len())
                .collect();
            found.extend(
                answer
                    .match_indices(&single)
                    .map(|(at, m)| at..at + m.len()),
            );
            found
        })
        .collect();

    sanitize_spans(answer, &spans)
}

fn merge_spans(answer: &str, spans: &[Range<usize>]) -> Vec<Range<usize>> {
    let mut valid: Vec<Range<usize>> = spans
        .iter()
        .filter(|span| {
            span.start < span.end
                && span.end <= answer.len()
                && answer.is_char_boundary(span.start)
                && answer.is_char_boundary(span.end)
        })
        .cloned()
        .collect();
    valid.sort_by_key(|span| (span.start, span.end));

    let mut merged: Vec<Range<usize>> = Vec::with_capacity(valid.len());
    for span in valid {
        match merged.last_mut() {
            Some(last) if span.start < last.end => last.end = last.end.max(span.end),
            _ => merged.push(span),
        }
    }
    merged
}
