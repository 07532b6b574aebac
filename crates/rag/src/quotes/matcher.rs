//! Exact and fuzzy lookup of quotes in retrieved source text.
//!
//! Similarity is the Ratcliff/Obershelp ratio `2 * M / (len(a) + len(b))`,
//! where `M` counts characters in the matching blocks found by repeatedly
//! taking the longest common substring and recursing on both sides of it.
//! No characters are treated as junk.
//!
//! Fuzzy search slides a window as long as the quote across the source, so
//! cost grows with `quote_len * source_len`. That is fine for chunks of a
//! few hundred characters; do not call this on whole documents.

use crate::types::SourceChunk;
use std::collections::HashMap;

/// Default acceptance bound for fuzzy matches.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.85;

/// Lowercase, collapse whitespace runs to one space, trim.
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// First source containing `quote`, exactly or fuzzily, in the order given.
///
/// Both sides are normalized first. A normalized substring hit short-circuits
/// the source; otherwise every window of the quote's length is scored and the
/// source matches as soon as one window reaches `threshold`. No attempt is
/// made to find the best source overall.
pub fn find_quote_in_source<'a>(
    quote: &str,
    sources: &'a [SourceChunk],
    threshold: f64,
) -> Option<&'a SourceChunk> {
    let normalized_quote = normalize_text(quote);
    let quote_chars: Vec<char> = normalized_quote.chars().collect();

    sources.iter().find(|source| {
        let normalized_source = normalize_text(&source.text);

        if normalized_source.contains(&normalized_quote) {
            tracing::trace!("Exact match in {} p{}", source.filename, source.page_number);
            return true;
        }

        let source_chars: Vec<char> = normalized_source.chars().collect();
        best_window_reaches(&quote_chars, &source_chars, threshold)
    })
}

/// Whether some window of `source` of length `quote.len()` scores `>= threshold`.
///
/// Sources shorter than the quote have no window and never match fuzzily.
fn best_window_reaches(quote: &[char], source: &[char], threshold: f64) -> bool {
    let n = quote.len();
    if n == 0 || source.len() < n {
        return false;
    }

    let mut bound = WindowBound::new(quote, &source[..n]);

    for start in 0..=(source.len() - n) {
        if start > 0 {
            bound.slide(source[start - 1], source[start + n - 1]);
        }

        // Shared characters cap the number of matched characters, so skip
        // windows that cannot reach the threshold.
        if bound.upper_ratio(n) < threshold {
            continue;
        }

        let window = &source[start..start + n];
        if similarity_ratio(quote, window) >= threshold {
            tracing::trace!("Fuzzy match at window offset {}", start);
            return true;
        }
    }

    false
}

/// Sequence-matching similarity of two character sequences, in `[0, 1]`.
///
/// Two empty sequences are identical (1.0).
pub fn similarity_ratio(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_characters(a, b) as f64 / total as f64
}

/// Convenience wrapper over [`similarity_ratio`] for string slices.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    similarity_ratio(&a, &b)
}

/// Total size of the matching blocks between `a` and `b`.
fn matching_characters(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];

    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, size) = longest_match(a, b, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        matched += size;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            pending.push((i + size, ahi, j + size, bhi));
        }
    }

    matched
}

/// Longest common block of `a[alo..ahi]` and `b[blo..bhi]`.
///
/// Returns `(i, j, size)`; ties go to the block starting earliest in `a`,
/// then earliest in `b`.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);

    // run[j + 1 - blo] = length of the common run ending at a[i - 1], b[j].
    let width = bhi - blo + 1;
    let mut prev = vec![0usize; width];
    let mut curr = vec![0usize; width];

    for i in alo..ahi {
        for j in blo..bhi {
            let k = j - blo + 1;
            if a[i] == b[j] {
                let run = prev[k - 1] + 1;
                curr[k] = run;
                if run > best_size {
                    best_i = i + 1 - run;
                    best_j = j + 1 - run;
                    best_size = run;
                }
            } else {
                curr[k] = 0;
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    (best_i, best_j, best_size)
}

/// Multiset intersection between the quote and the current window, maintained
/// incrementally as the window slides.
struct WindowBound {
    quote_counts: HashMap<char, usize>,
    window_counts: HashMap<char, usize>,
    shared: usize,
}

impl WindowBound {
    fn new(quote: &[char], first_window: &[char]) -> Self {
        let mut quote_counts = HashMap::new();
        for &c in quote {
            *quote_counts.entry(c).or_insert(0) += 1;
        }

        let mut bound = Self {
            quote_counts,
            window_counts: HashMap::new(),
            shared: 0,
        };
        for &c in first_window {
            bound.add(c);
        }
        bound
    }

    fn add(&mut self, c: char) {
        let count = self.window_counts.entry(c).or_insert(0);
        *count += 1;
        if *count <= self.quote_counts.get(&c).copied().unwrap_or(0) {
            self.shared += 1;
        }
    }

    fn remove(&mut self, c: char) {
        if let Some(count) = self.window_counts.get_mut(&c) {
            if *count <= self.quote_counts.get(&c).copied().unwrap_or(0) {
                self.shared -= 1;
            }
            *count -= 1;
        }
    }

    fn slide(&mut self, outgoing: char, incoming: char) {
        self.remove(outgoing);
        self.add(incoming);
    }

    /// Upper bound of the ratio for a window the same length as the quote.
    fn upper_ratio(&self, len: usize) -> f64 {
        self.shared as f64 / len as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(filename: &str, page: u32, text: &str) -> SourceChunk {
        SourceChunk {
            text: text.to_string(),
            filename: filename.to_string(),
            page_number: page,
            chunk_index: 0,
            score: 0.9,
        }
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(
            normalize_text("  The  Capital\n\tof FRANCE  "),
            "the capital of france"
        );
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn test_similarity_known_values() {
        assert_eq!(similarity("abcd", "abcd"), 1.0);
        assert_eq!(similarity("abcd", "wxyz"), 0.0);
        assert_eq!(similarity("", ""), 1.0);
        // One block "abc" of three characters: 2 * 3 / 8.
        assert!((similarity("abcd", "abce") - 0.75).abs() < 1e-9);
        // Blocks "a" and "cd" once "b" is dropped: 2 * 3 / 7.
        assert!((similarity("abcd", "acd") - 6.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_similarity_is_bounded() {
        let r = similarity("the quick brown fox", "the quick brown cat");
        assert!(r > 0.0 && r < 1.0);
    }

    #[test]
    fn test_exact_match_after_normalization() {
        let sources = vec![source("a.pdf", 1, "The capital of France is Paris.")];
        let hit = find_quote_in_source("the   CAPITAL of france", &sources, 0.85);
        assert_eq!(hit.map(|s| s.filename.as_str()), Some("a.pdf"));
    }

    #[test]
    fn test_fuzzy_match_tolerates_small_differences() {
        let sources = vec![source(
            "report.pdf",
            3,
            "Revenue increased by twelve percent in the third quarter of the year.",
        )];
        // One word slightly misspelled.
        let hit = find_quote_in_source(
            "Revenue increased by twelve precent in the third quarter",
            &sources,
            0.85,
        );
        assert!(hit.is_some());
    }

    #[test]
    fn test_paraphrase_does_not_match() {
        let sources = vec![source("a.pdf", 1, "The capital of France is Paris.")];
        let hit = find_quote_in_source("Paris is the capital city of France", &sources, 0.85);
        assert!(hit.is_none());
    }

    #[test]
    fn test_first_qualifying_source_wins() {
        let sources = vec![
            source("first.pdf", 1, "Nothing relevant here at all."),
            source("second.pdf", 2, "The capital of France is Paris."),
            source("third.pdf", 5, "The capital of France is Paris."),
        ];
        let hit = find_quote_in_source("capital of France is Paris", &sources, 0.85).unwrap();
        assert_eq!(hit.filename, "second.pdf");
        assert_eq!(hit.page_number, 2);
    }

    #[test]
    fn test_quote_longer_than_source_cannot_match_fuzzily() {
        let sources = vec![source("a.pdf", 1, "short text")];
        assert!(find_quote_in_source("short text plus extra words", &sources, 0.5).is_none());
    }

    #[test]
    fn test_ratio_equal_to_threshold_matches() {
        // abcd vs abce: 2 * 3 / 8 = 0.75 exactly.
        let sources = vec![source("a.pdf", 3, "abce")];
        let hit = find_quote_in_source("abcd", &sources, 0.75);
        assert_eq!(hit.map(|s| s.page_number), Some(3));
    }

    #[test]
    fn test_ratio_just_below_threshold_does_not_match() {
        let sources = vec![source("a.pdf", 3, "abce")];
        assert!(find_quote_in_source("abcd", &sources, 0.76).is_none());
    }

    #[test]
    fn test_no_sources_returns_none() {
        assert!(find_quote_in_source("anything", &[], 0.85).is_none());
    }

    #[test]
    fn test_window_bound_never_below_true_ratio() {
        let quote: Vec<char> = "abcabd".chars().collect();
        let text: Vec<char> = "xxabdabcaxbd".chars().collect();
        let n = quote.len();
        let mut bound = WindowBound::new(&quote, &text[..n]);
        for start in 0..=(text.len() - n) {
            if start > 0 {
                bound.slide(text[start - 1], text[start + n - 1]);
            }
            let exact = similarity_ratio(&quote, &text[start..start + n]);
            assert!(bound.upper_ratio(n) + 1e-12 >= exact);
        }
    }
}
