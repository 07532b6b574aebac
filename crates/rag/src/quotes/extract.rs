//! Quoted-span extraction from generated answers.

use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

/// `"..."`, any non-empty content without a double quote.
static DOUBLE_QUOTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""([^"]+)""#).expect("static regex compiles"));

/// Shortest content a single-quoted span may have.
const MIN_SINGLE_QUOTE_CHARS: usize = 10;

/// Delimiter a quote was found between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteDelimiter {
    Double,
    Single,
}

impl QuoteDelimiter {
    pub fn as_char(&self) -> char {
        match self {
            QuoteDelimiter::Double => '"',
            QuoteDelimiter::Single => '\'',
        }
    }
}

/// A quoted span located in an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    /// Content between the delimiters, untouched
    pub text: String,

    /// Byte range of the span in the answer, delimiters included
    pub span: Range<usize>,

    pub delimiter: QuoteDelimiter,
}

/// Extract quotes with their positions.
///
/// Order: every double-quoted span in order of appearance, then every
/// single-quoted span in order of appearance. Duplicates are kept. Spans
/// whose content is only whitespace are skipped.
///
/// An apostrophe between two letters or digits (`manual's`, `isn't`) never
/// opens or closes a single-quoted span.
pub fn extract_quote_spans(text: &str) -> Vec<Quote> {
    let mut quotes: Vec<Quote> = scan_double(text).collect();
    quotes.extend(scan_single(text));
    quotes
}

/// Extract the text of every quoted span, in the order of [`extract_quote_spans`].
pub fn extract_quotes(text: &str) -> Vec<String> {
    extract_quote_spans(text)
        .into_iter()
        .map(|quote| quote.text)
        .collect()
}

fn scan_double(text: &str) -> impl Iterator<Item = Quote> + '_ {
    DOUBLE_QUOTED.captures_iter(text).filter_map(|caps| {
        let whole = caps.get(0)?;
        let inner = caps.get(1)?;
        if inner.as_str().trim().is_empty() {
            return None;
        }
        Some(Quote {
            text: inner.as_str().to_string(),
            span: whole.range(),
            delimiter: QuoteDelimiter::Double,
        })
    })
}

/// Pair up apostrophes that can act as delimiters, leftmost first.
///
/// A pair whose content is too short is not a quote; its closing apostrophe
/// may still open the next one.
fn scan_single(text: &str) -> Vec<Quote> {
    let delimiters: Vec<usize> = text
        .char_indices()
        .filter(|&(i, c)| c == '\'' && !is_word_internal(text, i))
        .map(|(i, _)| i)
        .collect();

    let mut quotes = Vec::new();
    let mut k = 0;
    while k + 1 < delimiters.len() {
        let (open, close) = (delimiters[k], delimiters[k + 1]);
        let inner = &text[open + 1..close];
        if inner.chars().count() < MIN_SINGLE_QUOTE_CHARS {
            k += 1;
            continue;
        }
        if !inner.trim().is_empty() {
            quotes.push(Quote {
                text: inner.to_string(),
                span: open..close + 1,
                delimiter: QuoteDelimiter::Single,
            });
        }
        k += 2;
    }
    quotes
}

/// Whether the apostrophe at byte `i` sits inside a word.
fn is_word_internal(text: &str, i: usize) -> bool {
    let before = text[..i].chars().next_back();
    let after = text[i + 1..].chars().next();
    matches!(
        (before, after),
        (Some(b), Some(a)) if b.is_alphanumeric() && a.is_alphanumeric()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_extracts_double_quoted_span() {
        let quotes = extract_quotes(r#"The document states "The capital of France is Paris.""#);
        assert_eq!(quotes, vec!["The capital of France is Paris.".to_string()]);
    }

    #[test]
    fn test_short_single_quotes_are_ignored() {
        assert!(extract_quotes("I don't know; 'short' wins").is_empty());
    }

    #[test]
    fn test_long_single_quotes_are_extracted() {
        let quotes = extract_quotes("The report says 'revenue grew by ten percent' overall.");
        assert_eq!(quotes, vec!["revenue grew by ten percent".to_string()]);
    }

    #[test]
    fn test_apostrophes_inside_words_do_not_delimit() {
        let text = r#"The manual's rule "Invoices are due within thirty days" isn't flexible."#;
        let quotes = extract_quote_spans(text);
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].text, "Invoices are due within thirty days");
        assert_eq!(quotes[0].delimiter, QuoteDelimiter::Double);
    }

    #[test]
    fn test_single_quote_may_contain_a_possessive() {
        let quotes = extract_quotes("It reads 'the auditor's report is final' here.");
        assert_eq!(quotes, vec!["the auditor's report is final".to_string()]);
    }

    #[test]
    fn test_double_quotes_come_before_single_quotes() {
        let text = r#"First 'a single quoted passage' then "a double" and "another""#;
        let quotes = extract_quotes(text);
        assert_eq!(
            quotes,
            vec![
                "a double".to_string(),
                "another".to_string(),
                "a single quoted passage".to_string(),
            ]
        );
    }

    #[test]
    fn test_duplicates_are_kept() {
        let quotes = extract_quotes(r#""same" and again "same""#);
        assert_eq!(quotes, vec!["same".to_string(), "same".to_string()]);
    }

    #[test]
    fn test_whitespace_only_content_is_skipped() {
        assert!(extract_quotes(r#"empty " " quote"#).is_empty());
    }

    #[test]
    fn test_unterminated_quote_is_ignored() {
        assert!(extract_quotes(r#"dangling "quote without end"#).is_empty());
    }

    #[test]
    fn test_spans_include_delimiters() {
        let text = r#"He said "hello there" today."#;
        let quotes = extract_quote_spans(text);
        assert_eq!(quotes.len(), 1);
        assert_eq!(&text[quotes[0].span.clone()], r#""hello there""#);
        assert_eq!(quotes[0].delimiter, QuoteDelimiter::Double);
    }

    #[test]
    fn test_multiline_content_is_one_quote() {
        let quotes = extract_quotes("\"line one\nline two\"");
        assert_eq!(quotes, vec!["line one\nline two".to_string()]);
    }

    proptest! {
        #[test]
        fn proptest_double_quoted_content_is_always_extracted(value in "[A-Za-z0-9 ,.]{0,40}[A-Za-z0-9]") {
            let text = format!("Answer: \"{value}\" [Source: a.pdf, Page 1]");
            prop_assert_eq!(extract_quotes(&text), vec![value]);
        }

        #[test]
        fn proptest_short_single_quotes_never_extracted(value in "[A-Za-z ]{1,9}") {
            let text = format!("Answer: '{value}' end");
            prop_assert!(extract_quotes(&text).is_empty());
        }
    }
}
