//! Answer-level quote verification.

use super::extract::extract_quote_spans;
use super::matcher::find_quote_in_source;
use crate::types::{SourceChunk, VerificationRecord, VerificationReport};

/// Check every quoted span of `answer` against `sources`.
///
/// Each occurrence is verified on its own, duplicates included. Unverified
/// quotes keep their byte span in the answer so they can be spliced out later.
pub fn verify_quotes_in_response(
    answer: &str,
    sources: &[SourceChunk],
    threshold: f64,
) -> VerificationReport {
    let quotes = extract_quote_spans(answer);
    if quotes.is_empty() {
        tracing::debug!("No quotes found in answer");
        return VerificationReport::no_quotes();
    }

    let mut verified = Vec::new();
    let mut unverified = Vec::new();
    let mut unverified_spans = Vec::new();

    for quote in quotes {
        match find_quote_in_source(&quote.text, sources, threshold) {
            Some(source) => {
                tracing::debug!(
                    "Verified quote ({} chars) in {} page {}",
                    quote.text.chars().count(),
                    source.filename,
                    source.page_number
                );
                verified.push(VerificationRecord {
                    quote: quote.text,
                    matched: true,
                    source_file: Some(source.filename.clone()),
                    source_page: Some(source.page_number),
                });
            }
            None => {
                tracing::debug!("Could not verify quote: {:?}", quote.text);
                unverified_spans.push(quote.span);
                unverified.push(quote.text);
            }
        }
    }

    let report = VerificationReport::from_outcomes(verified, unverified, unverified_spans);
    tracing::debug!(
        "Quote verification: {} ({} verified, {} unverified)",
        report.status,
        report.verified.len(),
        report.unverified.len()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VerificationStatus;

    fn sources() -> Vec<SourceChunk> {
        vec![SourceChunk {
            text: "The capital of France is Paris.".to_string(),
            filename: "geo.pdf".to_string(),
            page_number: 4,
            chunk_index: 0,
            score: 0.8,
        }]
    }

    #[test]
    fn test_no_quotes() {
        let report = verify_quotes_in_response("Paris is the capital.", &sources(), 0.85);
        assert_eq!(report.status, VerificationStatus::NoQuotes);
        assert!(report.all_verified);
        assert!(report.verified.is_empty() && report.unverified.is_empty());
    }

    #[test]
    fn test_exact_quote_is_verified_with_location() {
        let answer = r#"The document states "The capital of France is Paris.""#;
        let report = verify_quotes_in_response(answer, &sources(), 0.85);

        assert_eq!(report.status, VerificationStatus::Verified);
        assert!(report.all_verified);
        assert_eq!(report.verified.len(), 1);
        assert_eq!(report.verified[0].source_file.as_deref(), Some("geo.pdf"));
        assert_eq!(report.verified[0].source_page, Some(4));
        assert!(report.unverified_spans.is_empty());
    }

    #[test]
    fn test_paraphrase_is_unverified() {
        let answer = r#"It says "Paris is the capital city of France" [Source: geo.pdf, Page 4]"#;
        let report = verify_quotes_in_response(answer, &sources(), 0.85);

        assert_eq!(report.status, VerificationStatus::Unverified);
        assert!(!report.all_verified);
        assert_eq!(report.unverified, vec!["Paris is the capital city of France".to_string()]);
        assert_eq!(
            &answer[report.unverified_spans[0].clone()],
            r#""Paris is the capital city of France""#
        );
    }

    #[test]
    fn test_mixed_outcome_is_partial() {
        let answer = r#""capital of France is Paris" but also "Lyon is the capital""#;
        let report = verify_quotes_in_response(answer, &sources(), 0.85);
        assert_eq!(report.status, VerificationStatus::Partial);
        assert_eq!(report.verified.len(), 1);
        assert_eq!(report.unverified.len(), 1);
    }

    #[test]
    fn test_duplicates_are_verified_independently() {
        let answer = r#""Paris" and again "Paris""#;
        let report = verify_quotes_in_response(answer, &sources(), 0.85);
        assert_eq!(report.verified.len(), 2);
    }

    #[test]
    fn test_contractions_around_a_verified_quote_leave_it_intact() {
        let sources = vec![SourceChunk {
            text: "Invoices are due within thirty days of receipt.".to_string(),
            filename: "billing.pdf".to_string(),
            page_number: 2,
            chunk_index: 0,
            score: 0.7,
        }];
        let answer = r#"The manual's rule "Invoices are due within thirty days" isn't flexible."#;

        let report = verify_quotes_in_response(answer, &sources, 0.85);

        assert_eq!(report.status, VerificationStatus::Verified);
        assert!(report.all_verified);
        assert!(report.unverified.is_empty());
        assert_eq!(crate::quotes::sanitize_spans(answer, &report.unverified_spans), answer);
    }

    #[test]
    fn test_quotes_without_sources_are_unverified() {
        let report = verify_quotes_in_response(r#"He said "hello""#, &[], 0.85);
        assert_eq!(report.status, VerificationStatus::Unverified);
    }
}
