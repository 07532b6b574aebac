//! Data model shared by retrieval, verification and the chat orchestrator.
//!
//! Everything here is created per chat invocation and dropped once the
//! response has been returned.

use docqa_core::ChatSettings;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A retrieved chunk of document text with its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceChunk {
    /// Chunk text as stored at ingest time
    pub text: String,

    /// Source document name
    pub filename: String,

    /// 1-based page the chunk was cut from
    pub page_number: u32,

    /// 0-based position of the chunk within its page
    pub chunk_index: u32,

    /// Similarity to the query (1.0 = identical, may be negative)
    pub score: f32,
}

/// Structured pointer from an answer back to a supporting chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub filename: String,
    pub page_number: u32,
    /// Leading excerpt of the chunk, at most 150 characters
    pub snippet: String,
    pub relevance_score: f32,
}

/// Outcome of quote verification for a whole answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// The answer contained no quoted spans
    NoQuotes,
    /// Every quote was found in a source
    Verified,
    /// Some quotes were found, some were not
    Partial,
    /// No quote could be found
    Unverified,
    /// Retrieval produced nothing to verify against; the request was refused
    NoSources,
    /// Verification was disabled for this request
    Skipped,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoQuotes => "no_quotes",
            Self::Verified => "verified",
            Self::Partial => "partial",
            Self::Unverified => "unverified",
            Self::NoSources => "no_sources",
            Self::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verification result for one extracted quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub quote: String,
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_page: Option<u32>,
}

/// Verification report attached to every chat response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub status: VerificationStatus,

    /// Quotes that matched a source, in extraction order
    pub verified: Vec<VerificationRecord>,

    /// Raw text of quotes that matched no source, in extraction order
    pub unverified: Vec<String>,

    pub all_verified: bool,

    /// Byte spans (delimiters included) of unverified quotes in the draft answer
    #[serde(skip)]
    pub unverified_spans: Vec<Range<usize>>,
}

impl VerificationReport {
    fn empty(status: VerificationStatus, all_verified: bool) -> Self {
        Self {
            status,
            verified: Vec::new(),
            unverified: Vec::new(),
            all_verified,
            unverified_spans: Vec::new(),
        }
    }

    pub fn no_quotes() -> Self {
        Self::empty(VerificationStatus::NoQuotes, true)
    }

    /// Report for a refused request. Nothing was checked, so nothing is verified.
    pub fn no_sources() -> Self {
        Self::empty(VerificationStatus::NoSources, false)
    }

    /// Report for a request with verification turned off.
    pub fn skipped() -> Self {
        Self::empty(VerificationStatus::Skipped, false)
    }

    /// Build a report from per-quote outcomes. At least one quote must be present.
    pub fn from_outcomes(
        verified: Vec<VerificationRecord>,
        unverified: Vec<String>,
        unverified_spans: Vec<Range<usize>>,
    ) -> Self {
        let status = if unverified.is_empty() {
            VerificationStatus::Verified
        } else if verified.is_empty() {
            VerificationStatus::Unverified
        } else {
            VerificationStatus::Partial
        };

        Self {
            status,
            all_verified: unverified.is_empty(),
            verified,
            unverified,
            unverified_spans,
        }
    }
}

/// Options for a single chat invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatOptions {
    /// Number of chunks requested from retrieval
    pub n_sources: usize,

    /// Minimum score a chunk needs to be used as grounding
    pub min_relevance: f32,

    /// Verify quoted spans in the answer
    pub verify_quotes: bool,

    /// Restrict retrieval to a single document
    pub filename_filter: Option<String>,

    /// Fuzzy-match acceptance bound
    pub threshold: f64,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self::from(&ChatSettings::default())
    }
}

impl From<&ChatSettings> for ChatOptions {
    fn from(settings: &ChatSettings) -> Self {
        Self {
            n_sources: settings.n_sources,
            min_relevance: settings.min_relevance,
            verify_quotes: settings.verify_quotes,
            filename_filter: None,
            threshold: settings.threshold,
        }
    }
}

/// Final answer returned to the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    pub citations: Vec<Citation>,
    /// Chunks that passed the relevance gate, in rank order
    pub sources_used: Vec<SourceChunk>,
    pub refused: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refusal_reason: Option<String>,
    pub quote_verification: VerificationReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(quote: &str) -> VerificationRecord {
        VerificationRecord {
            quote: quote.to_string(),
            matched: true,
            source_file: Some("a.pdf".to_string()),
            source_page: Some(1),
        }
    }

    #[test]
    fn test_status_from_outcomes() {
        let all = VerificationReport::from_outcomes(vec![record("x")], vec![], vec![]);
        assert_eq!(all.status, VerificationStatus::Verified);
        assert!(all.all_verified);

        let none = VerificationReport::from_outcomes(vec![], vec!["y".into()], vec![0..3]);
        assert_eq!(none.status, VerificationStatus::Unverified);
        assert!(!none.all_verified);

        let mixed = VerificationReport::from_outcomes(vec![record("x")], vec!["y".into()], vec![]);
        assert_eq!(mixed.status, VerificationStatus::Partial);
        assert!(!mixed.all_verified);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&VerificationReport::no_quotes()).unwrap();
        assert!(json.contains("\"status\":\"no_quotes\""));
        assert!(json.contains("\"all_verified\":true"));
        assert!(!json.contains("unverified_spans"));
    }

    #[test]
    fn test_chat_options_defaults() {
        let options = ChatOptions::default();
        assert_eq!(options.n_sources, 5);
        assert_eq!(options.min_relevance, 0.3);
        assert!(options.verify_quotes);
        assert_eq!(options.threshold, 0.85);
        assert!(options.filename_filter.is_none());
    }
}
