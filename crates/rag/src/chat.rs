//! Chat orchestration: retrieve, gate, generate, cite, verify, sanitize.

use crate::citations::build_citations;
use crate::generation::{format_context, Generator, SYSTEM_PROMPT};
use crate::quotes::{sanitize_spans, verify_quotes_in_response, UNVERIFIED_DISCLAIMER};
use crate::retrieval::{retrieve, GateDecision, Retriever, REFUSAL_MESSAGE, REFUSAL_REASON};
use crate::types::{ChatOptions, ChatResponse, VerificationReport};
use docqa_core::AppResult;
use std::sync::Arc;

/// Grounded question answering over a retriever and a generator.
///
/// Holds no per-request state, so one instance can serve concurrent chats.
pub struct RagChat {
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn Generator>,
}

impl RagChat {
    pub fn new(retriever: Arc<dyn Retriever>, generator: Arc<dyn Generator>) -> Self {
        Self {
            retriever,
            generator,
        }
    }

    /// Answer `query` from retrieved sources.
    ///
    /// A query with no relevant source is refused without calling the
    /// generator. Retrieval and generation failures are returned as errors
    /// of their own kind; refusals and unverified quotes are not errors.
    pub async fn chat(&self, query: &str, options: &ChatOptions) -> AppResult<ChatResponse> {
        tracing::info!("Chat query: {}", query);

        let decision = retrieve(
            self.retriever.as_ref(),
            query,
            options.n_sources,
            options.min_relevance,
            options.filename_filter.as_deref(),
        )
        .await?;

        let sources = match decision {
            GateDecision::Answer(sources) => sources,
            GateDecision::Refuse => {
                tracing::info!(
                    "Refusing: no chunk scored at least {:.2}",
                    options.min_relevance
                );
                return Ok(refusal());
            }
        };

        let context = format_context(&sources);
        let draft = self
            .generator
            .generate(SYSTEM_PROMPT, &context, query)
            .await?;

        let citations = build_citations(&sources);

        let (answer, quote_verification) = if options.verify_quotes {
            let report = verify_quotes_in_response(&draft, &sources, options.threshold);
            let answer = if report.all_verified {
                draft
            } else {
                let mut cleaned = sanitize_spans(&draft, &report.unverified_spans);
                cleaned.push_str(UNVERIFIED_DISCLAIMER);
                cleaned
            };
            (answer, report)
        } else {
            (draft, VerificationReport::skipped())
        };

        tracing::info!(
            "Answered from {} sources (quote verification: {})",
            sources.len(),
            quote_verification.status
        );

        Ok(ChatResponse {
            answer,
            citations,
            sources_used: sources,
            refused: false,
            refusal_reason: None,
            quote_verification,
        })
    }
}

fn refusal() -> ChatResponse {
    ChatResponse {
        answer: REFUSAL_MESSAGE.to_string(),
        citations: Vec::new(),
        sources_used: Vec::new(),
        refused: true,
        refusal_reason: Some(REFUSAL_REASON.to_string()),
        quote_verification: VerificationReport::no_sources(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SourceChunk, VerificationStatus};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct OneChunk;

    #[async_trait]
    impl Retriever for OneChunk {
        async fn search(&self, _: &str, _: usize, _: Option<&str>) -> AppResult<Vec<SourceChunk>> {
            Ok(vec![SourceChunk {
                text: "Invoices are due within thirty days of receipt.".to_string(),
                filename: "terms.pdf".to_string(),
                page_number: 2,
                chunk_index: 0,
                score: 0.75,
            }])
        }
    }

    struct Canned {
        answer: String,
        calls: AtomicUsize,
    }

    impl Canned {
        fn new(answer: &str) -> Arc<Self> {
            Arc::new(Self {
                answer: answer.to_string(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Generator for Canned {
        async fn generate(&self, _: &str, context: &str, _: &str) -> AppResult<String> {
            assert!(context.contains("Source: terms.pdf, Page 2"));
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer.clone())
        }
    }

    #[tokio::test]
    async fn test_partial_verification_sanitizes_and_discloses() {
        let generator = Canned::new(
            r#"Terms say "Invoices are due within thirty days" and "late fees are waived"."#,
        );
        let chat = RagChat::new(Arc::new(OneChunk), generator.clone());

        let response = chat.chat("When are invoices due?", &ChatOptions::default()).await.unwrap();

        assert_eq!(response.quote_verification.status, VerificationStatus::Partial);
        assert!(response.answer.contains(r#""Invoices are due within thirty days""#));
        assert!(!response.answer.contains("late fees are waived"));
        assert!(response.answer.contains("[UNVERIFIED QUOTE REMOVED]"));
        assert!(response.answer.ends_with(UNVERIFIED_DISCLAIMER));
        assert_eq!(response.citations.len(), 1);
        assert_eq!(response.sources_used.len(), 1);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refusal_skips_generation() {
        let generator = Canned::new("unused");
        let chat = RagChat::new(Arc::new(OneChunk), generator.clone());
        let options = ChatOptions {
            min_relevance: 0.9,
            ..ChatOptions::default()
        };

        let response = chat.chat("anything", &options).await.unwrap();

        assert!(response.refused);
        assert_eq!(response.answer, REFUSAL_MESSAGE);
        assert_eq!(response.quote_verification.status, VerificationStatus::NoSources);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }
}
