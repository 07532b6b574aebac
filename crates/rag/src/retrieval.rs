//! Retrieval collaborator and the relevance gate that decides whether to answer.

use crate::types::SourceChunk;
use async_trait::async_trait;
use docqa_core::AppResult;

/// Answer given when no source passes the relevance gate.
pub const REFUSAL_MESSAGE: &str =
    "I cannot find relevant information in the provided documents to answer this question.";

/// Stable reason attached to refusals.
pub const REFUSAL_REASON: &str = "No relevant sources found";

/// Top-K similarity search over ingested chunks.
///
/// Results are ranked by descending score, hold at most `k` chunks, and carry
/// scores in similarity space (higher is more relevant).
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn search(
        &self,
        query: &str,
        k: usize,
        filename_filter: Option<&str>,
    ) -> AppResult<Vec<SourceChunk>>;
}

/// What to do with a query after gating its retrieval results.
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// Answer from these chunks, in rank order
    Answer(Vec<SourceChunk>),
    /// Nothing is relevant enough; do not call generation
    Refuse,
}

/// Minimum-relevance filter over retrieval results.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalGate {
    pub min_relevance: f32,
}

impl RetrievalGate {
    pub fn new(min_relevance: f32) -> Self {
        Self { min_relevance }
    }

    /// Keep chunks scoring at least `min_relevance`; refuse if none remain.
    ///
    /// NaN scores never pass.
    pub fn apply(&self, results: Vec<SourceChunk>) -> GateDecision {
        let retrieved = results.len();
        let relevant: Vec<SourceChunk> = results
            .into_iter()
            .filter(|chunk| chunk.score >= self.min_relevance)
            .collect();

        tracing::debug!(
            "Relevance gate kept {}/{} chunks (min_relevance: {:.2})",
            relevant.len(),
            retrieved,
            self.min_relevance
        );

        if relevant.is_empty() {
            GateDecision::Refuse
        } else {
            GateDecision::Answer(relevant)
        }
    }
}

/// Search and gate in one step.
pub async fn retrieve(
    retriever: &dyn Retriever,
    query: &str,
    n_sources: usize,
    min_relevance: f32,
    filename_filter: Option<&str>,
) -> AppResult<GateDecision> {
    let results = retriever.search(query, n_sources, filename_filter).await?;
    if let Some(top) = results.first() {
        tracing::debug!("Retrieved {} chunks (top score: {:.3})", results.len(), top.score);
    }
    Ok(RetrievalGate::new(min_relevance).apply(results))
}
