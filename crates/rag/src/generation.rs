//! Generation collaborator: turns gated context and a question into a draft answer.

use crate::types::SourceChunk;
use async_trait::async_trait;
use docqa_core::{AppError, AppResult};
use docqa_llm::{LlmClient, LlmRequest};
use std::sync::Arc;

/// Instructions sent with every grounded question.
pub const SYSTEM_PROMPT: &str = "You are a document assistant. Answer questions using ONLY the source documents provided.

Rules:
1. Use only information from the provided sources. Never rely on outside knowledge.
2. If the sources do not contain the answer, say \"I cannot find information about this in the provided documents.\"
3. Cite every claim as [Source: filename, Page X].
4. When quoting, copy the source text exactly and put it in double quotes.
5. Keep the answer short and accurate.

Context arrives in this format:
---
Source: [filename], Page [number]
[text content]
---

Answer from these sources alone.";

/// Sampling temperature for grounded answers.
pub const ANSWER_TEMPERATURE: f32 = 0.1;

/// Upper bound on answer length, in tokens.
pub const ANSWER_MAX_TOKENS: u32 = 1000;

/// Produces a draft answer. The text is treated as opaque.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, system_prompt: &str, context: &str, query: &str)
        -> AppResult<String>;
}

/// Render chunks as the context block of the user message.
pub fn format_context(chunks: &[SourceChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| {
            format!(
                "---\nSource: {}, Page {}\n{}\n---",
                chunk.filename, chunk.page_number, chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// User message combining context and question.
pub fn build_user_prompt(context: &str, query: &str) -> String {
    format!(
        "Context from documents:\n\n{}\n\nQuestion: {}",
        context, query
    )
}

/// [`Generator`] backed by an LLM provider client.
pub struct LlmGenerator {
    client: Arc<dyn LlmClient>,
    model: String,
}

impl LlmGenerator {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Generator for LlmGenerator {
    async fn generate(
        &self,
        system_prompt: &str,
        context: &str,
        query: &str,
    ) -> AppResult<String> {
        tracing::debug!(
            "Generating answer with {} (model: {})",
            self.client.provider_name(),
            self.model
        );

        let request = LlmRequest::new(build_user_prompt(context, query), &self.model)
            .with_system(system_prompt)
            .with_temperature(ANSWER_TEMPERATURE)
            .with_max_tokens(ANSWER_MAX_TOKENS);

        let response = self.client.complete(&request).await.map_err(|e| match e {
            AppError::Llm(_) => e,
            other => AppError::Llm(format!("Generation failed: {}", other)),
        })?;

        tracing::debug!(
            "Generation used {} prompt + {} completion tokens",
            response.usage.prompt_tokens,
            response.usage.completion_tokens
        );

        Ok(response.content)
    }
}
