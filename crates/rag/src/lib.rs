//! Grounded question answering over OCR-extracted documents.
//!
//! Pipeline: chunk and embed pages into a SQLite vector store, retrieve and
//! gate chunks for a question, generate a cited answer, then verify every
//! quoted span against the retrieved text and splice out what cannot be found.

pub mod chat;
pub mod chunker;
pub mod citations;
pub mod document;
pub mod embeddings;
pub mod generation;
pub mod quotes;
pub mod retrieval;
pub mod store;
pub mod types;


pub use chat::RagChat;
pub use chunker::{chunk_text, chunk_with};
pub use citations::build_citations;
pub use document::{create_extractor, OcrDocument, OcrPage, TextExtractor};
pub use embeddings::{create_provider, EmbeddingProvider};
pub use generation::{format_context, Generator, LlmGenerator, SYSTEM_PROMPT};
pub use quotes::{
    extract_quotes, find_quote_in_source, remove_unverified_quotes, verify_quotes_in_response,
};
pub use retrieval::{GateDecision, RetrievalGate, Retriever, REFUSAL_MESSAGE, REFUSAL_REASON};
pub use store::{ingest_document, DocumentRecord, StoreStats, VectorStore};
pub use types::{
    ChatOptions, ChatResponse, Citation, SourceChunk, VerificationRecord, VerificationReport,
    VerificationStatus,
};
