//! Command handlers for the DocQA CLI.
//!
//! Each command lives in its own submodule. Shared setup (opening the store)
//! is here.

pub mod chat;
pub mod delete;
pub mod ingest;
pub mod list;
pub mod stats;

pub use chat::ChatCommand;
pub use delete::DeleteCommand;
pub use ingest::IngestCommand;
pub use list::ListCommand;
pub use stats::StatsCommand;

use docqa_core::{config::AppConfig, AppResult};
use docqa_rag::{create_provider, VectorStore};

/// Open the workspace vector store with the configured embedding backend.
pub(crate) fn open_store(config: &AppConfig) -> AppResult<VectorStore> {
    let embedder = create_provider(&config.embedding)?;
    let path = config.index_path();
    tracing::debug!("Opening vector store at {:?}", path);
    VectorStore::open(&path, embedder)
}

/// Print a value as pretty JSON on stdout.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
