//! List command handler.

use clap::Args;
use docqa_core::{config::AppConfig, AppResult};

use super::{open_store, print_json};

/// List indexed documents
#[derive(Args, Debug)]
pub struct ListCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ListCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing list command");

        let store = open_store(config)?;
        let documents = store.documents()?;

        if self.json {
            return print_json(&documents);
        }

        if documents.is_empty() {
            println!("No documents indexed. Use 'docqa ingest <path>' to add some.");
            return Ok(());
        }

        for doc in &documents {
            println!(
                "{}  ({} pages, {} chunks, ingested {})",
                doc.filename,
                doc.pages,
                doc.chunks,
                doc.ingested_at.format("%Y-%m-%d %H:%M")
            );
        }

        Ok(())
    }
}
