//! Stats command handler.
//!
//! Shows what the workspace index holds and how it was built.

use clap::Args;
use docqa_core::{config::AppConfig, AppResult};

use super::{open_store, print_json};

/// Show index statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let store = open_store(config)?;
        let stats = store.stats()?;
        let embedding = format!(
            "{}/{} ({} dims)",
            config.embedding.provider, config.embedding.model, config.embedding.dimensions
        );

        if self.json {
            return print_json(&serde_json::json!({
                "indexPath": config.index_path().display().to_string(),
                "embedding": embedding,
                "totalChunks": stats.total_chunks,
                "documents": stats.documents,
            }));
        }

        println!("Index:      {}", config.index_path().display());
        println!("Embedding:  {}", embedding);
        println!("Documents:  {}", stats.documents.len());
        println!("Chunks:     {}", stats.total_chunks);
        for filename in &stats.documents {
            println!("  - {}", filename);
        }

        Ok(())
    }
}
