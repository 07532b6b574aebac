//! Delete command handler.

use clap::Args;
use docqa_core::{config::AppConfig, AppError, AppResult};

use super::{open_store, print_json};

/// Remove a document from the index
#[derive(Args, Debug)]
pub struct DeleteCommand {
    /// Filename as shown by `docqa list`
    pub filename: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl DeleteCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing delete command for '{}'", self.filename);

        let store = open_store(config)?;
        let removed = store.delete_document(&self.filename)?;

        if self.json {
            print_json(&serde_json::json!({
                "filename": self.filename,
                "chunksRemoved": removed,
            }))?;
        } else if removed > 0 {
            println!("Deleted {} ({} chunks)", self.filename, removed);
        }

        if removed == 0 {
            return Err(AppError::Retrieval(format!(
                "Document not found in index: {}",
                self.filename
            )));
        }

        Ok(())
    }
}
