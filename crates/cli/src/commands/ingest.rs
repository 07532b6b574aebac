//! Ingest command handler.
//!
//! Extracts page text from files, chunks and embeds it into the workspace store.

use clap::Args;
use docqa_core::{config::AppConfig, AppError, AppResult};
use docqa_rag::{create_extractor, ingest_document, TextExtractor};
use std::path::PathBuf;
use std::time::Instant;
use walkdir::WalkDir;

use super::{open_store, print_json};

/// Extract, chunk and index documents
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Files or directories to ingest
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Also write each extracted document as `<stem>_ocr.json` into this directory
    #[arg(long)]
    pub save_processed: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command for {} path(s)", self.paths.len());
        config.chunking.validate()?;

        let extractor = create_extractor(&config.extractor);
        let files = collect_files(&self.paths, extractor.as_ref())?;
        if files.is_empty() {
            return Err(AppError::Ingest(format!(
                "No .{} files found in the given paths",
                config.extractor.extension()
            )));
        }

        let store = open_store(config)?;
        let start = Instant::now();

        let mut ingested = Vec::new();
        let mut failed = Vec::new();
        let mut total_chunks = 0;

        for file in &files {
            let document = match extractor.extract(file) {
                Ok(document) => document,
                Err(e) => {
                    tracing::warn!("Skipping {:?}: {}", file, e);
                    failed.push(serde_json::json!({
                        "path": file.display().to_string(),
                        "error": e.to_string(),
                    }));
                    continue;
                }
            };

            if let Some(ref dir) = self.save_processed {
                document.save(dir)?;
            }

            let chunks = ingest_document(&store, &document, &config.chunking).await?;
            tracing::info!("Ingested {} ({} chunks)", document.filename, chunks);
            total_chunks += chunks;

            if !self.json {
                println!(
                    "✓ {} ({} pages, {} chunks)",
                    document.filename,
                    document.pages.len(),
                    chunks
                );
            }
            ingested.push(serde_json::json!({
                "filename": document.filename,
                "pages": document.pages.len(),
                "chunks": chunks,
            }));
        }

        let duration_secs = start.elapsed().as_secs_f64();

        if self.json {
            print_json(&serde_json::json!({
                "documents": ingested,
                "failed": failed,
                "totalChunks": total_chunks,
                "durationSecs": duration_secs,
            }))?;
        } else {
            for failure in &failed {
                println!(
                    "✗ {} ({})",
                    failure["path"].as_str().unwrap_or_default(),
                    failure["error"].as_str().unwrap_or_default()
                );
            }
            println!(
                "Ingested {} document(s), {} chunks in {:.2}s",
                ingested.len(),
                total_chunks,
                duration_secs
            );
        }

        if ingested.is_empty() {
            return Err(AppError::Ingest("No documents could be ingested".to_string()));
        }

        Ok(())
    }
}

/// Expand the given paths into the files the extractor accepts.
///
/// Directories are walked recursively; explicitly named files that the
/// extractor would not accept are reported and skipped.
fn collect_files(paths: &[PathBuf], extractor: &dyn TextExtractor) -> AppResult<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if !path.exists() {
            return Err(AppError::Ingest(format!("Path does not exist: {:?}", path)));
        }

        if path.is_file() {
            if extractor.accepts(path) {
                files.push(path.clone());
            } else {
                tracing::warn!(
                    "Ignoring {:?}: not handled by the {} extractor",
                    path,
                    extractor.name()
                );
            }
            continue;
        }

        for entry in WalkDir::new(path).sort_by_file_name() {
            let entry = entry
                .map_err(|e| AppError::Ingest(format!("Failed to walk {:?}: {}", path, e)))?;
            if entry.file_type().is_file() && extractor.accepts(entry.path()) {
                files.push(entry.path().to_path_buf());
            }
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}
