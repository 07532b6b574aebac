//! Extracted document model and text-extraction backends.
//!
//! OCR itself runs elsewhere; this module loads its output (or plain text)
//! into pages ready for chunking.

use docqa_core::{AppError, AppResult, ExtractorKind};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Page separator understood by [`PlainTextExtractor`].
const FORM_FEED: char = '\x0c';

/// Confidence assigned to text that did not go through OCR.
const PLAIN_TEXT_CONFIDENCE: f32 = 100.0;

/// Text of one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrPage {
    /// 1-based page number
    pub page_number: u32,
    pub text: String,
    /// Mean OCR confidence for the page, 0-100
    pub confidence: f32,
}

/// A document after text extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrDocument {
    /// Name used for citations and chunk ids
    pub filename: String,
    /// Where the original file lived
    pub filepath: String,
    pub total_pages: u32,
    pub pages: Vec<OcrPage>,
}

impl OcrDocument {
    /// Reject documents the store cannot index.
    pub fn validate(&self) -> AppResult<()> {
        if self.filename.trim().is_empty() {
            return Err(AppError::Ingest(format!(
                "Document at {} has no filename",
                self.filepath
            )));
        }
        if let Some(page) = self.pages.iter().find(|p| p.page_number == 0) {
            return Err(AppError::Ingest(format!(
                "{}: page numbers start at 1 (got {})",
                self.filename, page.page_number
            )));
        }
        Ok(())
    }

    /// Path `save` writes to inside `dir`: `<stem>_ocr.json`.
    pub fn output_path(&self, dir: &Path) -> PathBuf {
        let stem = Path::new(&self.filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.filename);
        dir.join(format!("{}_ocr.json", stem))
    }

    /// Persist as pretty JSON and return the written path.
    pub fn save(&self, dir: &Path) -> AppResult<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = self.output_path(dir);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)?;
        tracing::debug!("Saved extraction result to {:?}", path);
        Ok(path)
    }
}

/// Turns a file into an [`OcrDocument`].
pub trait TextExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(&self, path: &Path) -> AppResult<OcrDocument>;

    /// Whether `path` looks like input for this extractor.
    fn accepts(&self, path: &Path) -> bool;
}

/// Loads OCR results previously saved as JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct OcrJsonExtractor;

impl TextExtractor for OcrJsonExtractor {
    fn name(&self) -> &'static str {
        "ocr_json"
    }

    fn extract(&self, path: &Path) -> AppResult<OcrDocument> {
        let raw = fs::read_to_string(path)
            .map_err(|e| AppError::Ingest(format!("Failed to read {:?}: {}", path, e)))?;
        let document: OcrDocument = serde_json::from_str(&raw)
            .map_err(|e| AppError::Ingest(format!("Invalid OCR JSON in {:?}: {}", path, e)))?;
        document.validate()?;

        tracing::debug!(
            "Loaded {} ({} pages) from {:?}",
            document.filename,
            document.pages.len(),
            path
        );
        Ok(document)
    }

    fn accepts(&self, path: &Path) -> bool {
        has_extension(path, "json")
    }
}

/// Reads UTF-8 text; form feeds separate pages.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn name(&self) -> &'static str {
        "plain_text"
    }

    fn extract(&self, path: &Path) -> AppResult<OcrDocument> {
        let raw = fs::read_to_string(path)
            .map_err(|e| AppError::Ingest(format!("Failed to read {:?}: {}", path, e)))?;

        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| AppError::Ingest(format!("No usable file name in {:?}", path)))?
            .to_string();

        let pages: Vec<OcrPage> = raw
            .split(FORM_FEED)
            .enumerate()
            .map(|(i, text)| OcrPage {
                page_number: i as u32 + 1,
                text: text.to_string(),
                confidence: PLAIN_TEXT_CONFIDENCE,
            })
            .collect();

        Ok(OcrDocument {
            filename,
            filepath: path.to_string_lossy().to_string(),
            total_pages: pages.len() as u32,
            pages,
        })
    }

    fn accepts(&self, path: &Path) -> bool {
        has_extension(path, "txt")
    }
}

/// Build the extractor selected in configuration.
pub fn create_extractor(kind: &ExtractorKind) -> Box<dyn TextExtractor> {
    match kind {
        ExtractorKind::OcrJson => Box::new(OcrJsonExtractor),
        ExtractorKind::PlainText => Box::new(PlainTextExtractor),
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}
