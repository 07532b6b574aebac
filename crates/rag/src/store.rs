//! SQLite-backed vector store for document chunks.
//!
//! Embeddings are stored as little-endian `f32` blobs and searched by brute
//! force cosine similarity, which is plenty for a few thousand chunks.

use crate::chunker::chunk_with;
use crate::document::{OcrDocument, OcrPage};
use crate::embeddings::{cosine_similarity, EmbeddingProvider};
use crate::retrieval::Retriever;
use crate::types::SourceChunk;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docqa_core::{AppError, AppResult, ChunkSettings};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS store_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS documents (
    filename TEXT PRIMARY KEY,
    pages INTEGER NOT NULL,
    ingested_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    filename TEXT NOT NULL,
    page_number INTEGER NOT NULL,
    chunk_index INTEGER NOT NULL,
    text TEXT NOT NULL,
    embedding BLOB NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_filename ON chunks(filename);
"#;

/// Collection-level counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStats {
    pub total_chunks: usize,
    /// Sorted unique filenames
    pub documents: Vec<String>,
}

/// One ingested document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentRecord {
    pub filename: String,
    pub pages: u32,
    pub chunks: usize,
    pub ingested_at: DateTime<Utc>,
}

/// Chunk store with embedding search.
pub struct VectorStore {
    conn: Mutex<Connection>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("embedder", &self.embedder)
            .finish_non_exhaustive()
    }
}

impl VectorStore {
    /// Open (or create) a store file.
    ///
    /// Fails with a configuration error if the file was built with a
    /// different embedding model or dimension count.
    pub fn open(path: &Path, embedder: Arc<dyn EmbeddingProvider>) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| AppError::Retrieval(format!("Failed to open store {:?}: {}", path, e)))?;
        tracing::debug!("Opened vector store at {:?}", path);
        Self::init(conn, embedder)
    }

    /// Store that lives only as long as the value.
    pub fn in_memory(embedder: Arc<dyn EmbeddingProvider>) -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Retrieval(format!("Failed to open in-memory store: {}", e)))?;
        Self::init(conn, embedder)
    }

    fn init(conn: Connection, embedder: Arc<dyn EmbeddingProvider>) -> AppResult<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| AppError::Retrieval(format!("Failed to create tables: {}", e)))?;

        check_embedding_meta(&conn, embedder.as_ref())?;

        Ok(Self {
            conn: Mutex::new(conn),
            embedder,
        })
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Retrieval("Vector store lock poisoned".to_string()))
    }

    /// Vectors of the wrong length would score 0.0 against everything.
    fn check_dimensions(&self, embedding: &[f32]) -> AppResult<()> {
        let expected = self.embedder.dimensions();
        if embedding.len() != expected {
            return Err(AppError::Retrieval(format!(
                "{}/{} returned a {}-dimensional embedding, expected {}",
                self.embedder.provider_name(),
                self.embedder.model_name(),
                embedding.len(),
                expected
            )));
        }
        Ok(())
    }

    /// Chunk, embed and store every page of a document.
    ///
    /// Chunk ids are `{filename}__p{page}__c{index}`. Re-adding a filename
    /// replaces all of its previous chunks. Returns the number of chunks stored.
    pub async fn add_document(
        &self,
        filename: &str,
        pages: &[OcrPage],
        settings: &ChunkSettings,
    ) -> AppResult<usize> {
        settings.validate()?;
        if filename.trim().is_empty() {
            return Err(AppError::Ingest("Document filename is empty".to_string()));
        }

        let mut pending: Vec<(String, u32, u32, String)> = Vec::new();
        for page in pages {
            if page.page_number == 0 {
                return Err(AppError::Ingest(format!(
                    "{}: page numbers start at 1",
                    filename
                )));
            }
            for (index, text) in chunk_with(&page.text, settings)?.into_iter().enumerate() {
                let index = index as u32;
                let id = format!("{}__p{}__c{}", filename, page.page_number, index);
                pending.push((id, page.page_number, index, text));
            }
        }

        let texts: Vec<String> = pending.iter().map(|(_, _, _, text)| text.clone()).collect();
        let embeddings = if texts.is_empty() {
            Vec::new()
        } else {
            self.embedder.embed_batch(&texts).await?
        };
        if embeddings.len() != pending.len() {
            return Err(AppError::Retrieval(format!(
                "Embedder returned {} vectors for {} chunks",
                embeddings.len(),
                pending.len()
            )));
        }
        for embedding in &embeddings {
            self.check_dimensions(embedding)?;
        }

        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Retrieval(format!("Failed to start transaction: {}", e)))?;

        tx.execute("DELETE FROM chunks WHERE filename = ?1", params![filename])
            .map_err(|e| AppError::Retrieval(format!("Failed to clear old chunks: {}", e)))?;

        for ((id, page_number, chunk_index, text), embedding) in pending.iter().zip(&embeddings) {
            tx.execute(
                "INSERT OR REPLACE INTO chunks (id, filename, page_number, chunk_index, text, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id,
                    filename,
                    *page_number as i64,
                    *chunk_index as i64,
                    text,
                    embedding_to_bytes(embedding),
                ],
            )
            .map_err(|e| AppError::Retrieval(format!("Failed to insert chunk {}: {}", id, e)))?;
        }

        tx.execute(
            "INSERT OR REPLACE INTO documents (filename, pages, ingested_at) VALUES (?1, ?2, ?3)",
            params![filename, pages.len() as i64, Utc::now().to_rfc3339()],
        )
        .map_err(|e| AppError::Retrieval(format!("Failed to record document: {}", e)))?;

        tx.commit()
            .map_err(|e| AppError::Retrieval(format!("Failed to commit document: {}", e)))?;

        tracing::info!("Stored {} chunks for {}", pending.len(), filename);
        Ok(pending.len())
    }

    /// Top-`k` chunks by cosine similarity to `query`, best first.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        filename_filter: Option<&str>,
    ) -> AppResult<Vec<SourceChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(query).await?;
        self.check_dimensions(&query_embedding)?;

        let rows = {
            let conn = self.lock()?;
            load_chunks(&conn, filename_filter)?
        };

        let mut results: Vec<SourceChunk> = rows
            .into_iter()
            .map(|(mut chunk, embedding)| {
                chunk.score = cosine_similarity(&query_embedding, &embedding);
                chunk
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(k);

        tracing::debug!(
            "Vector search returned {} chunks (requested top-{}, filter: {:?})",
            results.len(),
            k,
            filename_filter
        );

        Ok(results)
    }

    /// Remove every chunk of `filename`; returns how many were removed.
    pub fn delete_document(&self, filename: &str) -> AppResult<usize> {
        let conn = self.lock()?;
        let removed = conn
            .execute("DELETE FROM chunks WHERE filename = ?1", params![filename])
            .map_err(|e| AppError::Retrieval(format!("Failed to delete chunks: {}", e)))?;
        conn.execute("DELETE FROM documents WHERE filename = ?1", params![filename])
            .map_err(|e| AppError::Retrieval(format!("Failed to delete document: {}", e)))?;

        tracing::info!("Deleted {} chunks for {}", removed, filename);
        Ok(removed)
    }

    /// Sorted unique filenames with at least one chunk.
    pub fn list_documents(&self) -> AppResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT filename FROM chunks ORDER BY filename")
            .map_err(|e| AppError::Retrieval(format!("Failed to prepare query: {}", e)))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| AppError::Retrieval(format!("Failed to list documents: {}", e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::Retrieval(format!("Failed to read document row: {}", e)))?;
        Ok(names)
    }

    /// Per-document details, sorted by filename.
    pub fn documents(&self) -> AppResult<Vec<DocumentRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT d.filename, d.pages, d.ingested_at,
                        (SELECT COUNT(*) FROM chunks c WHERE c.filename = d.filename)
                 FROM documents d ORDER BY d.filename",
            )
            .map_err(|e| AppError::Retrieval(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })
            .map_err(|e| AppError::Retrieval(format!("Failed to list documents: {}", e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::Retrieval(format!("Failed to read document row: {}", e)))?;

        rows.into_iter()
            .map(|(filename, pages, ingested_at, chunks)| {
                let ingested_at = DateTime::parse_from_rfc3339(&ingested_at)
                    .map_err(|e| {
                        AppError::Serialization(format!(
                            "Bad timestamp for {}: {}",
                            filename, e
                        ))
                    })?
                    .with_timezone(&Utc);
                Ok(DocumentRecord {
                    filename,
                    pages: pages as u32,
                    chunks: chunks as usize,
                    ingested_at,
                })
            })
            .collect()
    }

    pub fn stats(&self) -> AppResult<StoreStats> {
        let total_chunks = {
            let conn = self.lock()?;
            conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get::<_, i64>(0))
                .map_err(|e| AppError::Retrieval(format!("Failed to count chunks: {}", e)))?
                as usize
        };

        Ok(StoreStats {
            total_chunks,
            documents: self.list_documents()?,
        })
    }
}

#[async_trait]
impl Retriever for VectorStore {
    async fn search(
        &self,
        query: &str,
        k: usize,
        filename_filter: Option<&str>,
    ) -> AppResult<Vec<SourceChunk>> {
        VectorStore::search(self, query, k, filename_filter).await
    }
}

/// Store every page of an extracted document.
pub async fn ingest_document(
    store: &VectorStore,
    document: &OcrDocument,
    settings: &ChunkSettings,
) -> AppResult<usize> {
    document.validate()?;
    tracing::debug!(
        "Ingesting {} ({} pages)",
        document.filename,
        document.pages.len()
    );
    store
        .add_document(&document.filename, &document.pages, settings)
        .await
}

fn load_chunks(
    conn: &Connection,
    filename_filter: Option<&str>,
) -> AppResult<Vec<(SourceChunk, Vec<f32>)>> {
    let mut stmt = conn
        .prepare(
            "SELECT text, filename, page_number, chunk_index, embedding FROM chunks
             WHERE ?1 IS NULL OR filename = ?1",
        )
        .map_err(|e| AppError::Retrieval(format!("Failed to prepare query: {}", e)))?;

    let rows = stmt
        .query_map(params![filename_filter], |row| {
            let chunk = SourceChunk {
                text: row.get(0)?,
                filename: row.get(1)?,
                page_number: row.get::<_, i64>(2)? as u32,
                chunk_index: row.get::<_, i64>(3)? as u32,
                score: 0.0,
            };
            let bytes: Vec<u8> = row.get(4)?;
            Ok((chunk, bytes))
        })
        .map_err(|e| AppError::Retrieval(format!("Failed to query chunks: {}", e)))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Retrieval(format!("Failed to read chunk row: {}", e)))?;

    rows.into_iter()
        .map(|(chunk, bytes)| Ok((chunk, bytes_to_embedding(&bytes)?)))
        .collect()
}

/// Record the embedding model on first use; reject a different one later.
fn check_embedding_meta(conn: &Connection, embedder: &dyn EmbeddingProvider) -> AppResult<()> {
    let expected = format!(
        "{}/{}/{}",
        embedder.provider_name(),
        embedder.model_name(),
        embedder.dimensions()
    );

    let stored: Option<String> = conn
        .query_row(
            "SELECT value FROM store_meta WHERE key = 'embedding'",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| AppError::Retrieval(format!("Failed to read store metadata: {}", e)))?;

    match stored {
        Some(stored) if stored != expected => Err(AppError::Config(format!(
            "Store was built with embedding '{}', but '{}' is configured",
            stored, expected
        ))),
        Some(_) => Ok(()),
        None => {
            conn.execute(
                "INSERT INTO store_meta (key, value) VALUES ('embedding', ?1)",
                params![expected],
            )
            .map_err(|e| AppError::Retrieval(format!("Failed to write store metadata: {}", e)))?;
            Ok(())
        }
    }
}

fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Retrieval(
            "Invalid embedding bytes length".to_string(),
        ));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
