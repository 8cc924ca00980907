// crates/triage-gate-grounding/src/store.rs
// ============================================================================
// Module: SQLite Grounding Store
// Description: Content-addressed document chunk store and similarity index.
// Purpose: Ground LLM prompts in uploaded context documents.
// Dependencies: triage-gate-core, rusqlite, md5, tokio
// ============================================================================

//! ## Overview
//! Implements [`EmbeddingStore`] over a dedicated `SQLite` file, independent
//! from the relational Config/Session/Ticket/History schema so the two can
//! be backed by different volumes in a deployment. Similarity search uses a
//! term-overlap score local to this store; a deployment that needs a real
//! vector database swaps this module for one that calls out to it, without
//! touching the orchestrator.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use triage_gate_core::DocumentId;
use triage_gate_core::EmbeddingStore;
use triage_gate_core::GroundingStoreError;
use triage_gate_core::SimilarChunk;

use crate::chunker;

/// Default busy timeout applied to the grounding connection.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// `SQLite`-backed [`EmbeddingStore`].
///
/// # Invariants
/// - All access goes through a single mutex-guarded connection; ingest is
///   additionally serialized against itself by the `(filename, content_hash)`
///   unique index.
pub struct SqliteEmbeddingStore {
    /// Shared connection; `SQLite` with one writer is simplest to reason
    /// about at the volume this store is expected to see.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteEmbeddingStore {
    /// Opens (creating if absent) a grounding store at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`GroundingStoreError`] if the file cannot be opened or the
    /// schema cannot be initialized.
    pub fn open(path: &Path) -> Result<Self, GroundingStoreError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
        let connection = Connection::open_with_flags(path, flags)
            .map_err(|err| GroundingStoreError::Io(err.to_string()))?;
        connection
            .execute_batch("PRAGMA journal_mode = wal; PRAGMA foreign_keys = ON;")
            .map_err(|err| GroundingStoreError::Io(err.to_string()))?;
        connection
            .busy_timeout(std::time::Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))
            .map_err(|err| GroundingStoreError::Io(err.to_string()))?;
        initialize_schema(&connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Opens an in-memory grounding store, useful for tests.
    ///
    /// # Errors
    ///
    /// Returns [`GroundingStoreError`] if the schema cannot be initialized.
    pub fn open_in_memory() -> Result<Self, GroundingStoreError> {
        let connection =
            Connection::open_in_memory().map_err(|err| GroundingStoreError::Io(err.to_string()))?;
        initialize_schema(&connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }
}

/// Creates the chunk table and its uniqueness index if absent.
fn initialize_schema(connection: &Connection) -> Result<(), GroundingStoreError> {
    connection
        .execute_batch(
            "CREATE TABLE IF NOT EXISTS document_chunks (
                document_id TEXT NOT NULL,
                filename TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                content TEXT NOT NULL,
                PRIMARY KEY (document_id, chunk_index)
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_document_chunks_identity
                ON document_chunks (filename, content_hash);",
        )
        .map_err(|err| GroundingStoreError::Io(err.to_string()))
}

#[async_trait]
impl EmbeddingStore for SqliteEmbeddingStore {
    async fn ingest(&self, filename: &str, bytes: &[u8]) -> Result<DocumentId, GroundingStoreError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| GroundingStoreError::InvalidInput("document bytes are not valid UTF-8 text".to_string()))?
            .to_string();
        let content_hash = format!("{:x}", md5::compute(bytes));
        let filename = filename.to_string();
        let connection = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || ingest_blocking(&connection, &filename, &content_hash, &text))
            .await
            .map_err(|err| GroundingStoreError::Backend(err.to_string()))?
    }

    async fn read_context(&self) -> Result<String, GroundingStoreError> {
        let connection = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || read_context_blocking(&connection))
            .await
            .map_err(|err| GroundingStoreError::Backend(err.to_string()))?
    }

    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<SimilarChunk>, GroundingStoreError> {
        let query = query.to_string();
        let connection = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || similarity_search_blocking(&connection, &query, k))
            .await
            .map_err(|err| GroundingStoreError::Backend(err.to_string()))?
    }

    async fn is_empty(&self) -> Result<bool, GroundingStoreError> {
        let connection = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || is_empty_blocking(&connection))
            .await
            .map_err(|err| GroundingStoreError::Backend(err.to_string()))?
    }
}

/// Row shape shared by the blocking query helpers below.
struct ChunkRow {
    document_id: String,
    filename: String,
    chunk_index: i64,
    content: String,
}

/// Ingests `text` under `filename`/`content_hash`, chunking if new.
fn ingest_blocking(
    connection: &Mutex<Connection>,
    filename: &str,
    content_hash: &str,
    text: &str,
) -> Result<DocumentId, GroundingStoreError> {
    let conn = connection.lock().map_err(|_| GroundingStoreError::Backend("poisoned lock".to_string()))?;
    let existing: Option<String> = conn
        .query_row(
            "SELECT document_id FROM document_chunks WHERE filename = ?1 AND content_hash = ?2 LIMIT 1",
            params![filename, content_hash],
            |row| row.get(0),
        )
        .optional()
        .map_err(|err| GroundingStoreError::Backend(err.to_string()))?;
    if let Some(document_id) = existing {
        return Ok(DocumentId::new(document_id));
    }

    let document_id = format!("doc_{content_hash}");
    let chunks = chunker::split(text);
    for (index, chunk) in chunks.iter().enumerate() {
        conn.execute(
            "INSERT INTO document_chunks (document_id, filename, content_hash, chunk_index, content)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![document_id, filename, content_hash, index as i64, chunk],
        )
        .map_err(|err| GroundingStoreError::Backend(err.to_string()))?;
    }
    Ok(DocumentId::new(document_id))
}

/// Reconstructs the grounding context from every ingested document.
fn read_context_blocking(connection: &Mutex<Connection>) -> Result<String, GroundingStoreError> {
    let conn = connection.lock().map_err(|_| GroundingStoreError::Backend("poisoned lock".to_string()))?;
    let mut stmt = conn
        .prepare(
            "SELECT document_id, filename, chunk_index, content FROM document_chunks
             ORDER BY document_id, chunk_index",
        )
        .map_err(|err| GroundingStoreError::Backend(err.to_string()))?;
    let rows = stmt
        .query_map(params![], |row| {
            Ok(ChunkRow {
                document_id: row.get(0)?,
                filename: row.get(1)?,
                chunk_index: row.get(2)?,
                content: row.get(3)?,
            })
        })
        .map_err(|err| GroundingStoreError::Backend(err.to_string()))?;

    let mut documents: Vec<(String, String, Vec<(i64, String)>)> = Vec::new();
    for row in rows {
        let row = row.map_err(|err| GroundingStoreError::Backend(err.to_string()))?;
        match documents.last_mut() {
            Some((document_id, _, chunks)) if *document_id == row.document_id => {
                chunks.push((row.chunk_index, row.content));
            }
            _ => {
                documents.push((row.document_id, row.filename, vec![(row.chunk_index, row.content)]));
            }
        }
    }

    let mut blocks = Vec::with_capacity(documents.len());
    for (_, filename, mut chunks) in documents {
        chunks.sort_by_key(|(index, _)| *index);
        let content = chunks.into_iter().map(|(_, content)| content).collect::<Vec<_>>().join("\n");
        blocks.push(format!("=== FICHIER: {filename} ===\n{content}"));
    }
    Ok(blocks.join("\n\n"))
}

/// Scores every chunk against `query` by token overlap and returns the top `k`.
fn similarity_search_blocking(
    connection: &Mutex<Connection>,
    query: &str,
    k: usize,
) -> Result<Vec<SimilarChunk>, GroundingStoreError> {
    let conn = connection.lock().map_err(|_| GroundingStoreError::Backend("poisoned lock".to_string()))?;
    let mut stmt = conn
        .prepare("SELECT document_id, filename, chunk_index, content FROM document_chunks")
        .map_err(|err| GroundingStoreError::Backend(err.to_string()))?;
    let rows = stmt
        .query_map(params![], |row| {
            Ok(ChunkRow {
                document_id: row.get(0)?,
                filename: row.get(1)?,
                chunk_index: row.get(2)?,
                content: row.get(3)?,
            })
        })
        .map_err(|err| GroundingStoreError::Backend(err.to_string()))?;

    let query_tokens = tokenize(query);
    let mut scored = Vec::new();
    for row in rows {
        let row = row.map_err(|err| GroundingStoreError::Backend(err.to_string()))?;
        let score = overlap_score(&query_tokens, &tokenize(&row.content));
        if score > 0.0 {
            scored.push(SimilarChunk {
                document_id: DocumentId::new(row.document_id),
                filename: row.filename,
                chunk_index: u32::try_from(row.chunk_index).unwrap_or(u32::MAX),
                content: row.content,
                score,
            });
        }
    }
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(k);
    Ok(scored)
}

/// Returns whether the store has ever ingested a document.
fn is_empty_blocking(connection: &Mutex<Connection>) -> Result<bool, GroundingStoreError> {
    let conn = connection.lock().map_err(|_| GroundingStoreError::Backend("poisoned lock".to_string()))?;
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM document_chunks", params![], |row| row.get(0))
        .map_err(|err| GroundingStoreError::Backend(err.to_string()))?;
    Ok(count == 0)
}

/// Lower-cases and splits on non-alphanumeric boundaries.
fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Jaccard-style overlap score between two token sets.
fn overlap_score(query: &HashSet<String>, candidate: &HashSet<String>) -> f32 {
    if query.is_empty() || candidate.is_empty() {
        return 0.0;
    }
    let intersection = query.intersection(candidate).count();
    if intersection == 0 {
        return 0.0;
    }
    #[allow(
        clippy::cast_precision_loss,
        reason = "token counts are small; precision loss is not observable"
    )]
    {
        intersection as f32 / query.len() as f32
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions are permitted."
)]
mod tests {
    use super::SqliteEmbeddingStore;
    use triage_gate_core::EmbeddingStore;

    #[tokio::test]
    async fn ingest_is_idempotent_by_content_hash() {
        let store = SqliteEmbeddingStore::open_in_memory().expect("schema init");
        let first = store.ingest("notes.txt", b"hello world").await.expect("ingest");
        let second = store.ingest("notes.txt", b"hello world").await.expect("ingest");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn read_context_wraps_each_file_in_a_marker_block() {
        let store = SqliteEmbeddingStore::open_in_memory().expect("schema init");
        store.ingest("policy.txt", b"payments must clear within 24 hours").await.expect("ingest");
        let context = store.read_context().await.expect("read context");
        assert!(context.contains("=== FICHIER: policy.txt ==="));
        assert!(context.contains("payments must clear within 24 hours"));
    }

    #[tokio::test]
    async fn empty_store_reports_is_empty() {
        let store = SqliteEmbeddingStore::open_in_memory().expect("schema init");
        assert!(store.is_empty().await.expect("is_empty"));
        store.ingest("a.txt", b"some content").await.expect("ingest");
        assert!(!store.is_empty().await.expect("is_empty"));
    }

    #[tokio::test]
    async fn similarity_search_ranks_more_overlapping_chunks_first() {
        let store = SqliteEmbeddingStore::open_in_memory().expect("schema init");
        store.ingest("hr.txt", b"vacation requests and onboarding paperwork").await.expect("ingest");
        store.ingest("payments.txt", b"payment settlement and invoice reconciliation").await.expect("ingest");
        let results = store.similarity_search("payment settlement invoice", 3).await.expect("search");
        assert!(!results.is_empty());
        assert_eq!(results[0].filename, "payments.txt");
    }
}
