//! SQLite database management with migrations
//!
//! Structured storage for documents and their chunks. Chunks are immutable
//! rows; re-segmenting a document writes a new generation and removes the
//! old one in the same transaction.

use crate::error::{QuarryError, Result};
use crate::segmenter::Chunk;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::path::Path;

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// A persisted document
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub id: String,
    pub title: String,
    pub content_hash: String,
    pub created_at: i64,
    pub generation: i64,
    pub chunk_count: i64,
}

/// A persisted chunk
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub id: i64,
    pub document_id: String,
    pub chunk_index: i64,
    pub content: String,
    pub start_offset: i64,
    pub end_offset: i64,
    pub size: i64,
    pub section_title: Option<String>,
    pub vector_id: Option<String>,
    pub generation: i64,
    pub created_at: i64,
}

/// Database manager with migration support
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Create a new database connection
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| QuarryError::Io {
                source: e,
                context: format!("Failed to create database directory: {:?}", parent),
            })?;
        }

        let manager = SqliteConnectionManager::file(db_path);

        let pool = Pool::builder()
            .max_size(16)
            .build(manager)
            .map_err(|e| QuarryError::Config(format!("Failed to create connection pool: {}", e)))?;

        {
            let conn = pool
                .get()
                .map_err(|e| QuarryError::Config(format!("Failed to get connection: {}", e)))?;

            // Enable WAL mode for better concurrency
            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                PRAGMA foreign_keys = ON;
                PRAGMA busy_timeout = 5000;
                ",
            )?;
        }

        let db = Self { pool };
        db.migrate()?;

        Ok(db)
    }

    /// Get a connection from the pool
    pub fn get_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| QuarryError::Config(format!("Failed to get connection: {}", e)))
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current_version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM _migrations",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        for (version, migration) in MIGRATIONS.iter().enumerate() {
            let version = version as i32 + 1;

            if version > current_version {
                tracing::info!("Applying migration {}", version);

                conn.execute_batch(migration)?;

                conn.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, datetime('now'))",
                    params![version],
                )?;
            }
        }

        Ok(())
    }

    /// Store a document and its chunks as a new generation, replacing any
    /// prior generation in the same transaction.
    ///
    /// Returns the persisted chunk records in index order.
    pub fn replace_document(
        &self,
        document_id: &str,
        title: &str,
        content_hash: &str,
        chunks: &[Chunk],
    ) -> Result<Vec<ChunkRecord>> {
        let mut conn = self.get_conn()?;
        let now = chrono::Utc::now().timestamp();

        let tx = conn.transaction()?;

        let generation: i64 = tx
            .query_row(
                "SELECT COALESCE(MAX(generation), 0) + 1 FROM chunks WHERE document_id = ?1",
                params![document_id],
                |row| row.get(0),
            )
            .unwrap_or(1);

        tx.execute(
            "INSERT INTO documents (id, title, content_hash, created_at, generation, chunk_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                 title = excluded.title,
                 content_hash = excluded.content_hash,
                 generation = excluded.generation,
                 chunk_count = excluded.chunk_count",
            params![
                document_id,
                title,
                content_hash,
                now,
                generation,
                chunks.len() as i64
            ],
        )?;

        let mut records = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            tx.execute(
                "INSERT INTO chunks (document_id, chunk_index, content, start_offset,
                                     end_offset, size, section_title, vector_id,
                                     generation, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    document_id,
                    chunk.chunk_index as i64,
                    chunk.content,
                    chunk.start_offset as i64,
                    chunk.end_offset as i64,
                    chunk.size as i64,
                    chunk.section_title,
                    chunk.vector_id,
                    generation,
                    now
                ],
            )?;

            records.push(ChunkRecord {
                id: tx.last_insert_rowid(),
                document_id: document_id.to_string(),
                chunk_index: chunk.chunk_index as i64,
                content: chunk.content.clone(),
                start_offset: chunk.start_offset as i64,
                end_offset: chunk.end_offset as i64,
                size: chunk.size as i64,
                section_title: chunk.section_title.clone(),
                vector_id: chunk.vector_id.clone(),
                generation,
                created_at: now,
            });
        }

        tx.execute(
            "DELETE FROM chunks WHERE document_id = ?1 AND generation < ?2",
            params![document_id, generation],
        )?;

        tx.commit()?;

        Ok(records)
    }

    /// Fetch a document by id
    pub fn get_document(&self, document_id: &str) -> Result<Option<DocumentRecord>> {
        let conn = self.get_conn()?;

        let record = conn
            .query_row(
                "SELECT id, title, content_hash, created_at, generation, chunk_count
                 FROM documents WHERE id = ?1",
                params![document_id],
                |row| {
                    Ok(DocumentRecord {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        content_hash: row.get(2)?,
                        created_at: row.get(3)?,
                        generation: row.get(4)?,
                        chunk_count: row.get(5)?,
                    })
                },
            )
            .optional()?;

        Ok(record)
    }

    /// Fetch the current generation of chunks for a document, in index order
    pub fn get_chunks(&self, document_id: &str) -> Result<Vec<ChunkRecord>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            "SELECT id, document_id, chunk_index, content, start_offset, end_offset,
                    size, section_title, vector_id, generation, created_at
             FROM chunks
             WHERE document_id = ?1
             ORDER BY chunk_index",
        )?;

        let rows = stmt.query_map(params![document_id], |row| {
            Ok(ChunkRecord {
                id: row.get(0)?,
                document_id: row.get(1)?,
                chunk_index: row.get(2)?,
                content: row.get(3)?,
                start_offset: row.get(4)?,
                end_offset: row.get(5)?,
                size: row.get(6)?,
                section_title: row.get(7)?,
                vector_id: row.get(8)?,
                generation: row.get(9)?,
                created_at: row.get(10)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Fetch every chunk in the corpus, for index rebuilds
    pub fn get_all_chunks(&self) -> Result<Vec<ChunkRecord>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            "SELECT id, document_id, chunk_index, content, start_offset, end_offset,
                    size, section_title, vector_id, generation, created_at
             FROM chunks
             ORDER BY document_id, chunk_index",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(ChunkRecord {
                id: row.get(0)?,
                document_id: row.get(1)?,
                chunk_index: row.get(2)?,
                content: row.get(3)?,
                start_offset: row.get(4)?,
                end_offset: row.get(5)?,
                size: row.get(6)?,
                section_title: row.get(7)?,
                vector_id: row.get(8)?,
                generation: row.get(9)?,
                created_at: row.get(10)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        let conn = self.get_conn()?;

        let document_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;

        let chunk_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;

        let total_content_size: i64 = conn.query_row(
            "SELECT COALESCE(SUM(size), 0) FROM chunks",
            [],
            |row| row.get(0),
        )?;

        Ok(DbStats {
            document_count: document_count as usize,
            chunk_count: chunk_count as usize,
            total_content_size: total_content_size as u64,
        })
    }
}

/// Database statistics
#[derive(Debug)]
pub struct DbStats {
    pub document_count: usize,
    pub chunk_count: usize,
    pub total_content_size: u64,
}

/// Database migrations (each string is one migration)
const MIGRATIONS: &[&str] = &[
    // Migration 1: Initial schema
    r#"
    -- Documents table
    CREATE TABLE documents (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        content_hash TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        generation INTEGER NOT NULL DEFAULT 1,
        chunk_count INTEGER NOT NULL DEFAULT 0
    );

    CREATE INDEX idx_documents_created_at ON documents(created_at);

    -- Chunks table (immutable per generation)
    CREATE TABLE chunks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        document_id TEXT NOT NULL,
        chunk_index INTEGER NOT NULL,
        content TEXT NOT NULL,
        start_offset INTEGER NOT NULL,
        end_offset INTEGER NOT NULL,
        size INTEGER NOT NULL,
        section_title TEXT,
        vector_id TEXT,
        generation INTEGER NOT NULL,
        created_at INTEGER NOT NULL,
        FOREIGN KEY (document_id) REFERENCES documents(id)
    );

    CREATE INDEX idx_chunks_document ON chunks(document_id, generation, chunk_index);
    CREATE INDEX idx_chunks_vector_id ON chunks(vector_id);
    "#,
];

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_chunk(index: usize, content: &str) -> Chunk {
        Chunk {
            chunk_index: index,
            content: content.to_string(),
            start_offset: index * 10,
            end_offset: index * 10 + content.len(),
            size: content.len(),
            section_title: None,
            vector_id: Some(format!("vec-{}", index)),
        }
    }

    #[test]
    fn test_migrations_apply_once() {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("db.sqlite");

        let _db = Database::new(&db_path).unwrap();
        // Re-opening must not re-apply migrations
        let db = Database::new(&db_path).unwrap();
        assert_eq!(db.stats().unwrap().document_count, 0);
    }

    #[test]
    fn test_replace_document_stores_chunks() {
        let temp = TempDir::new().unwrap();
        let db = Database::new(&temp.path().join("db.sqlite")).unwrap();

        let chunks = vec![test_chunk(0, "first chunk"), test_chunk(1, "second chunk")];
        let records = db
            .replace_document("doc-1", "Test Doc", "abc123", &chunks)
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].generation, 1);

        let fetched = db.get_chunks("doc-1").unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[0].content, "first chunk");
        assert_eq!(fetched[1].chunk_index, 1);
    }

    #[test]
    fn test_resegmentation_replaces_generation() {
        let temp = TempDir::new().unwrap();
        let db = Database::new(&temp.path().join("db.sqlite")).unwrap();

        let first = vec![test_chunk(0, "old content")];
        db.replace_document("doc-1", "Doc", "hash1", &first).unwrap();

        let second = vec![test_chunk(0, "new content"), test_chunk(1, "more content")];
        let records = db
            .replace_document("doc-1", "Doc", "hash2", &second)
            .unwrap();

        assert_eq!(records[0].generation, 2);

        // Old generation is gone
        let fetched = db.get_chunks("doc-1").unwrap();
        assert_eq!(fetched.len(), 2);
        assert!(fetched.iter().all(|c| c.generation == 2));
        assert!(fetched.iter().all(|c| c.content != "old content"));

        let doc = db.get_document("doc-1").unwrap().unwrap();
        assert_eq!(doc.generation, 2);
        assert_eq!(doc.chunk_count, 2);
        assert_eq!(doc.content_hash, "hash2");
    }

    #[test]
    fn test_missing_document() {
        let temp = TempDir::new().unwrap();
        let db = Database::new(&temp.path().join("db.sqlite")).unwrap();

        assert!(db.get_document("nope").unwrap().is_none());
        assert!(db.get_chunks("nope").unwrap().is_empty());
    }
}
