use std::fmt;
use std::fs;
use std::path::Path;

use finlens_core::{FinError, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::debug;

/// Relational side of ingestion: documents and their ordered chunks.
pub trait ChunkStore {
    fn add_document(&self, id: &str, filename: &str) -> Result<()>;

    fn add_chunk(&self, id: &str, doc_id: &str, content: &str, page: u32) -> Result<()>;

    /// All chunks of `doc_id` in insertion order. Empty when the document is
    /// unknown.
    fn get_all_chunks(&self, doc_id: &str) -> Result<Vec<StoredChunk>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredChunk {
    pub content: String,
    pub page: u32,
}

#[derive(Debug, Clone)]
pub struct ChunkInsert {
    pub id: String,
    pub content: String,
    pub page: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestStatus {
    Pending,
    Indexed,
    Failed,
}

impl IngestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            IngestStatus::Pending => "pending",
            IngestStatus::Indexed => "indexed",
            IngestStatus::Failed => "failed",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "indexed" => Some(Self::Indexed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for IngestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentRecord {
    pub id: String,
    pub filename: String,
    pub ingest_date: String,
    pub status: IngestStatus,
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let store = Self {
            conn: Connection::open(path)?,
        };
        store.init()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init()?;
        Ok(store)
    }

    pub fn init(&self) -> Result<()> {
        let _mode: String = self
            .conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                ingest_date TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                status TEXT NOT NULL DEFAULT 'pending'
            );
            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                doc_id TEXT NOT NULL,
                content TEXT NOT NULL,
                page_num INTEGER NOT NULL,
                FOREIGN KEY(doc_id) REFERENCES documents(id)
            );
            CREATE TABLE IF NOT EXISTS metrics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                doc_id TEXT NOT NULL,
                metric_name TEXT NOT NULL,
                value TEXT,
                unit TEXT,
                period TEXT,
                FOREIGN KEY(doc_id) REFERENCES documents(id)
            );
            CREATE INDEX IF NOT EXISTS idx_chunks_doc ON chunks(doc_id);
            "#,
        )?;
        debug!("store schema initialized");
        Ok(())
    }

    /// Inserts all chunks of one document in a single transaction.
    pub fn add_chunks(&mut self, doc_id: &str, chunks: &[ChunkInsert]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO chunks (id, doc_id, content, page_num) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for chunk in chunks {
                stmt.execute(params![chunk.id, doc_id, chunk.content, chunk.page])?;
            }
        }
        tx.commit()?;
        Ok(chunks.len())
    }

    pub fn get_document(&self, doc_id: &str) -> Result<Option<DocumentRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, filename, ingest_date, status FROM documents WHERE id = ?1",
                [doc_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;
        match row {
            None => Ok(None),
            Some((id, filename, ingest_date, status)) => {
                let status = IngestStatus::from_str(&status).ok_or_else(|| {
                    FinError::Other(format!("document {id} has unknown status {status}"))
                })?;
                Ok(Some(DocumentRecord {
                    id,
                    filename,
                    ingest_date,
                    status,
                }))
            }
        }
    }

    /// The first `limit` chunk texts of a document.
    pub fn get_context(&self, doc_id: &str, limit: usize) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT content FROM chunks WHERE doc_id = ?1 ORDER BY rowid LIMIT ?2")?;
        let rows = stmt.query_map(params![doc_id, limit as i64], |row| row.get(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn set_status(&self, doc_id: &str, status: IngestStatus) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE documents SET status = ?1 WHERE id = ?2",
            params![status.as_str(), doc_id],
        )?;
        if updated == 0 {
            return Err(FinError::NotFound(doc_id.to_string()));
        }
        Ok(())
    }

    /// Removes a document and its chunks.
    pub fn delete_document(&mut self, doc_id: &str) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM chunks WHERE doc_id = ?1", [doc_id])?;
        tx.execute("DELETE FROM metrics WHERE doc_id = ?1", [doc_id])?;
        tx.execute("DELETE FROM documents WHERE id = ?1", [doc_id])?;
        tx.commit()?;
        Ok(())
    }

    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, err)| FinError::Store(err))
    }
}

impl ChunkStore for SqliteStore {
    fn add_document(&self, id: &str, filename: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO documents (id, filename) VALUES (?1, ?2)",
            params![id, filename],
        )?;
        Ok(())
    }

    fn add_chunk(&self, id: &str, doc_id: &str, content: &str, page: u32) -> Result<()> {
        self.conn.execute(
            "INSERT INTO chunks (id, doc_id, content, page_num) VALUES (?1, ?2, ?3, ?4)",
            params![id, doc_id, content, page],
        )?;
        Ok(())
    }

    fn get_all_chunks(&self, doc_id: &str) -> Result<Vec<StoredChunk>> {
        let mut stmt = self
            .conn
            .prepare("SELECT content, page_num FROM chunks WHERE doc_id = ?1 ORDER BY rowid")?;
        let rows = stmt.query_map([doc_id], |row| {
            Ok(StoredChunk {
                content: row.get(0)?,
                page: row.get(1)?,
            })
        })?;
        let mut chunks = Vec::new();
        for row in rows {
            chunks.push(row?);
        }
        Ok(chunks)
    }
}
