//! Durable structured store for photo records, embedding blobs, per-photo
//! processing status, and the generic job queue.
//!
//! The store is the single owner of durable state. A single SQLite connection
//! is guarded by a mutex so one handle can be shared across worker threads;
//! conflicting writes serialize, last write wins.

mod schema;
pub mod embeddings;
pub mod photos;
pub mod queue;

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

use rusqlite::Connection;

use crate::error::{PipelineError, Result};

pub use embeddings::StoredEmbedding;
pub use queue::{Job, JobKind, JobStatus};
pub use schema::SCHEMA;

const INITIAL_SCAN_COMPLETE_KEY: &str = "initial_scan_complete";

/// Per-photo embedding lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingStatus {
    Pending,
    Complete,
    Failed,
}

impl EmbeddingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingStatus::Pending => "PENDING",
            EmbeddingStatus::Complete => "COMPLETE",
            EmbeddingStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for EmbeddingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmbeddingStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(EmbeddingStatus::Pending),
            "COMPLETE" => Ok(EmbeddingStatus::Complete),
            "FAILED" => Ok(EmbeddingStatus::Failed),
            other => Err(format!("unknown embedding status: {other}")),
        }
    }
}

/// One photo as tracked by the store.
#[derive(Debug, Clone)]
pub struct PhotoRecord {
    /// Stable external asset identifier.
    pub id: String,
    /// Opaque locator resolvable by the embedding function.
    pub uri: String,
    /// Creation timestamp in epoch milliseconds; processing-order tie-break.
    pub created_at: i64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub status: EmbeddingStatus,
}

/// Snapshot of indexing progress, computed from the photo rows at query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCounts {
    pub total: i64,
    /// Rows no longer pending, i.e. COMPLETE or FAILED.
    pub indexed: i64,
    pub scan_complete: bool,
}

pub struct PhotoStore {
    pub(crate) conn: Mutex<Connection>,
}

impl PhotoStore {
    /// Open the store at the given path, creating parent directories and the
    /// schema as needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PipelineError::SourceUnavailable(e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        let store = Self { conn: Mutex::new(conn) };
        store.initialize()?;
        Ok(store)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn: Mutex::new(conn) };
        store.initialize()?;
        Ok(store)
    }

    /// Idempotent schema creation. The connection mutex serializes concurrent
    /// callers, so the schema is never created twice in parallel.
    pub fn initialize(&self) -> Result<()> {
        let conn = self.lock();
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Whether the initial library scan has run to completion.
    pub fn is_scan_complete(&self) -> Result<bool> {
        let conn = self.lock();
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM scan_state WHERE key = ?",
                [INITIAL_SCAN_COMPLETE_KEY],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        Ok(value.as_deref() == Some("true"))
    }

    /// Record that the scanner has consumed every page of the source.
    /// Transitions false -> true once; the core never resets it.
    pub fn set_scan_complete(&self) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT OR REPLACE INTO scan_state (key, value) VALUES (?, 'true')",
            [INITIAL_SCAN_COMPLETE_KEY],
        )?;
        Ok(())
    }

    pub(crate) fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // A poisoned mutex means a panic mid-statement; the connection itself
        // is still usable and SQLite guarantees statement atomicity.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_is_idempotent() {
        let store = PhotoStore::open_in_memory().unwrap();
        store.initialize().unwrap();
        store.initialize().unwrap();
    }

    #[test]
    fn test_scan_complete_flag_roundtrip() {
        let store = PhotoStore::open_in_memory().unwrap();
        assert!(!store.is_scan_complete().unwrap());
        store.set_scan_complete().unwrap();
        assert!(store.is_scan_complete().unwrap());
        // Setting again keeps it true
        store.set_scan_complete().unwrap();
        assert!(store.is_scan_complete().unwrap());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(
            "PENDING".parse::<EmbeddingStatus>().unwrap(),
            EmbeddingStatus::Pending
        );
        assert_eq!(
            "COMPLETE".parse::<EmbeddingStatus>().unwrap(),
            EmbeddingStatus::Complete
        );
        assert!("bogus".parse::<EmbeddingStatus>().is_err());
    }
}
