//! Photo row operations: status-preserving upsert, pending-batch selection,
//! status transitions, and status counts.

use rusqlite::params;

use super::{EmbeddingStatus, PhotoRecord, PhotoStore, StatusCounts};
use crate::error::Result;

impl PhotoStore {
    /// Insert or update a photo's metadata by id.
    ///
    /// Re-scanning an already-known id overwrites metadata but never touches
    /// `embedding_status`: a photo already marked COMPLETE or FAILED must not
    /// regress to PENDING on rescan.
    pub fn upsert_photo(&self, photo: &PhotoRecord) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            r#"
            INSERT INTO photos (id, uri, created_at, width, height)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                uri = excluded.uri,
                created_at = excluded.created_at,
                width = excluded.width,
                height = excluded.height
            "#,
            params![photo.id, photo.uri, photo.created_at, photo.width, photo.height],
        )?;
        Ok(())
    }

    /// Fetch a single photo by id.
    pub fn get_photo(&self, id: &str) -> Result<Option<PhotoRecord>> {
        let conn = self.lock();
        let result = conn.query_row(
            r#"
            SELECT id, uri, created_at, width, height, embedding_status
            FROM photos WHERE id = ?
            "#,
            [id],
            row_to_photo,
        );
        match result {
            Ok(photo) => Ok(Some(photo)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Up to `limit` PENDING photos, newest created first so the most recent
    /// photos become searchable soonest.
    pub fn pending_batch(&self, limit: usize) -> Result<Vec<PhotoRecord>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, uri, created_at, width, height, embedding_status
            FROM photos
            WHERE embedding_status = 'PENDING'
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )?;
        let photos = stmt
            .query_map([limit as i64], row_to_photo)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(photos)
    }

    /// Update a photo's embedding status. No-op for an unknown id so a stale
    /// reference can never halt a batch.
    pub fn set_status(&self, id: &str, status: EmbeddingStatus) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE photos SET embedding_status = ? WHERE id = ?",
            params![status.as_str(), id],
        )?;
        Ok(())
    }

    /// Current totals, computed from the rows at query time. `indexed` counts
    /// everything no longer pending, so progress reaches 100% even with
    /// failures.
    pub fn status_counts(&self) -> Result<StatusCounts> {
        let scan_complete = self.is_scan_complete()?;
        let conn = self.lock();
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM photos", [], |row| row.get(0))?;
        let indexed: i64 = conn.query_row(
            "SELECT COUNT(*) FROM photos WHERE embedding_status IN ('COMPLETE','FAILED')",
            [],
            |row| row.get(0),
        )?;
        Ok(StatusCounts { total, indexed, scan_complete })
    }

    /// Count of photos still awaiting an embedding.
    pub fn pending_count(&self) -> Result<i64> {
        let conn = self.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM photos WHERE embedding_status = 'PENDING'",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn row_to_photo(row: &rusqlite::Row<'_>) -> rusqlite::Result<PhotoRecord> {
    let status_str: String = row.get(5)?;
    Ok(PhotoRecord {
        id: row.get(0)?,
        uri: row.get(1)?,
        created_at: row.get(2)?,
        width: row.get(3)?,
        height: row.get(4)?,
        status: status_str.parse().unwrap_or(EmbeddingStatus::Pending),
    })
}
