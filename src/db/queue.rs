//! Generic durable work queue.
//!
//! Queue rows carry an opaque JSON payload; job semantics live with the
//! orchestrator. Claiming a batch is atomic: the claim transaction selects
//! PENDING rows and marks them RUNNING before returning, so no two claimants
//! ever hold the same job.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use rusqlite::params;

use super::PhotoStore;
use crate::error::Result;

/// Kinds of work the pipeline knows how to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    FetchMetadata,
    GenerateEmbedding,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::FetchMetadata => "FetchMetadata",
            JobKind::GenerateEmbedding => "GenerateEmbedding",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "FetchMetadata" => Ok(JobKind::FetchMetadata),
            "GenerateEmbedding" => Ok(JobKind::GenerateEmbedding),
            other => Err(format!("unknown job kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Done => "DONE",
            JobStatus::Failed => "FAILED",
        }
    }
}

/// One claimed or stored queue entry.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: i64,
    pub kind: JobKind,
    /// Opaque JSON payload interpreted by the job handler.
    pub payload: String,
    pub attempts: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl PhotoStore {
    /// Append a job to the queue.
    pub fn enqueue_job(&self, kind: JobKind, payload: &str) -> Result<i64> {
        let now = Utc::now().timestamp_millis();
        let conn = self.lock();
        conn.execute(
            r#"
            INSERT INTO job_queue (job_type, payload, status, attempts, created_at, updated_at)
            VALUES (?, ?, 'PENDING', 0, ?, ?)
            "#,
            params![kind.as_str(), payload, now, now],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Atomically claim up to `n` PENDING jobs, oldest first, marking them
    /// RUNNING before returning them.
    pub fn take_next_jobs(&self, n: usize) -> Result<Vec<Job>> {
        let now = Utc::now().timestamp_millis();
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        type RawJob = (i64, String, String, i64, i64);
        let rows = {
            let mut stmt = tx.prepare(
                r#"
                SELECT id, job_type, payload, attempts, created_at
                FROM job_queue
                WHERE status = 'PENDING'
                ORDER BY updated_at ASC, id ASC
                LIMIT ?
                "#,
            )?;
            let rows = stmt
                .query_map([n as i64], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
                })?
                .collect::<std::result::Result<Vec<RawJob>, _>>()?;
            rows
        };

        let mut claimed = Vec::with_capacity(rows.len());
        for (id, kind_str, payload, attempts, created_at) in rows {
            // Rows with a kind this build does not understand stay PENDING.
            let Ok(kind) = kind_str.parse::<JobKind>() else {
                tracing::warn!(job_id = id, kind = %kind_str, "skipping job of unknown kind");
                continue;
            };
            tx.execute(
                "UPDATE job_queue SET status = 'RUNNING', updated_at = ? WHERE id = ?",
                params![now, id],
            )?;
            claimed.push(Job { id, kind, payload, attempts, created_at, updated_at: now });
        }

        tx.commit()?;
        Ok(claimed)
    }

    /// Mark a claimed job DONE.
    pub fn complete_job(&self, id: i64) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE job_queue SET status = 'DONE', updated_at = ? WHERE id = ?",
            params![Utc::now().timestamp_millis(), id],
        )?;
        Ok(())
    }

    /// Mark a claimed job FAILED and bump its attempt count.
    pub fn fail_job(&self, id: i64) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            r#"
            UPDATE job_queue
            SET status = 'FAILED', attempts = attempts + 1, updated_at = ?
            WHERE id = ?
            "#,
            params![Utc::now().timestamp_millis(), id],
        )?;
        Ok(())
    }

    /// Count queue rows in the given state.
    pub fn count_jobs(&self, status: JobStatus) -> Result<i64> {
        let conn = self.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM job_queue WHERE status = ?",
            [status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
