//! Queue-based orchestration variant.
//!
//! Instead of selecting PENDING photos directly, work items are enqueued as
//! durable jobs and drained in claimed batches. Job failures are recorded on
//! the queue row (with an attempt count) rather than on the photo, so a
//! failed job can be re-enqueued by an operator without touching photo state.

use serde::{Deserialize, Serialize};

use super::Orchestrator;
use crate::db::{EmbeddingStatus, Job, JobKind};
use crate::error::{PipelineError, Result};
use crate::scanner::to_record;
use crate::source::SourceItem;

/// Payload for a `GenerateEmbedding` job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingJobPayload {
    pub id: String,
    pub uri: String,
}

/// Tri-state result of draining one job batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobBatchOutcome {
    /// The queue had no claimable jobs.
    NoData,
    /// At least one job was claimed and resolved (done or failed).
    NewData,
}

impl Orchestrator {
    /// Enqueue an embedding job for one photo.
    pub fn enqueue_embedding_job(&self, id: &str, uri: &str) -> Result<i64> {
        let payload = serde_json::to_string(&EmbeddingJobPayload {
            id: id.to_string(),
            uri: uri.to_string(),
        })
        .map_err(|e| PipelineError::Embedding(e.to_string()))?;
        self.store.enqueue_job(JobKind::GenerateEmbedding, &payload)
    }

    /// Enqueue a metadata-fetch job carrying a full source item.
    pub fn enqueue_metadata_job(&self, item: &SourceItem) -> Result<i64> {
        let payload = serde_json::to_string(item)
            .map_err(|e| PipelineError::SourceUnavailable(e.to_string()))?;
        self.store.enqueue_job(JobKind::FetchMetadata, &payload)
    }

    /// Claim and drain up to `size` jobs. Each job resolves independently:
    /// a handler error fails that job and the batch continues.
    pub fn process_job_batch(&self, size: usize) -> Result<JobBatchOutcome> {
        let jobs = self.store.take_next_jobs(size)?;
        if jobs.is_empty() {
            return Ok(JobBatchOutcome::NoData);
        }

        for job in jobs {
            match self.run_job(&job) {
                Ok(()) => self.store.complete_job(job.id)?,
                Err(e) => {
                    tracing::warn!(job_id = job.id, kind = %job.kind, error = %e, "job failed");
                    self.store.fail_job(job.id)?;
                }
            }
        }
        Ok(JobBatchOutcome::NewData)
    }

    fn run_job(&self, job: &Job) -> Result<()> {
        match job.kind {
            JobKind::FetchMetadata => {
                let item: SourceItem = serde_json::from_str(&job.payload)
                    .map_err(|e| PipelineError::SourceUnavailable(e.to_string()))?;
                self.store.upsert_photo(&to_record(&item))
            }
            JobKind::GenerateEmbedding => {
                let payload: EmbeddingJobPayload = serde_json::from_str(&job.payload)
                    .map_err(|e| PipelineError::Embedding(e.to_string()))?;
                self.embedder.ensure_loaded()?;
                let vector = self.embedder.embed(&payload.uri)?;
                self.store
                    .store_embedding(&payload.id, &vector, self.embedder.model_version())?;
                self.store.set_status(&payload.id, EmbeddingStatus::Complete)
            }
        }
    }
}
