//! Pipeline error taxonomy.
//!
//! Every fallible operation in the crate returns [`Result`]. Variants carry
//! enough context for the caller to decide between aborting a cycle and
//! marking a single unit of work failed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Access to the photo library was denied.
    #[error("photo library permission denied")]
    PermissionDenied,

    /// The photo source cannot be reached or returned malformed data.
    #[error("photo source unavailable: {0}")]
    SourceUnavailable(String),

    /// A storage read or write failed. The store performs no retries; retry
    /// policy belongs to the caller.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Embedding a single photo failed. Recoverable per photo; the batch
    /// keeps going.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The model could not be fetched, read, or initialized. Fatal for the
    /// whole batch, not just one photo.
    #[error("model load failed: {0}")]
    ModelLoad(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
